use std::sync::Arc;
use std::time::Duration;

use crate::app::adb::bridge::AdbBridge;
use crate::app::adb::executor::Executor;
use crate::app::adb::locator::resolve_adb_program;
use crate::app::adb::runner::{CommandRunner, ProcessRunner};
use crate::app::config::AppConfig;
use crate::app::device::registry::DeviceRegistry;
use crate::app::scheduler::DeviceLocks;

/// Everything a controller request needs: config snapshot, the registry that owns the
/// selection, and the executor that reads it.
pub struct BridgeState {
    pub config: AppConfig,
    pub bridge: AdbBridge,
    pub registry: Arc<DeviceRegistry>,
    pub executor: Executor,
}

impl BridgeState {
    pub fn new(config: AppConfig, adb_override: Option<&str>) -> Self {
        let program = resolve_adb_program(adb_override, &config.adb.command_path);
        Self::with_runner(config, program, Arc::new(ProcessRunner))
    }

    pub fn with_runner(
        config: AppConfig,
        program: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let bridge = AdbBridge::new(program, runner);
        let default_timeout = Duration::from_secs(config.command.default_timeout_secs);
        let registry = Arc::new(DeviceRegistry::new(
            bridge.clone(),
            default_timeout,
            config.device.min_sdk,
        ));
        let executor = Executor::new(
            bridge.clone(),
            Arc::clone(&registry),
            Arc::new(DeviceLocks::new()),
            default_timeout,
            Duration::from_secs(config.command.wait_timeout_secs),
        );
        Self {
            config,
            bridge,
            registry,
            executor,
        }
    }
}
