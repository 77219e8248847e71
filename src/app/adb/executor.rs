use std::sync::Arc;
use std::time::Duration;

use crate::app::adb::bridge::AdbBridge;
use crate::app::adb::runner::CommandOutput;
use crate::app::device::registry::DeviceRegistry;
use crate::app::error::AppError;
use crate::app::scheduler::DeviceLocks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Host-side adb command (`adb devices`, `adb version`).
    Host,
    /// Runs against the registry's selected device.
    SelectedDevice,
}

/// Command execution for every component except the registry. The device is never passed
/// in; it is read from the registry's selection.
pub struct Executor {
    bridge: AdbBridge,
    registry: Arc<DeviceRegistry>,
    locks: Arc<DeviceLocks>,
    default_timeout: Duration,
    wait_timeout: Duration,
}

impl Executor {
    pub fn new(
        bridge: AdbBridge,
        registry: Arc<DeviceRegistry>,
        locks: Arc<DeviceLocks>,
        default_timeout: Duration,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            bridge,
            registry,
            locks,
            default_timeout,
            wait_timeout,
        }
    }

    /// Budget for explicit wait operations (connect-and-wait, enterprise exchange).
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    pub fn execute(
        &self,
        args: &[&str],
        scope: Scope,
        timeout: Option<Duration>,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        match scope {
            Scope::Host => self.bridge.host(
                args,
                timeout.unwrap_or(self.default_timeout),
                trace_id,
            ),
            Scope::SelectedDevice => self.target(trace_id)?.execute(args, timeout, trace_id),
        }
    }

    pub fn shell(
        &self,
        command: &str,
        timeout: Option<Duration>,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        self.target(trace_id)?.shell(command, timeout, trace_id)
    }

    /// Resolves the selected device once; every command issued through the returned target
    /// goes to that serial even if the selection changes meanwhile.
    pub fn target(&self, trace_id: &str) -> Result<Target<'_>, AppError> {
        let serial = self.registry.ensure_selected(trace_id)?;
        Ok(Target {
            serial,
            bridge: &self.bridge,
            default_timeout: self.default_timeout,
        })
    }

    /// Pins the target and holds its device lock for the duration of `work`.
    pub fn mutate<T>(
        &self,
        trace_id: &str,
        work: impl FnOnce(&Target<'_>) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let target = self.target(trace_id)?;
        self.locks
            .with_lock(&target.serial, trace_id, || work(&target))
    }
}

pub struct Target<'a> {
    serial: String,
    bridge: &'a AdbBridge,
    default_timeout: Duration,
}

impl Target<'_> {
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn execute(
        &self,
        args: &[&str],
        timeout: Option<Duration>,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        self.bridge.device(
            &self.serial,
            args,
            timeout.unwrap_or(self.default_timeout),
            trace_id,
        )
    }

    pub fn shell(
        &self,
        command: &str,
        timeout: Option<Duration>,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        self.bridge.shell_on(
            &self.serial,
            command,
            timeout.unwrap_or(self.default_timeout),
            trace_id,
        )
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::app::adb::fake::FakeRunner;

    /// Executor over a scripted runner with `serial` already selected.
    pub fn executor_for(runner: &Arc<FakeRunner>, serial: &str) -> Executor {
        let bridge = AdbBridge::new("adb", runner.clone());
        let registry = Arc::new(DeviceRegistry::new(bridge.clone(), Duration::from_secs(5), 30));
        registry.select(Some(serial), "test").expect("select");
        Executor::new(
            bridge,
            registry,
            Arc::new(DeviceLocks::new()),
            Duration::from_secs(5),
            Duration::from_secs(10),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::executor_for;
    use super::*;
    use crate::app::adb::fake::FakeRunner;

    #[test]
    fn shell_targets_selected_device() {
        let runner = Arc::new(FakeRunner::new().on("echo", "hi\n"));
        let executor = executor_for(&runner, "AAA");
        let output = executor.shell("echo hi", None, "t").expect("ran");
        assert!(output.success);
        assert_eq!(runner.calls(), vec!["-s AAA shell echo hi"]);
    }

    #[test]
    fn host_scope_is_unscoped() {
        let runner = Arc::new(FakeRunner::new().on("version", "Android Debug Bridge\n"));
        let executor = executor_for(&runner, "AAA");
        executor
            .execute(&["version"], Scope::Host, None, "t")
            .expect("ran");
        assert_eq!(runner.calls(), vec!["version"]);
    }

    #[test]
    fn pinned_target_survives_selection_change() {
        let runner = Arc::new(FakeRunner::new().on("svc", ""));
        let bridge = AdbBridge::new("adb", runner.clone());
        let registry = Arc::new(DeviceRegistry::new(bridge.clone(), Duration::from_secs(5), 30));
        registry.select(Some("AAA"), "t").expect("select");
        let executor = Executor::new(
            bridge,
            Arc::clone(&registry),
            Arc::new(DeviceLocks::new()),
            Duration::from_secs(5),
            Duration::from_secs(10),
        );

        executor
            .mutate("t", |target| {
                target.shell("svc wifi disable", None, "t")?;
                registry.select(Some("BBB"), "t")?;
                target.shell("svc wifi enable", None, "t")
            })
            .expect("mutate");
        assert_eq!(
            runner.calls(),
            vec!["-s AAA shell svc wifi disable", "-s AAA shell svc wifi enable"]
        );
    }

    #[test]
    fn unselected_executor_with_no_devices_reports_no_device() {
        let runner = Arc::new(FakeRunner::new().on("devices -l", "List of devices attached\n"));
        let bridge = AdbBridge::new("adb", runner.clone());
        let registry = Arc::new(DeviceRegistry::new(bridge.clone(), Duration::from_secs(5), 30));
        let executor = Executor::new(
            bridge,
            registry,
            Arc::new(DeviceLocks::new()),
            Duration::from_secs(5),
            Duration::from_secs(10),
        );
        let err = executor.shell("echo hi", None, "t").expect_err("no device");
        assert_eq!(err.code, "ERR_NO_DEVICE");
    }
}
