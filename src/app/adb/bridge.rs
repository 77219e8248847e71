use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::app::adb::runner::{CommandOutput, CommandRunner};
use crate::app::error::AppError;

/// Raw access to the adb binary. Device-scoped calls take an explicit serial, so only the
/// registry and the executor's pinned targets use them.
#[derive(Clone)]
pub struct AdbBridge {
    program: String,
    runner: Arc<dyn CommandRunner>,
}

impl AdbBridge {
    pub fn new(program: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn host(
        &self,
        args: &[&str],
        timeout: Duration,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        self.run(None, args, timeout, trace_id)
    }

    pub(crate) fn device(
        &self,
        serial: &str,
        args: &[&str],
        timeout: Duration,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        let mut full = vec!["-s".to_string(), serial.to_string()];
        full.extend(args.iter().map(|arg| arg.to_string()));
        self.run(Some(serial), full, timeout, trace_id)
    }

    pub(crate) fn shell_on(
        &self,
        serial: &str,
        command: &str,
        timeout: Duration,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        self.device(serial, &["shell", command], timeout, trace_id)
    }

    fn run(
        &self,
        serial: Option<&str>,
        args: Vec<String>,
        timeout: Duration,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        let started = Instant::now();
        let result = self.runner.run(&self.program, &args, timeout, trace_id);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(output) if output.timed_out => warn!(
                trace_id = %trace_id,
                serial = serial.unwrap_or("-"),
                args = %args.join(" "),
                elapsed_ms,
                "adb command timed out"
            ),
            Ok(output) => debug!(
                trace_id = %trace_id,
                serial = serial.unwrap_or("-"),
                args = %args.join(" "),
                elapsed_ms,
                exit_code = ?output.exit_code,
                "adb command finished"
            ),
            Err(err) => warn!(
                trace_id = %trace_id,
                serial = serial.unwrap_or("-"),
                error = %err,
                "adb command could not run"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::adb::fake::FakeRunner;

    #[test]
    fn device_calls_are_scoped_with_serial() {
        let runner = Arc::new(FakeRunner::new().on("getprop", "34\n"));
        let bridge = AdbBridge::new("adb", runner.clone());
        let output = bridge
            .shell_on("ABC", "getprop ro.build.version.sdk", Duration::from_secs(1), "t")
            .expect("ran");
        assert_eq!(output.stdout, "34\n");
        assert_eq!(runner.calls(), vec!["-s ABC shell getprop ro.build.version.sdk"]);
    }

    #[test]
    fn host_calls_are_unscoped() {
        let runner = Arc::new(FakeRunner::new().on("devices", "List of devices attached\n"));
        let bridge = AdbBridge::new("adb", runner.clone());
        bridge
            .host(&["devices", "-l"], Duration::from_secs(1), "t")
            .expect("ran");
        assert_eq!(runner.calls(), vec!["devices -l"]);
    }
}
