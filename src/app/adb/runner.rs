use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::app::error::AppError;

/// Written to `stderr` when a command is killed for exceeding its timeout.
pub const TIMEOUT_MARKER: &str = "[adb-wifi] command timed out";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn completed(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            success: exit_code == Some(0),
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            timed_out: false,
        }
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: format!("{TIMEOUT_MARKER} after {}ms", timeout.as_millis()),
            exit_code: None,
            timed_out: true,
        }
    }

    /// Turns a failed command into a tagged error; `what` names the operation.
    pub fn into_result(self, what: &str, trace_id: &str) -> Result<Self, AppError> {
        if self.success {
            return Ok(self);
        }
        if self.timed_out {
            return Err(AppError::timeout(format!("{what} timed out"), trace_id));
        }
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        Err(AppError::command_failed(
            format!("{what} failed (exit {:?}): {detail}", self.exit_code),
            trace_id,
        ))
    }
}

/// Seam between the bridge and process spawning, so tests can script responses.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        run_command_with_timeout(program, args, timeout, trace_id)
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&temp[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}

/// Spawn failures are environment errors; everything after spawn is reported in the output.
pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| {
            AppError::bridge_unavailable(format!("Failed to spawn {program}: {err}"), trace_id)
        })?;

    // Drain both pipes while waiting; a chatty child blocks once the pipe buffer fills.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;
    let stdout_handle = drain(stdout);
    let stderr_handle = drain(stderr);

    let start = Instant::now();
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Output of a killed command is discarded, never merged into a later call.
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Ok(CommandOutput::timed_out(timeout));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => {
                let _ = child.kill();
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(AppError::system(format!("Failed to poll command: {err}"), trace_id));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput::completed(
        String::from_utf8_lossy(&stdout_bytes).to_string(),
        String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    ))
}
