use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::app::adb::executor::{Executor, Target};
use crate::app::adb::parse::parse_settings_bool;
use crate::app::adb::paths::shell_quote;
use crate::app::adb::runner::CommandOutput;
use crate::app::cancel::CancelToken;
use crate::app::error::AppError;
use crate::app::models::{
    CommandResult, ConnectOutcome, ConnectRequest, ConnectionStatus, SavedNetwork, ScanResult,
    WifiSecurity,
};
use crate::app::wifi::parse::{parse_connection_status, parse_saved_networks, parse_scan_results};

const STATUS_COMMAND: &str = "cmd wifi status 2>/dev/null; dumpsys wifi | grep -E 'mWifiInfo|mNetworkInfo' | head -n 4; ip -f inet addr show wlan0 2>/dev/null";
const SCAN_SETTLE: Duration = Duration::from_secs(3);
const CONNECT_POLL_INTERVAL: Duration = Duration::from_secs(1);

fn command_result(serial: &str, output: CommandOutput) -> CommandResult {
    CommandResult {
        serial: serial.to_string(),
        success: output.success,
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code,
    }
}

fn is_unknown_command(output: &CommandOutput) -> bool {
    let text = format!("{}\n{}", output.stdout, output.stderr).to_lowercase();
    text.contains("unknown command") || text.contains("unknown option")
}

pub fn set_wifi_enabled(
    executor: &Executor,
    enable: bool,
    trace_id: &str,
) -> Result<CommandResult, AppError> {
    executor.mutate(trace_id, |target| {
        let verb = if enable { "enable" } else { "disable" };
        info!(trace_id = %trace_id, serial = %target.serial(), verb, "set wifi state");
        let output = target
            .shell(&format!("svc wifi {verb}"), None, trace_id)?
            .into_result(&format!("svc wifi {verb}"), trace_id)?;
        Ok(command_result(target.serial(), output))
    })
}

pub fn wifi_status(executor: &Executor, trace_id: &str) -> Result<ConnectionStatus, AppError> {
    let target = executor.target(trace_id)?;
    read_status(&target, trace_id)
}

fn read_status(target: &Target<'_>, trace_id: &str) -> Result<ConnectionStatus, AppError> {
    // The exit code belongs to the last command in the chain, so only a timeout or an empty
    // dump counts as failure.
    let output = target.shell(STATUS_COMMAND, None, trace_id)?;
    if output.timed_out || output.stdout.trim().is_empty() {
        output.into_result("wifi status", trace_id)?;
        return Err(AppError::command_failed("wifi status returned no output", trace_id));
    }
    let mut status = parse_connection_status(&output.stdout);

    match target.shell("settings get global wifi_on", None, trace_id) {
        Ok(setting) if setting.success => {
            if let Some(enabled) = parse_settings_bool(&setting.stdout) {
                status.enabled = enabled;
            }
        }
        Ok(setting) => {
            warn!(trace_id = %trace_id, stderr = %setting.stderr.trim(), "wifi_on setting unreadable");
        }
        Err(err) => return Err(err),
    }
    Ok(status)
}

pub fn scan(executor: &Executor, trace_id: &str) -> Result<Vec<ScanResult>, AppError> {
    scan_with_settle(executor, SCAN_SETTLE, trace_id)
}

/// Triggers a scan, waits `settle`, then reads the cached results. A rejected scan trigger
/// (throttling) still returns the last cached results.
pub fn scan_with_settle(
    executor: &Executor,
    settle: Duration,
    trace_id: &str,
) -> Result<Vec<ScanResult>, AppError> {
    let target = executor.target(trace_id)?;
    let trigger = target.shell("cmd wifi start-scan", None, trace_id)?;
    if trigger.success {
        std::thread::sleep(settle);
    } else {
        warn!(
            trace_id = %trace_id,
            serial = %target.serial(),
            stderr = %trigger.stderr.trim(),
            "scan trigger rejected; reading cached results"
        );
    }
    let output = target
        .shell("cmd wifi list-scan-results", None, trace_id)?
        .into_result("cmd wifi list-scan-results", trace_id)?;
    let results = parse_scan_results(&output.stdout);
    info!(trace_id = %trace_id, serial = %target.serial(), count = results.len(), "wifi scan");
    Ok(results)
}

fn validate_connect(request: &ConnectRequest, trace_id: &str) -> Result<(), AppError> {
    if request.ssid.trim().is_empty() {
        return Err(AppError::validation("ssid is required", trace_id));
    }
    let password = request.password.as_deref().unwrap_or_default();
    if request.security.needs_password() && password.is_empty() {
        return Err(AppError::validation(
            format!("password is required for {} networks", request.security.as_cmd_arg()),
            trace_id,
        ));
    }
    if matches!(request.security, WifiSecurity::Wpa2 | WifiSecurity::Wpa3)
        && !(8..=63).contains(&password.chars().count())
    {
        return Err(AppError::validation(
            "WPA passphrases must be 8 to 63 characters",
            trace_id,
        ));
    }
    Ok(())
}

pub fn connect(
    executor: &Executor,
    request: &ConnectRequest,
    cancel: &CancelToken,
    trace_id: &str,
) -> Result<ConnectOutcome, AppError> {
    validate_connect(request, trace_id)?;
    let wait_budget = executor.wait_timeout();

    executor.mutate(trace_id, |target| {
        let mut command = format!(
            "cmd wifi connect-network {} {}",
            shell_quote(&request.ssid),
            request.security.as_cmd_arg()
        );
        if request.security.needs_password() {
            if let Some(password) = request.password.as_deref() {
                command.push(' ');
                command.push_str(&shell_quote(password));
            }
        }
        info!(trace_id = %trace_id, serial = %target.serial(), ssid = %request.ssid, "connect network");
        let output = target
            .shell(&command, None, trace_id)?
            .into_result("cmd wifi connect-network", trace_id)?;
        if is_unknown_command(&output) {
            return Err(AppError::command_failed(
                "cmd wifi connect-network is not supported on this device",
                trace_id,
            )
            .with_hint("Check `device version`; Android 11 or newer is required"));
        }
        let message = output.stdout.trim().to_string();

        if !request.wait {
            return Ok(ConnectOutcome {
                serial: target.serial().to_string(),
                ssid: request.ssid.clone(),
                message,
                connected: None,
                status: None,
            });
        }

        let deadline = Instant::now() + wait_budget;
        loop {
            let status = read_status(target, trace_id)?;
            let joined = status.connected && status.ssid.as_deref() == Some(request.ssid.as_str());
            if joined || Instant::now() >= deadline || !cancel.sleep(CONNECT_POLL_INTERVAL) {
                return Ok(ConnectOutcome {
                    serial: target.serial().to_string(),
                    ssid: request.ssid.clone(),
                    message,
                    connected: Some(joined),
                    status: Some(status),
                });
            }
        }
    })
}

/// Uses `cmd wifi disconnect` where available, otherwise cycles the radio.
pub fn disconnect(executor: &Executor, trace_id: &str) -> Result<CommandResult, AppError> {
    executor.mutate(trace_id, |target| {
        let output = target.shell("cmd wifi disconnect", None, trace_id)?;
        if output.success && !is_unknown_command(&output) {
            return Ok(command_result(target.serial(), output));
        }
        if output.timed_out {
            output.into_result("cmd wifi disconnect", trace_id)?;
        }
        info!(trace_id = %trace_id, serial = %target.serial(), "disconnect unsupported; cycling wifi");
        let output = target
            .shell("svc wifi disable && svc wifi enable", None, trace_id)?
            .into_result("wifi radio cycle", trace_id)?;
        Ok(command_result(target.serial(), output))
    })
}

pub fn list_saved_networks(
    executor: &Executor,
    trace_id: &str,
) -> Result<Vec<SavedNetwork>, AppError> {
    let output = executor
        .shell("cmd wifi list-networks", None, trace_id)?
        .into_result("cmd wifi list-networks", trace_id)?;
    Ok(parse_saved_networks(&output.stdout))
}

pub fn forget_network(
    executor: &Executor,
    network_id: u32,
    trace_id: &str,
) -> Result<CommandResult, AppError> {
    executor.mutate(trace_id, |target| {
        info!(trace_id = %trace_id, serial = %target.serial(), network_id, "forget network");
        let output = target
            .shell(&format!("cmd wifi forget-network {network_id}"), None, trace_id)?
            .into_result("cmd wifi forget-network", trace_id)?;
        if output.stdout.to_lowercase().contains("fail") {
            return Err(AppError::command_failed(
                format!("forget network {network_id} failed: {}", output.stdout.trim()),
                trace_id,
            ));
        }
        Ok(command_result(target.serial(), output))
    })
}
