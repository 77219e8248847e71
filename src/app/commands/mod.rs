use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::app::adb::locator::validate_adb_program;
use crate::app::cancel::CancelToken;
use crate::app::config::{save_config, validate_config, AppConfig};
use crate::app::enterprise::models::{
    AgentStatus, CertificateInstallRequest, EnterpriseConnectRequest, EnterpriseResponse,
};
use crate::app::enterprise::protocol;
use crate::app::error::AppError;
use crate::app::models::{
    AdbInfo, CaptivePortalCheck, CommandResponse, CommandResult, ConnectOutcome, ConnectRequest,
    ConnectionStatus, DeviceInfo, DeviceSummary, DnsResult, InterfaceInfo, InternetCheck,
    PingResult, SavedNetwork, ScanResult, Selection, VersionSupport,
};
use crate::app::probes::service as probes;
use crate::app::state::BridgeState;
use crate::app::wifi::service as wifi;


const ADB_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PING_COUNT: u32 = 4;
const DEFAULT_INTERFACE: &str = "wlan0";

pub fn resolve_trace_id(input: Option<String>) -> String {
    input
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn respond<T>(trace_id: String, data: T) -> Result<CommandResponse<T>, AppError> {
    Ok(CommandResponse { trace_id, data })
}

pub fn get_config(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<AppConfig>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    respond(trace_id, state.config.clone())
}

/// Persists a config; it takes effect on the next start.
pub fn save_app_config(
    config: AppConfig,
    trace_id: Option<String>,
) -> Result<CommandResponse<AppConfig>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let config = validate_config(config);
    save_config(&config, &trace_id)?;
    respond(trace_id, config)
}

pub fn check_adb(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<AdbInfo>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    info!(trace_id = %trace_id, "check_adb");
    let program = state.bridge.program().to_string();

    if let Err(message) = validate_adb_program(&program) {
        warn!(trace_id = %trace_id, error = %message, "adb validation failed");
        return respond(
            trace_id,
            AdbInfo {
                available: false,
                version_output: String::new(),
                command_path: program,
                error: Some(message),
            },
        );
    }

    let info = match state.bridge.host(&["version"], ADB_CHECK_TIMEOUT, &trace_id) {
        Ok(output) if output.success => AdbInfo {
            available: true,
            version_output: output.stdout.trim().to_string(),
            command_path: program,
            error: None,
        },
        Ok(output) => AdbInfo {
            available: false,
            version_output: output.stdout.trim().to_string(),
            command_path: program,
            error: Some(output.stderr.trim().to_string()),
        },
        Err(err) => {
            warn!(trace_id = %trace_id, error = %err.error, "adb check failed");
            AdbInfo {
                available: false,
                version_output: String::new(),
                command_path: program,
                error: Some(err.error),
            }
        }
    };
    respond(trace_id, info)
}

pub fn list_devices(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<Vec<DeviceSummary>>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    info!(trace_id = %trace_id, "list_devices");
    let devices = state.registry.refresh(&trace_id)?;
    respond(trace_id, devices)
}

pub fn select_device(
    state: &BridgeState,
    serial: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<Selection>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let selection = state.registry.select(serial.as_deref(), &trace_id)?;
    respond(trace_id, selection)
}

pub fn get_device_info(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<DeviceInfo>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let info = state.registry.device_info(&trace_id)?;
    respond(trace_id, info)
}

pub fn check_version(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<VersionSupport>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let support = state.registry.version_support(&trace_id)?;
    if !support.supported {
        warn!(trace_id = %trace_id, serial = %support.serial, sdk = support.sdk, "device below minimum sdk");
    }
    respond(trace_id, support)
}

pub fn set_wifi_state(
    state: &BridgeState,
    enable: bool,
    trace_id: Option<String>,
) -> Result<CommandResponse<CommandResult>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let result = wifi::set_wifi_enabled(&state.executor, enable, &trace_id)?;
    respond(trace_id, result)
}

pub fn wifi_status(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<ConnectionStatus>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let status = wifi::wifi_status(&state.executor, &trace_id)?;
    respond(trace_id, status)
}

pub fn wifi_scan(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<Vec<ScanResult>>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let results = wifi::scan(&state.executor, &trace_id)?;
    respond(trace_id, results)
}

pub fn wifi_connect(
    state: &BridgeState,
    request: ConnectRequest,
    cancel: &CancelToken,
    trace_id: Option<String>,
) -> Result<CommandResponse<ConnectOutcome>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let outcome = wifi::connect(&state.executor, &request, cancel, &trace_id)?;
    respond(trace_id, outcome)
}

pub fn wifi_disconnect(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<CommandResult>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let result = wifi::disconnect(&state.executor, &trace_id)?;
    respond(trace_id, result)
}

pub fn list_saved_networks(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<Vec<SavedNetwork>>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let networks = wifi::list_saved_networks(&state.executor, &trace_id)?;
    respond(trace_id, networks)
}

pub fn forget_network(
    state: &BridgeState,
    network_id: u32,
    trace_id: Option<String>,
) -> Result<CommandResponse<CommandResult>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let result = wifi::forget_network(&state.executor, network_id, &trace_id)?;
    respond(trace_id, result)
}

pub fn enterprise_connect(
    state: &BridgeState,
    request: EnterpriseConnectRequest,
    cancel: &CancelToken,
    trace_id: Option<String>,
) -> Result<CommandResponse<EnterpriseResponse>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let response = protocol::connect_enterprise(
        &state.executor,
        &state.config.enterprise,
        &request,
        cancel,
        &trace_id,
    )?;
    respond(trace_id, response)
}

pub fn install_certificate(
    state: &BridgeState,
    request: CertificateInstallRequest,
    cancel: &CancelToken,
    trace_id: Option<String>,
) -> Result<CommandResponse<EnterpriseResponse>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let response = protocol::install_certificate(
        &state.executor,
        &state.config.enterprise,
        &request,
        cancel,
        &trace_id,
    )?;
    respond(trace_id, response)
}

pub fn check_companion(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<AgentStatus>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let status = protocol::check_agent(&state.executor, &state.config.enterprise, &trace_id)?;
    respond(trace_id, status)
}

pub fn ping(
    state: &BridgeState,
    host: String,
    count: Option<u32>,
    trace_id: Option<String>,
) -> Result<CommandResponse<PingResult>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let result = probes::ping(
        &state.executor,
        host.trim(),
        count.unwrap_or(DEFAULT_PING_COUNT),
        &trace_id,
    )?;
    respond(trace_id, result)
}

pub fn dns_lookup(
    state: &BridgeState,
    hostname: String,
    trace_id: Option<String>,
) -> Result<CommandResponse<DnsResult>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let result = probes::dns_lookup(&state.executor, hostname.trim(), &trace_id)?;
    respond(trace_id, result)
}

pub fn check_internet(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<InternetCheck>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let result = probes::check_internet(&state.executor, &state.config.diagnostics, &trace_id)?;
    respond(trace_id, result)
}

pub fn check_captive_portal(
    state: &BridgeState,
    trace_id: Option<String>,
) -> Result<CommandResponse<CaptivePortalCheck>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let result =
        probes::check_captive_portal(&state.executor, &state.config.diagnostics, &trace_id)?;
    respond(trace_id, result)
}

pub fn interface_info(
    state: &BridgeState,
    interface: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<InterfaceInfo>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let interface = interface
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_INTERFACE.to_string());
    let result = probes::interface_info(&state.executor, &interface, &trace_id)?;
    respond(trace_id, result)
}
