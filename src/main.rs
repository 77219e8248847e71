mod cli;

use clap::Parser;
use serde::Serialize;

use adb_wifi_bridge_lib::app::cancel::CancelToken;
use adb_wifi_bridge_lib::app::commands::{self, resolve_trace_id};
use adb_wifi_bridge_lib::app::config::{load_config, AppConfig};
use adb_wifi_bridge_lib::app::enterprise::models::{
    CertificateInstallRequest, CertificateSource, EnterpriseConnectRequest,
};
use adb_wifi_bridge_lib::app::error::AppError;
use adb_wifi_bridge_lib::app::logging::init_logging;
use adb_wifi_bridge_lib::app::models::{CommandResponse, ConnectRequest};
use adb_wifi_bridge_lib::app::state::BridgeState;

use crate::cli::{
    Cli, Commands, ConfigCommand, DeviceCommand, DiagCommand, EnterpriseCommand, WifiCommand,
};

fn main() {
    let cli = Cli::parse();
    let trace_id = resolve_trace_id(cli.trace_id.clone());

    let code = match load_config(&trace_id) {
        Ok(config) => {
            let level = cli
                .log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone());
            init_logging(&level);
            run(cli, config, trace_id)
        }
        Err(err) => {
            init_logging("info");
            print_error(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli, config: AppConfig, trace_id: String) -> i32 {
    let state = BridgeState::new(config, cli.adb.as_deref());
    if let Some(serial) = cli.serial.as_deref() {
        if let Err(err) = state.registry.select(Some(serial), &trace_id) {
            return print_error(&err);
        }
    }
    let cancel = CancelToken::new();
    let trace = Some(trace_id);

    match cli.command {
        Commands::CheckAdb => emit(commands::check_adb(&state, trace)),
        Commands::Config(ConfigCommand::Show) => emit(commands::get_config(&state, trace)),
        Commands::Config(ConfigCommand::Reset) => {
            emit(commands::save_app_config(AppConfig::default(), trace))
        }
        Commands::Device(DeviceCommand::List) => emit(commands::list_devices(&state, trace)),
        Commands::Device(DeviceCommand::Info) => emit(commands::get_device_info(&state, trace)),
        Commands::Device(DeviceCommand::Version) => emit(commands::check_version(&state, trace)),
        Commands::Wifi(command) => match command {
            WifiCommand::Enable => emit(commands::set_wifi_state(&state, true, trace)),
            WifiCommand::Disable => emit(commands::set_wifi_state(&state, false, trace)),
            WifiCommand::Status => emit(commands::wifi_status(&state, trace)),
            WifiCommand::Scan => emit(commands::wifi_scan(&state, trace)),
            WifiCommand::Connect(args) => {
                let request = ConnectRequest {
                    ssid: args.ssid,
                    security: args.security.into(),
                    password: args.password,
                    wait: args.wait,
                };
                emit(commands::wifi_connect(&state, request, &cancel, trace))
            }
            WifiCommand::Disconnect => emit(commands::wifi_disconnect(&state, trace)),
            WifiCommand::Saved => emit(commands::list_saved_networks(&state, trace)),
            WifiCommand::Forget { network_id } => {
                emit(commands::forget_network(&state, network_id, trace))
            }
        },
        Commands::Enterprise(command) => match command {
            EnterpriseCommand::Agent => emit(commands::check_companion(&state, trace)),
            EnterpriseCommand::Connect(args) => {
                let request = EnterpriseConnectRequest {
                    ssid: args.ssid,
                    method: Some(args.method.into()),
                    identity: args.identity,
                    password: args.password,
                    anonymous_identity: args.anonymous_identity,
                    phase2: args.phase2.map(Into::into),
                    ca_certificate: args.ca_cert,
                    client_certificate: args.client_cert,
                    private_key: args.private_key,
                    domain: args.domain,
                };
                emit(commands::enterprise_connect(&state, request, &cancel, trace))
            }
            EnterpriseCommand::InstallCert(args) => {
                let request = CertificateInstallRequest {
                    alias: args.alias,
                    kind: args.kind.into(),
                    source: CertificateSource::File(args.file),
                };
                emit(commands::install_certificate(&state, request, &cancel, trace))
            }
        },
        Commands::Diag(command) => match command {
            DiagCommand::Ping { host, count } => emit(commands::ping(&state, host, count, trace)),
            DiagCommand::Dns { hostname } => emit(commands::dns_lookup(&state, hostname, trace)),
            DiagCommand::Internet => emit(commands::check_internet(&state, trace)),
            DiagCommand::Captive => emit(commands::check_captive_portal(&state, trace)),
            DiagCommand::Interface { name } => {
                emit(commands::interface_info(&state, Some(name), trace))
            }
        },
    }
}

fn emit<T: Serialize>(result: Result<CommandResponse<T>, AppError>) -> i32 {
    match result {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(json) => {
                println!("{json}");
                0
            }
            Err(err) => print_error(&AppError::system(
                format!("Failed to encode response: {err}"),
                response.trace_id,
            )),
        },
        Err(err) => print_error(&err),
    }
}

fn print_error(err: &AppError) -> i32 {
    match serde_json::to_string_pretty(err) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{err}"),
    }
    1
}
