use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use adb_wifi_bridge_lib::app::enterprise::models::{CertificateKind, EapMethod, Phase2};
use adb_wifi_bridge_lib::app::models::WifiSecurity;

#[derive(Parser, Debug)]
#[command(
    name = "adb-wifi",
    author,
    version,
    about = "Drive WiFi configuration and diagnostics on an Android device over adb"
)]
pub struct Cli {
    /// Device serial to target (defaults to the only ready device)
    #[arg(long, short = 's', env = "ANDROID_SERIAL", global = true)]
    pub serial: Option<String>,

    /// Path to the adb binary, overriding the config file
    #[arg(long, env = "ADB_WIFI_BRIDGE_ADB", global = true)]
    pub adb: Option<String>,

    /// Trace id attached to logs and responses
    #[arg(long, global = true)]
    pub trace_id: Option<String>,

    /// Log level when RUST_LOG is unset (overrides the config file)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that adb can be spawned
    CheckAdb,
    #[command(subcommand)]
    Config(ConfigCommand),
    #[command(subcommand)]
    Device(DeviceCommand),
    #[command(subcommand)]
    Wifi(WifiCommand),
    #[command(subcommand)]
    Enterprise(EnterpriseCommand),
    #[command(subcommand)]
    Diag(DiagCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write the default configuration to the config path
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// List attached devices
    List,
    /// Identity of the target device
    Info,
    /// Compare the device SDK level against the configured minimum
    Version,
}

#[derive(Subcommand, Debug)]
pub enum WifiCommand {
    Enable,
    Disable,
    Status,
    Scan,
    Connect(ConnectArgs),
    Disconnect,
    /// List saved networks
    Saved,
    /// Forget a saved network by id
    Forget {
        network_id: u32,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SecurityArg {
    Open,
    Owe,
    Wep,
    Wpa2,
    Wpa3,
}

impl From<SecurityArg> for WifiSecurity {
    fn from(value: SecurityArg) -> Self {
        match value {
            SecurityArg::Open => WifiSecurity::Open,
            SecurityArg::Owe => WifiSecurity::Owe,
            SecurityArg::Wep => WifiSecurity::Wep,
            SecurityArg::Wpa2 => WifiSecurity::Wpa2,
            SecurityArg::Wpa3 => WifiSecurity::Wpa3,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    pub ssid: String,

    #[arg(long, value_enum, default_value_t = SecurityArg::Wpa2)]
    pub security: SecurityArg,

    #[arg(long, env = "ADB_WIFI_PASSWORD")]
    pub password: Option<String>,

    /// Wait until the device reports being connected to the network
    #[arg(long)]
    pub wait: bool,
}

#[derive(Subcommand, Debug)]
pub enum EnterpriseCommand {
    /// Check whether the companion agent is installed
    Agent,
    Connect(EnterpriseConnectArgs),
    InstallCert(InstallCertArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum EapArg {
    Peap,
    Ttls,
    Tls,
}

impl From<EapArg> for EapMethod {
    fn from(value: EapArg) -> Self {
        match value {
            EapArg::Peap => EapMethod::Peap,
            EapArg::Ttls => EapMethod::Ttls,
            EapArg::Tls => EapMethod::Tls,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Phase2Arg {
    Mschapv2,
    Gtc,
    Pap,
}

impl From<Phase2Arg> for Phase2 {
    fn from(value: Phase2Arg) -> Self {
        match value {
            Phase2Arg::Mschapv2 => Phase2::Mschapv2,
            Phase2Arg::Gtc => Phase2::Gtc,
            Phase2Arg::Pap => Phase2::Pap,
        }
    }
}

#[derive(Args, Debug)]
pub struct EnterpriseConnectArgs {
    pub ssid: String,

    #[arg(long, value_enum)]
    pub method: EapArg,

    #[arg(long)]
    pub identity: String,

    #[arg(long, env = "ADB_WIFI_PASSWORD")]
    pub password: Option<String>,

    #[arg(long)]
    pub anonymous_identity: Option<String>,

    #[arg(long, value_enum)]
    pub phase2: Option<Phase2Arg>,

    /// Alias of an installed CA certificate
    #[arg(long)]
    pub ca_cert: Option<String>,

    /// Alias of an installed client certificate (TLS)
    #[arg(long)]
    pub client_cert: Option<String>,

    /// Alias of the client private key (TLS)
    #[arg(long)]
    pub private_key: Option<String>,

    #[arg(long)]
    pub domain: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CertKindArg {
    Ca,
    User,
}

impl From<CertKindArg> for CertificateKind {
    fn from(value: CertKindArg) -> Self {
        match value {
            CertKindArg::Ca => CertificateKind::Ca,
            CertKindArg::User => CertificateKind::User,
        }
    }
}

#[derive(Args, Debug)]
pub struct InstallCertArgs {
    /// PEM or DER file on the host
    pub file: PathBuf,

    #[arg(long)]
    pub alias: String,

    #[arg(long, value_enum, default_value_t = CertKindArg::Ca)]
    pub kind: CertKindArg,
}

#[derive(Subcommand, Debug)]
pub enum DiagCommand {
    Ping {
        host: String,
        #[arg(long, short = 'c')]
        count: Option<u32>,
    },
    Dns {
        hostname: String,
    },
    Internet,
    Captive,
    Interface {
        #[arg(default_value = "wlan0")]
        name: String,
    },
}
