use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AdbSettings {
    pub command_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSettings {
    pub default_timeout_secs: u64,
    pub wait_timeout_secs: u64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            wait_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSettings {
    pub min_sdk: u32,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        // `cmd wifi connect-network` first shipped with Android 11.
        Self { min_sdk: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnterpriseSettings {
    pub request_path: String,
    pub result_path: String,
    pub companion_package: String,
    pub receiver_component: String,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for EnterpriseSettings {
    fn default() -> Self {
        Self {
            request_path: "/sdcard/Download/adb_wifi_request.json".to_string(),
            result_path: "/sdcard/Download/adb_wifi_result.json".to_string(),
            companion_package: "dev.adbwifi.companion".to_string(),
            receiver_component: "dev.adbwifi.companion/.CommandReceiver".to_string(),
            poll_interval_ms: 500,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InternetProbe {
    pub url: String,
    pub expected_status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticsSettings {
    pub internet_probes: Vec<InternetProbe>,
    pub captive_probe_url: String,
    pub fallback_ping_host: String,
    pub probe_timeout_secs: u64,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            internet_probes: vec![
                InternetProbe {
                    url: "http://connectivitycheck.gstatic.com/generate_204".to_string(),
                    expected_status: 204,
                },
                InternetProbe {
                    url: "http://www.google.com/generate_204".to_string(),
                    expected_status: 204,
                },
                InternetProbe {
                    url: "http://captive.apple.com/hotspot-detect.html".to_string(),
                    expected_status: 200,
                },
            ],
            captive_probe_url: "http://connectivitycheck.gstatic.com/generate_204".to_string(),
            fallback_ping_host: "8.8.8.8".to_string(),
            probe_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub command: CommandSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub enterprise: EnterpriseSettings,
    #[serde(default)]
    pub diagnostics: DiagnosticsSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("ADB_WIFI_BRIDGE_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    home_dir().join(".adb_wifi_bridge.json")
}

pub fn backup_config_path() -> PathBuf {
    let path = config_path();
    path.with_extension("backup.json")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn load_config(trace_id: &str) -> Result<AppConfig, AppError> {
    load_config_from_path(&config_path(), trace_id)
}

pub fn save_config(config: &AppConfig, trace_id: &str) -> Result<(), AppError> {
    save_config_to_path(config, &config_path(), &backup_config_path(), trace_id)
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), trace_id))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), trace_id))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &AppConfig,
    path: &Path,
    backup_path: &Path,
    trace_id: &str,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config).map_err(|err| {
        AppError::system(format!("Failed to serialize config: {err}"), trace_id)
    })?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), trace_id))?;
    Ok(())
}

pub fn validate_config(mut config: AppConfig) -> AppConfig {
    let defaults = AppConfig::default();
    if config.command.default_timeout_secs == 0 {
        config.command.default_timeout_secs = defaults.command.default_timeout_secs;
    }
    if config.command.wait_timeout_secs < config.command.default_timeout_secs {
        config.command.wait_timeout_secs = config
            .command
            .default_timeout_secs
            .max(defaults.command.wait_timeout_secs);
    }
    if !(50..=10_000).contains(&config.enterprise.poll_interval_ms) {
        config.enterprise.poll_interval_ms = defaults.enterprise.poll_interval_ms;
    }
    if config.enterprise.timeout_secs == 0 {
        config.enterprise.timeout_secs = defaults.enterprise.timeout_secs;
    }
    if config.enterprise.request_path.trim().is_empty() {
        config.enterprise.request_path = defaults.enterprise.request_path;
    }
    if config.enterprise.result_path.trim().is_empty()
        || config.enterprise.result_path == config.enterprise.request_path
    {
        config.enterprise.result_path = defaults.enterprise.result_path;
    }
    if config.diagnostics.internet_probes.is_empty() {
        config.diagnostics.internet_probes = defaults.diagnostics.internet_probes;
    }
    if config.diagnostics.probe_timeout_secs == 0 {
        config.diagnostics.probe_timeout_secs = defaults.diagnostics.probe_timeout_secs;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().expect("tmp");
        let config = load_config_from_path(&dir.path().join("nope.json"), "t").expect("config");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.command.default_timeout_secs, 30);
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            serde_json::json!({ "adb": { "command_path": "/opt/adb" } }).to_string(),
        )
        .expect("write");
        let config = load_config_from_path(&path, "t").expect("config");
        assert_eq!(config.adb.command_path, "/opt/adb");
        assert_eq!(config.enterprise, EnterpriseSettings::default());
    }

    #[test]
    fn save_then_load_keeps_backup() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("config.json");
        let backup = dir.path().join("config.backup.json");
        let mut config = AppConfig::default();
        save_config_to_path(&config, &path, &backup, "t").expect("save");
        config.device.min_sdk = 33;
        save_config_to_path(&config, &path, &backup, "t").expect("save again");

        assert_eq!(load_config_from_path(&path, "t").expect("load").device.min_sdk, 33);
        assert_eq!(load_config_from_path(&backup, "t").expect("backup").device.min_sdk, 30);
    }

    #[test]
    fn clamps_invalid_values() {
        let mut config = AppConfig::default();
        config.command.default_timeout_secs = 0;
        config.command.wait_timeout_secs = 1;
        config.enterprise.poll_interval_ms = 1;
        config.enterprise.result_path = config.enterprise.request_path.clone();
        config.diagnostics.internet_probes.clear();
        let validated = validate_config(config);
        assert_eq!(validated.command.default_timeout_secs, 30);
        assert_eq!(validated.command.wait_timeout_secs, 60);
        assert_eq!(validated.enterprise.poll_interval_ms, 500);
        assert_ne!(validated.enterprise.result_path, validated.enterprise.request_path);
        assert_eq!(validated.diagnostics.internet_probes.len(), 3);
    }
}
