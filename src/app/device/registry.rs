use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::{info, warn};

use crate::app::adb::bridge::AdbBridge;
use crate::app::adb::parse::{parse_adb_devices, parse_getprop_value};
use crate::app::error::AppError;
use crate::app::models::{DeviceInfo, DeviceSummary, Selection, VersionSupport, UNKNOWN};

const PROP_MODEL: &str = "ro.product.model";
const PROP_BRAND: &str = "ro.product.brand";
const PROP_MANUFACTURER: &str = "ro.product.manufacturer";
const PROP_RELEASE: &str = "ro.build.version.release";
const PROP_SDK: &str = "ro.build.version.sdk";
const PROP_BUILD_ID: &str = "ro.build.id";

const PROP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RegistryState {
    selected: Option<String>,
    info_cache: HashMap<String, DeviceInfo>,
}

/// Sole owner of "which device commands target" and of the identity cache.
pub struct DeviceRegistry {
    bridge: AdbBridge,
    timeout: Duration,
    min_sdk: u32,
    state: Mutex<RegistryState>,
}

impl DeviceRegistry {
    pub fn new(bridge: AdbBridge, timeout: Duration, min_sdk: u32) -> Self {
        Self {
            bridge,
            timeout,
            min_sdk,
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn state(&self, trace_id: &str) -> Result<MutexGuard<'_, RegistryState>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::system("Device registry lock poisoned", trace_id))
    }

    pub fn enumerate(&self, trace_id: &str) -> Result<Vec<DeviceSummary>, AppError> {
        let output = self
            .bridge
            .host(&["devices", "-l"], self.timeout, trace_id)?
            .into_result("adb devices", trace_id)?;
        Ok(parse_adb_devices(&output.stdout))
    }

    /// Re-enumerates, caches identity for newly ready devices, evicts vanished ones and
    /// clears a selection whose device is gone.
    pub fn refresh(&self, trace_id: &str) -> Result<Vec<DeviceSummary>, AppError> {
        let devices = self.enumerate(trace_id)?;
        let present: HashSet<&str> = devices.iter().map(|device| device.serial.as_str()).collect();

        let uncached: Vec<String> = {
            let state = self.state(trace_id)?;
            devices
                .iter()
                .filter(|device| device.state.is_ready())
                .filter(|device| !state.info_cache.contains_key(&device.serial))
                .map(|device| device.serial.clone())
                .collect()
        };
        // Property reads run without the registry lock held.
        let fresh: Vec<DeviceInfo> = uncached
            .iter()
            .map(|serial| self.query_device_info(serial, trace_id))
            .collect();

        let mut state = self.state(trace_id)?;
        for info in fresh {
            state.info_cache.insert(info.serial.clone(), info);
        }
        state
            .info_cache
            .retain(|serial, _| present.contains(serial.as_str()));
        if let Some(selected) = state.selected.clone() {
            if !present.contains(selected.as_str()) {
                info!(trace_id = %trace_id, serial = %selected, "selected device disappeared; clearing selection");
                state.selected = None;
            }
        }
        Ok(devices)
    }

    /// Unknown serials are accepted; the device may have just been attached.
    pub fn select(&self, serial: Option<&str>, trace_id: &str) -> Result<Selection, AppError> {
        let serial = serial
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let mut state = self.state(trace_id)?;
        info!(trace_id = %trace_id, serial = ?serial, "select device");
        state.selected = serial.clone();
        Ok(Selection { selected: serial })
    }

    pub fn selected(&self, trace_id: &str) -> Result<Option<String>, AppError> {
        Ok(self.state(trace_id)?.selected.clone())
    }

    pub fn ensure_selected(&self, trace_id: &str) -> Result<String, AppError> {
        if let Some(serial) = self.selected(trace_id)? {
            return Ok(serial);
        }
        let devices = self.refresh(trace_id)?;
        let ready: Vec<String> = devices
            .into_iter()
            .filter(|device| device.state.is_ready())
            .map(|device| device.serial)
            .collect();
        match ready.as_slice() {
            [] => Err(AppError::no_device(trace_id)),
            [only] => {
                let mut state = self.state(trace_id)?;
                // A concurrent explicit selection wins over auto-selection.
                let serial = state.selected.get_or_insert_with(|| only.clone()).clone();
                info!(trace_id = %trace_id, serial = %serial, "auto-selected the only ready device");
                Ok(serial)
            }
            many => Err(AppError::ambiguous_device(many, trace_id)),
        }
    }

    pub fn device_info(&self, trace_id: &str) -> Result<DeviceInfo, AppError> {
        let serial = self.ensure_selected(trace_id)?;
        if let Some(info) = self.state(trace_id)?.info_cache.get(&serial) {
            return Ok(info.clone());
        }
        let info = self.query_device_info(&serial, trace_id);
        self.state(trace_id)?
            .info_cache
            .insert(serial, info.clone());
        Ok(info)
    }

    /// Advisory only: read-only operations may still work below the minimum.
    pub fn version_support(&self, trace_id: &str) -> Result<VersionSupport, AppError> {
        let info = self.device_info(trace_id)?;
        Ok(evaluate_version(&info, self.min_sdk))
    }

    fn query_device_info(&self, serial: &str, trace_id: &str) -> DeviceInfo {
        let read = |key: &str| -> String {
            let command = format!("getprop {key}");
            match self.bridge.shell_on(serial, &command, PROP_TIMEOUT, trace_id) {
                Ok(output) if output.success => {
                    parse_getprop_value(&output.stdout).unwrap_or_else(|| UNKNOWN.to_string())
                }
                Ok(output) => {
                    warn!(trace_id = %trace_id, serial = %serial, key, stderr = %output.stderr.trim(), "property read failed");
                    UNKNOWN.to_string()
                }
                Err(err) => {
                    warn!(trace_id = %trace_id, serial = %serial, key, error = %err, "property read failed");
                    UNKNOWN.to_string()
                }
            }
        };

        DeviceInfo {
            serial: serial.to_string(),
            model: read(PROP_MODEL),
            brand: read(PROP_BRAND),
            manufacturer: read(PROP_MANUFACTURER),
            android_version: read(PROP_RELEASE),
            sdk: read(PROP_SDK).parse::<u32>().unwrap_or(0),
            build_id: read(PROP_BUILD_ID),
        }
    }
}

fn evaluate_version(info: &DeviceInfo, min_sdk: u32) -> VersionSupport {
    let (supported, message) = if info.sdk == 0 {
        (
            false,
            "Could not determine the device SDK level; WiFi operations may fail".to_string(),
        )
    } else if info.sdk < min_sdk {
        (
            false,
            format!(
                "Android {} (SDK {}) is below the minimum SDK {min_sdk}; connect and enterprise operations may fail, read-only operations may still work",
                info.android_version, info.sdk
            ),
        )
    } else {
        (
            true,
            format!("Android {} (SDK {}) is supported", info.android_version, info.sdk),
        )
    };
    VersionSupport {
        serial: info.serial.clone(),
        sdk: info.sdk,
        android_version: info.android_version.clone(),
        min_sdk,
        supported,
        message,
    }
}
