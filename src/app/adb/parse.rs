use crate::app::models::{DeviceState, DeviceSummary};

/// Parses `adb devices -l`: `serial<ws>state[<ws>key:value]*` per line.
pub fn parse_adb_devices(output: &str) -> Vec<DeviceSummary> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let mut summary = DeviceSummary {
                serial: tokens[0].to_string(),
                state: DeviceState::from_adb(tokens[1]),
                model: None,
                product: None,
                device: None,
                transport_id: None,
            };
            for token in tokens.iter().skip(2) {
                let Some((key, value)) = token.split_once(':') else {
                    continue;
                };
                let value = Some(value.to_string());
                match key {
                    "model" => summary.model = value,
                    "product" => summary.product = value,
                    "device" => summary.device = value,
                    "transport_id" => summary.transport_id = value,
                    _ => {}
                }
            }
            Some(summary)
        })
        .collect()
}

/// First non-empty line of a single `getprop <key>` read.
pub fn parse_getprop_value(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

pub fn parse_settings_bool(output: &str) -> Option<bool> {
    let value = output
        .lines()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())?;
    if let Ok(num) = value.parse::<i32>() {
        return Some(num != 0);
    }
    match value.to_lowercase().as_str() {
        "true" | "on" | "enabled" => Some(true),
        "false" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// `pm list packages <name>` prefix-matches, so the exact name must be checked.
pub fn parse_package_present(output: &str, package: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .any(|name| name.trim() == package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_adb_devices_output() {
        let output = "List of devices attached\n0123456789ABCDEF device product:sdk_gphone64_arm64 model:Pixel_7 device:emu64a transport_id:1\nemulator-5554 unauthorized transport_id:2\n";
        let parsed = parse_adb_devices(output);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].serial, "0123456789ABCDEF");
        assert_eq!(parsed[0].state, DeviceState::Ready);
        assert_eq!(parsed[0].model.as_deref(), Some("Pixel_7"));
        assert_eq!(parsed[0].transport_id.as_deref(), Some("1"));
        assert_eq!(parsed[1].state, DeviceState::Unauthorized);
        assert_eq!(parsed[1].model, None);
    }

    #[test]
    fn skips_daemon_chatter_and_single_token_lines() {
        let output = "* daemon not running; starting now at tcp:5037\n* daemon started successfully\nList of devices attached\nlonely\nR58M offline\n";
        let parsed = parse_adb_devices(output);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].serial, "R58M");
        assert_eq!(parsed[0].state, DeviceState::Offline);
    }

    #[test]
    fn no_permissions_state_is_recognized() {
        let output = "List of devices attached\n0123 no permissions (user in plugdev group); see [http://developer.android.com/tools/device.html]\n";
        let parsed = parse_adb_devices(output);
        assert_eq!(parsed[0].state, DeviceState::NoPermissions);
    }

    #[test]
    fn parses_getprop_value() {
        assert_eq!(parse_getprop_value("\n Pixel 7 \n").as_deref(), Some("Pixel 7"));
        assert_eq!(parse_getprop_value("  \n"), None);
    }

    #[test]
    fn parses_settings_bool() {
        assert_eq!(parse_settings_bool("1"), Some(true));
        assert_eq!(parse_settings_bool("0"), Some(false));
        assert_eq!(parse_settings_bool("disabled"), Some(false));
        assert_eq!(parse_settings_bool("null"), None);
    }

    #[test]
    fn package_presence_requires_exact_name() {
        let output = "package:dev.adbwifi.companion.debug\npackage:dev.adbwifi.companion\n";
        assert!(parse_package_present(output, "dev.adbwifi.companion"));
        assert!(!parse_package_present(
            "package:dev.adbwifi.companion.debug\n",
            "dev.adbwifi.companion"
        ));
    }
}
