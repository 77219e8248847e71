use std::sync::OnceLock;

use regex::Regex;

use crate::app::models::{
    ConnectionStatus, SavedNetwork, ScanResult, SecurityLabel, HIDDEN_SSID, UNKNOWN,
};

/// Evaluated top to bottom against the upper-cased capability flags; first hit wins.
/// Real flags stack markers (`[WPA2-PSK-CCMP][RSN-PSK-CCMP]`), so order matters.
pub const SECURITY_MARKERS: &[(&str, SecurityLabel)] = &[
    ("SAE", SecurityLabel::Wpa3Sae),
    ("WPA3", SecurityLabel::Wpa3),
    ("WPA2", SecurityLabel::Wpa2),
    ("WPA", SecurityLabel::Wpa),
    ("WEP", SecurityLabel::Wep),
    ("OWE", SecurityLabel::Owe),
    // Bare RSN without a WPA2 alias; after OWE, which is also RSN-framed.
    ("RSN", SecurityLabel::Wpa2),
];

/// Both must be read as "connected"; either one is enough.
pub const CONNECTED_MARKERS: &[&str] = &["Wifi is connected", "CONNECTED/CONNECTED"];

const SSID_ABSENT: &[&str] = &["none", "<unknown ssid>", "<none>"];
const PLACEHOLDER_BSSIDS: &[&str] = &["00:00:00:00:00:00", "02:00:00:00:00:00"];

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect(stringify!($name)))
        }
    };
}

static_regex!(mac_re, r"^[0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5}$");
static_regex!(frequency_re, r"^\d{4,5}$");
static_regex!(rssi_token_re, r"^[+-]?\d{1,3}$");

static_regex!(status_ssid_re, r#"(?:\bSSID:\s*|Wifi is connected to\s+)(?:"([^"]*)"|([^,\r\n]*))"#);
static_regex!(status_bssid_re, r"\bBSSID:\s*([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})");
static_regex!(status_ip_re, r"(?:\binet\s+|\bIP:\s*/?)(\d{1,3}(?:\.\d{1,3}){3})");
static_regex!(status_link_speed_re, r"\bLink speed:\s*(\d+)\s*Mbps");
static_regex!(status_rssi_re, r"\bRSSI:\s*(-?\d+)");
static_regex!(status_frequency_re, r"\bFrequency:\s*(\d+)\s*MHz");

static_regex!(saved_keyed_id_re, r"(?i)\b(?:network\s+)?id\s*[:=]\s*(\d+)\b");
static_regex!(saved_table_header_re, r"(?i)^\s*network\s+id\s+ssid\b");
static_regex!(saved_row_id_re, r"^\s*(\d+)\s");
static_regex!(saved_quoted_ssid_re, r#""([^"]*)""#);
static_regex!(saved_keyed_ssid_re, r"(?i)\bssid\s*[:=]\s*([^,\t]+?)\s*(?:,|\t|$)");
static_regex!(saved_column_ssid_re, r"^\s*\d+\s+(.+?)(?:\s{2,}|\t|$)");

pub fn security_label(capabilities: &str) -> SecurityLabel {
    let upper = capabilities.to_uppercase();
    SECURITY_MARKERS
        .iter()
        .find(|(marker, _)| upper.contains(marker))
        .map(|(_, label)| *label)
        .unwrap_or(SecurityLabel::Open)
}

/// Parses `cmd wifi list-scan-results`. Lines without a valid BSSID in the first column are
/// dropped.
pub fn parse_scan_results(output: &str) -> Vec<ScanResult> {
    output.lines().filter_map(parse_scan_line).collect()
}

fn parse_scan_line(line: &str) -> Option<ScanResult> {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_scan_header(trimmed) {
        return None;
    }
    let (prefix, capabilities) = match trimmed.find('[') {
        Some(index) => (&trimmed[..index], trimmed[index..].trim()),
        None => (trimmed, ""),
    };
    let tokens: Vec<&str> = prefix.split_whitespace().collect();

    let bssid = tokens
        .first()
        .filter(|token| mac_re().is_match(token))?
        .to_lowercase();
    let frequency_mhz = tokens
        .get(1)
        .filter(|token| frequency_re().is_match(token))
        .and_then(|token| token.parse::<u32>().ok());
    let rssi_dbm = tokens
        .get(2)
        .filter(|token| rssi_token_re().is_match(token))
        .and_then(|token| token.parse::<i32>().ok());
    // tokens[3] is the age column.
    let ssid = tokens.get(4..).map(|rest| rest.join(" ")).unwrap_or_default();

    Some(ScanResult {
        ssid: if ssid.is_empty() {
            HIDDEN_SSID.to_string()
        } else {
            ssid
        },
        bssid,
        frequency_mhz,
        rssi_dbm,
        security: security_label(capabilities),
        capabilities: capabilities.to_string(),
    })
}

fn is_scan_header(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|token| token.eq_ignore_ascii_case("BSSID"))
}

/// Parses a status dump (`cmd wifi status`, `mWifiInfo` lines, `ip addr`). Every field is
/// matched independently; a field with no match stays `None`.
pub fn parse_connection_status(output: &str) -> ConnectionStatus {
    let capture = |re: &Regex| -> Option<String> {
        re.captures(output)
            .and_then(|caps| caps.get(1))
            .map(|value| value.as_str().trim().to_string())
    };

    let ssid = status_ssid_re()
        .captures_iter(output)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|value| value.as_str().trim().to_string())
        .find(|value| {
            !value.is_empty()
                && !SSID_ABSENT
                    .iter()
                    .any(|absent| value.eq_ignore_ascii_case(absent))
        });
    let bssid = capture(status_bssid_re())
        .map(|value| value.to_lowercase())
        .filter(|value| !PLACEHOLDER_BSSIDS.contains(&value.as_str()));

    ConnectionStatus {
        enabled: output.contains("Wifi is enabled"),
        connected: CONNECTED_MARKERS
            .iter()
            .any(|marker| output.contains(marker)),
        ssid,
        bssid,
        ip_address: capture(status_ip_re()),
        link_speed_mbps: capture(status_link_speed_re()).and_then(|v| v.parse().ok()),
        rssi_dbm: capture(status_rssi_re()).and_then(|v| v.parse().ok()),
        frequency_mhz: capture(status_frequency_re()).and_then(|v| v.parse().ok()),
    }
}

/// Parses saved-network listings in any of the shapes devices print:
/// `0  "HomeNet"  wpa2-psk`, `ID: 3, SSID: HomeNet`, `Network ID: 3 SSID: "Home Net"`.
/// A bare leading number is an id only in rows under a `Network Id  SSID` header.
pub fn parse_saved_networks(output: &str) -> Vec<SavedNetwork> {
    let mut in_table = false;
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            if saved_table_header_re().is_match(line) {
                in_table = true;
                return None;
            }
            let row_id = || in_table.then(|| saved_row_id_re().captures(line)).flatten();
            let network_id = saved_keyed_id_re()
                .captures(line)
                .or_else(row_id)
                .and_then(|caps| caps[1].parse::<u32>().ok())?;
            let ssid = [
                saved_quoted_ssid_re(),
                saved_keyed_ssid_re(),
                saved_column_ssid_re(),
            ]
            .iter()
            .find_map(|re| re.captures(line))
            .map(|caps| caps[1].trim().trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
            Some(SavedNetwork { network_id, ssid })
        })
        .collect()
}
