use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;

use crate::app::models::{CaptivePortalCheck, InterfaceInfo, PingResult};

pub const TOTAL_LOSS_MARKER: &str = "100% packet loss";

fn rtt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"=\s*[\d.]+/([\d.]+)/").expect("rtt regex"))
}

fn loss_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\d.]+)%\s+packet loss").expect("loss regex"))
}

fn ipv4_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,3}(?:\.\d{1,3}){3}$").expect("ipv4 regex"))
}

fn nslookup_address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*address(?:es)?\s*\d*\s*:\s*(\S+)").expect("nslookup regex")
    })
}

fn ping_reply_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^PING\s+\S+\s+\(([^)]+)\)").expect("ping reply regex"))
}

/// Alive unless the output is empty or reports total loss.
pub fn parse_ping(host: &str, output: &str) -> PingResult {
    PingResult {
        host: host.to_string(),
        alive: !output.trim().is_empty() && !output.contains(TOTAL_LOSS_MARKER),
        avg_rtt_ms: rtt_re()
            .captures(output)
            .and_then(|caps| caps[1].parse::<f64>().ok()),
        packet_loss_pct: loss_re()
            .captures(output)
            .and_then(|caps| caps[1].parse::<f64>().ok()),
        raw_output: output.to_string(),
    }
}

fn is_ipv4(value: &str) -> bool {
    ipv4_re().is_match(value) && value.parse::<std::net::Ipv4Addr>().is_ok()
}

/// Answer addresses from `nslookup`, IPv4 only. The resolver's own `Address:` line comes
/// before the first `Name:` line and is skipped.
pub fn parse_nslookup(output: &str) -> Vec<String> {
    let mut in_answer = false;
    let mut addresses = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.to_lowercase().starts_with("name:") {
            in_answer = true;
            continue;
        }
        if !in_answer {
            continue;
        }
        let Some(caps) = nslookup_address_re().captures(trimmed) else {
            continue;
        };
        let address = caps[1].split('#').next().unwrap_or_default();
        if is_ipv4(address) && !addresses.iter().any(|seen| seen == address) {
            addresses.push(address.to_string());
        }
    }
    addresses
}

/// `getent hosts` prints `<address> <name> [aliases]` per line.
pub fn parse_getent_hosts(output: &str) -> Vec<String> {
    let mut addresses: Vec<String> = Vec::new();
    for token in output.lines().filter_map(|line| line.split_whitespace().next()) {
        if token.parse::<IpAddr>().is_ok() && !addresses.iter().any(|seen| seen == token) {
            addresses.push(token.to_string());
        }
    }
    addresses
}

/// The replied-to address in `PING host (1.2.3.4) ...`.
pub fn parse_ping_address(output: &str) -> Vec<String> {
    ping_reply_re()
        .captures(output)
        .map(|caps| caps[1].trim().to_string())
        .filter(|address| address.parse::<IpAddr>().is_ok())
        .into_iter()
        .collect()
}

/// Parses curl's `-w '%{http_code} %{redirect_url}'`. A `000` code means no response.
pub fn parse_http_probe(output: &str) -> (Option<u16>, Option<String>) {
    let mut parts = output.trim().splitn(2, char::is_whitespace);
    let status = parts
        .next()
        .and_then(|code| code.trim().parse::<u16>().ok())
        .filter(|code| *code != 0);
    let redirect = parts
        .next()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    (status, redirect)
}

pub fn is_success_status(status: u16, expected: u16) -> bool {
    status == expected || (200..400).contains(&status)
}

/// 204 means no portal whatever the redirect says; a redirect with a target is a portal; a
/// 200 is a portal only if it served content instead of the expected empty body.
pub fn classify_captive_probe(
    probe_url: &str,
    status: Option<u16>,
    redirect: Option<&str>,
    content: Option<&str>,
) -> CaptivePortalCheck {
    let portal_url = match (status, redirect) {
        (Some(204), _) => None,
        (Some(301 | 302), Some(target)) if !target.trim().is_empty() => {
            Some(target.trim().to_string())
        }
        (Some(200), _) if content.is_some_and(|body| !body.trim().is_empty()) => {
            Some(probe_url.to_string())
        }
        _ => None,
    };
    CaptivePortalCheck {
        is_captive: portal_url.is_some(),
        portal_url,
        status_code: status,
    }
}

/// Parses `ip addr show <iface>`.
pub fn parse_ip_addr(iface: &str, output: &str) -> InterfaceInfo {
    let mut info = InterfaceInfo {
        name: iface.to_string(),
        ..InterfaceInfo::default()
    };
    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let value_after = |key: &str| -> Option<String> {
            tokens
                .iter()
                .position(|token| *token == key)
                .and_then(|index| tokens.get(index + 1))
                .map(|value| value.to_string())
        };
        match tokens.first().copied() {
            Some("link/ether") => info.mac = tokens.get(1).map(|value| value.to_lowercase()),
            Some("inet") => info.ipv4.extend(tokens.get(1).map(|value| value.to_string())),
            Some("inet6") => info.ipv6.extend(tokens.get(1).map(|value| value.to_string())),
            Some(first) if first.ends_with(':') && line.contains("mtu") => {
                info.mtu = value_after("mtu").and_then(|value| value.parse().ok());
                info.state = value_after("state");
            }
            _ => {}
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const PING_OK: &str = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=12.1 ms\n\n--- 8.8.8.8 ping statistics ---\n3 packets transmitted, 3 received, 0% packet loss, time 2003ms\nrtt min/avg/max/mdev = 11.802/12.345/13.001/0.480 ms\n";
    const PING_LOST: &str = "PING 10.9.9.9 (10.9.9.9) 56(84) bytes of data.\n\n--- 10.9.9.9 ping statistics ---\n2 packets transmitted, 0 received, 100% packet loss, time 1010ms\n";

    #[test]
    fn parses_successful_ping() {
        let result = parse_ping("8.8.8.8", PING_OK);
        assert!(result.alive);
        assert_eq!(result.avg_rtt_ms, Some(12.345));
        assert_eq!(result.packet_loss_pct, Some(0.0));
    }

    #[test]
    fn total_loss_is_not_alive() {
        let result = parse_ping("10.9.9.9", PING_LOST);
        assert!(!result.alive);
        assert_eq!(result.avg_rtt_ms, None);
        assert_eq!(result.packet_loss_pct, Some(100.0));
    }

    #[test]
    fn partial_loss_still_alive() {
        let output = "4 packets transmitted, 2 received, 50% packet loss\n";
        let result = parse_ping("h", output);
        assert!(result.alive);
        assert_eq!(result.packet_loss_pct, Some(50.0));
    }

    #[test]
    fn nslookup_skips_server_and_ipv6() {
        let output = "Server:\t\t8.8.8.8\nAddress:\t8.8.8.8#53\n\nNon-authoritative answer:\nName:\tgoogle.com\nAddress: 142.250.72.14\nName:\tgoogle.com\nAddress: 2607:f8b0:4005:80c::200e\n";
        assert_eq!(parse_nslookup(output), vec!["142.250.72.14"]);
    }

    #[test]
    fn nslookup_busybox_format() {
        let output = "Server:    10.0.2.3\nAddress 1: 10.0.2.3\n\nName:      example.com\nAddress 1: 93.184.216.34\nAddress 2: 2606:2800:220:1::1\n";
        assert_eq!(parse_nslookup(output), vec!["93.184.216.34"]);
    }

    #[test]
    fn nslookup_failure_yields_nothing() {
        let output = "Server:\t\t8.8.8.8\nAddress:\t8.8.8.8#53\n\n** server can't find nope.invalid: NXDOMAIN\n";
        assert!(parse_nslookup(output).is_empty());
    }

    #[test]
    fn parses_getent_and_ping_addresses() {
        assert_eq!(
            parse_getent_hosts("93.184.216.34   example.com\n2606:2800::1 example.com\n"),
            vec!["93.184.216.34", "2606:2800::1"]
        );
        assert_eq!(
            parse_ping_address("PING example.com (93.184.216.34) 56(84) bytes of data.\n"),
            vec!["93.184.216.34"]
        );
        assert!(parse_ping_address("ping: unknown host nope.invalid\n").is_empty());
    }

    #[test]
    fn parses_http_probe_output() {
        assert_eq!(parse_http_probe("204 "), (Some(204), None));
        assert_eq!(
            parse_http_probe("302 http://portal.example/login"),
            (Some(302), Some("http://portal.example/login".to_string()))
        );
        assert_eq!(parse_http_probe("000"), (None, None));
        assert_eq!(parse_http_probe(""), (None, None));
    }

    #[test]
    fn success_band_includes_redirects() {
        assert!(is_success_status(204, 204));
        assert!(is_success_status(301, 204));
        assert!(!is_success_status(404, 204));
        assert!(!is_success_status(511, 204));
    }

    #[test]
    fn captive_204_is_never_a_portal() {
        let check = classify_captive_probe("http://p", Some(204), Some("http://portal/login"), Some("<html>"));
        assert!(!check.is_captive);
        assert_eq!(check.portal_url, None);
        assert_eq!(check.status_code, Some(204));
    }

    #[test]
    fn captive_redirect_points_at_portal() {
        let check = classify_captive_probe("http://p", Some(302), Some("http://portal/login"), None);
        assert!(check.is_captive);
        assert_eq!(check.portal_url.as_deref(), Some("http://portal/login"));

        let check = classify_captive_probe("http://p", Some(302), None, None);
        assert!(!check.is_captive);
    }

    #[test]
    fn captive_200_depends_on_content() {
        assert!(classify_captive_probe("http://p", Some(200), None, Some("<html>login</html>")).is_captive);
        assert!(!classify_captive_probe("http://p", Some(200), None, Some("  ")).is_captive);
        assert!(!classify_captive_probe("http://p", Some(500), None, Some("<html>")).is_captive);
        assert!(!classify_captive_probe("http://p", None, None, None).is_captive);
    }

    #[test]
    fn parses_ip_addr_show() {
        let output = "23: wlan0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc mq state UP group default qlen 3000\n    link/ether 3C:28:6D:00:11:22 brd ff:ff:ff:ff:ff:ff\n    inet 192.168.1.23/24 brd 192.168.1.255 scope global wlan0\n       valid_lft forever preferred_lft forever\n    inet6 fe80::3e28:6dff:fe00:1122/64 scope link\n";
        let info = parse_ip_addr("wlan0", output);
        assert_eq!(info.mtu, Some(1500));
        assert_eq!(info.state.as_deref(), Some("UP"));
        assert_eq!(info.mac.as_deref(), Some("3c:28:6d:00:11:22"));
        assert_eq!(info.ipv4, vec!["192.168.1.23/24"]);
        assert_eq!(info.ipv6, vec!["fe80::3e28:6dff:fe00:1122/64"]);
    }
}
