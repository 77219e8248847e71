use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::app::adb::executor::{Executor, Target};
use crate::app::adb::paths::shell_quote;
use crate::app::config::DiagnosticsSettings;
use crate::app::error::AppError;
use crate::app::models::{
    CaptivePortalCheck, ConnectivityMethod, DnsMethod, DnsResult, InterfaceInfo, InternetCheck,
    PingResult,
};
use crate::app::probes::parse::{
    classify_captive_probe, is_success_status, parse_getent_hosts, parse_http_probe,
    parse_ip_addr, parse_nslookup, parse_ping, parse_ping_address,
};

const MAX_PING_COUNT: u32 = 20;
const PING_DEADLINE_SECS: u32 = 2;
const CONTENT_PREFIX_BYTES: u32 = 256;

fn validate_host(host: &str, trace_id: &str) -> Result<(), AppError> {
    let valid = !host.is_empty()
        && host.len() <= 253
        && host
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | ':' | '_'));
    if valid {
        Ok(())
    } else {
        Err(AppError::validation(format!("invalid host: {host:?}"), trace_id))
    }
}

fn validate_interface(name: &str, trace_id: &str) -> Result<(), AppError> {
    let valid = !name.is_empty()
        && name.len() <= 15
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(AppError::validation(format!("invalid interface: {name:?}"), trace_id))
    }
}

fn ping_timeout(count: u32) -> Duration {
    Duration::from_secs(u64::from(count * PING_DEADLINE_SECS + 5))
}

fn run_ping(target: &Target<'_>, host: &str, count: u32, trace_id: &str) -> Result<PingResult, AppError> {
    let command = format!("ping -c {count} -W {PING_DEADLINE_SECS} {host}");
    let output = target.shell(&command, Some(ping_timeout(count)), trace_id)?;
    // An unreachable host exits non-zero; that is a negative result, not an error.
    // Aliveness comes from stdout only; stderr is kept for the raw output.
    let mut result = parse_ping(host, &output.stdout);
    if result.raw_output.trim().is_empty() {
        result.raw_output = output.stderr;
    }
    Ok(result)
}

pub fn ping(
    executor: &Executor,
    host: &str,
    count: u32,
    trace_id: &str,
) -> Result<PingResult, AppError> {
    validate_host(host, trace_id)?;
    if !(1..=MAX_PING_COUNT).contains(&count) {
        return Err(AppError::validation(
            format!("count must be between 1 and {MAX_PING_COUNT}"),
            trace_id,
        ));
    }
    let target = executor.target(trace_id)?;
    let result = run_ping(&target, host, count, trace_id)?;
    info!(
        trace_id = %trace_id,
        serial = %target.serial(),
        host,
        alive = result.alive,
        "ping"
    );
    Ok(result)
}

/// Tries `nslookup`, `getent hosts`, then the address `ping` resolved, stopping at the
/// first tier that yields an address.
pub fn dns_lookup(executor: &Executor, hostname: &str, trace_id: &str) -> Result<DnsResult, AppError> {
    validate_host(hostname, trace_id)?;
    let target = executor.target(trace_id)?;

    let tiers: [(DnsMethod, String, fn(&str) -> Vec<String>); 3] = [
        (DnsMethod::Nslookup, format!("nslookup {hostname}"), parse_nslookup),
        (DnsMethod::Getent, format!("getent hosts {hostname}"), parse_getent_hosts),
        (
            DnsMethod::Ping,
            format!("ping -c 1 -W {PING_DEADLINE_SECS} {hostname}"),
            parse_ping_address,
        ),
    ];

    for (method, command, parse) in tiers {
        let output = target.shell(&command, None, trace_id)?;
        let addresses = parse(&output.stdout);
        debug!(trace_id = %trace_id, ?method, found = addresses.len(), "dns tier");
        if !addresses.is_empty() {
            return Ok(DnsResult {
                hostname: hostname.to_string(),
                resolved: true,
                addresses,
                method: Some(method),
            });
        }
    }
    Ok(DnsResult {
        hostname: hostname.to_string(),
        resolved: false,
        addresses: Vec::new(),
        method: None,
    })
}

fn curl_probe(
    target: &Target<'_>,
    url: &str,
    write_out: &str,
    timeout_secs: u64,
    trace_id: &str,
) -> Result<(Option<u16>, Option<String>), AppError> {
    let command = format!(
        "curl -s -o /dev/null --max-time {timeout_secs} -w {} {}",
        shell_quote(write_out),
        shell_quote(url)
    );
    let output = target.shell(&command, Some(Duration::from_secs(timeout_secs + 5)), trace_id)?;
    Ok(parse_http_probe(&output.stdout))
}

pub fn check_internet(
    executor: &Executor,
    settings: &DiagnosticsSettings,
    trace_id: &str,
) -> Result<InternetCheck, AppError> {
    let target = executor.target(trace_id)?;

    for probe in &settings.internet_probes {
        let started = Instant::now();
        let (status, _) = curl_probe(
            &target,
            &probe.url,
            "%{http_code}",
            settings.probe_timeout_secs,
            trace_id,
        )?;
        let latency_ms = started.elapsed().as_millis() as u64;
        debug!(trace_id = %trace_id, url = %probe.url, ?status, "internet probe");
        if let Some(code) = status.filter(|code| is_success_status(*code, probe.expected_status)) {
            return Ok(InternetCheck {
                connected: true,
                method: Some(ConnectivityMethod::Http),
                endpoint: Some(probe.url.clone()),
                status_code: Some(code),
                latency_ms: Some(latency_ms),
            });
        }
    }

    let host = settings.fallback_ping_host.as_str();
    validate_host(host, trace_id)?;
    let result = run_ping(&target, host, 1, trace_id)?;
    info!(trace_id = %trace_id, host, alive = result.alive, "http probes failed; ping fallback");
    if result.alive {
        return Ok(InternetCheck {
            connected: true,
            method: Some(ConnectivityMethod::Ping),
            endpoint: Some(host.to_string()),
            status_code: None,
            latency_ms: result.avg_rtt_ms.map(|rtt| rtt.round() as u64),
        });
    }
    Ok(InternetCheck {
        connected: false,
        method: None,
        endpoint: None,
        status_code: None,
        latency_ms: None,
    })
}

pub fn check_captive_portal(
    executor: &Executor,
    settings: &DiagnosticsSettings,
    trace_id: &str,
) -> Result<CaptivePortalCheck, AppError> {
    let target = executor.target(trace_id)?;
    let url = settings.captive_probe_url.as_str();
    let (status, redirect) = curl_probe(
        &target,
        url,
        "%{http_code} %{redirect_url}",
        settings.probe_timeout_secs,
        trace_id,
    )?;

    let content = if status == Some(200) {
        let command = format!(
            "curl -s --max-time {} {} | head -c {CONTENT_PREFIX_BYTES}",
            settings.probe_timeout_secs,
            shell_quote(url)
        );
        let output = target.shell(
            &command,
            Some(Duration::from_secs(settings.probe_timeout_secs + 5)),
            trace_id,
        )?;
        Some(output.stdout)
    } else {
        None
    };

    let check = classify_captive_probe(url, status, redirect.as_deref(), content.as_deref());
    info!(
        trace_id = %trace_id,
        serial = %target.serial(),
        ?status,
        is_captive = check.is_captive,
        "captive portal check"
    );
    Ok(check)
}

pub fn interface_info(
    executor: &Executor,
    interface: &str,
    trace_id: &str,
) -> Result<InterfaceInfo, AppError> {
    validate_interface(interface, trace_id)?;
    let output = executor
        .shell(&format!("ip addr show {interface}"), None, trace_id)?
        .into_result("ip addr show", trace_id)?;
    Ok(parse_ip_addr(interface, &output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::adb::executor::test_support::executor_for;
    use crate::app::adb::fake::{failed, FakeRunner};
    use crate::app::adb::runner::CommandOutput;
    use crate::app::config::InternetProbe;
    use std::sync::Arc;

    const NSLOOKUP_OK: &str = "Server:\t\t8.8.8.8\nAddress:\t8.8.8.8#53\n\nNon-authoritative answer:\nName:\texample.com\nAddress: 93.184.216.34\n";

    fn settings() -> DiagnosticsSettings {
        DiagnosticsSettings {
            internet_probes: vec![
                InternetProbe {
                    url: "http://first.example/generate_204".to_string(),
                    expected_status: 204,
                },
                InternetProbe {
                    url: "http://second.example/ok".to_string(),
                    expected_status: 200,
                },
            ],
            captive_probe_url: "http://first.example/generate_204".to_string(),
            fallback_ping_host: "8.8.8.8".to_string(),
            probe_timeout_secs: 1,
        }
    }

    #[test]
    fn dns_stops_at_first_tier() {
        let runner = Arc::new(
            FakeRunner::new()
                .on("nslookup", NSLOOKUP_OK)
                .on("getent", "93.184.216.34 example.com\n")
                .on("ping", "PING example.com (93.184.216.34) 56(84) bytes of data.\n"),
        );
        let executor = executor_for(&runner, "AAA");
        let result = dns_lookup(&executor, "example.com", "t").expect("dns");
        assert!(result.resolved);
        assert_eq!(result.method, Some(DnsMethod::Nslookup));
        assert_eq!(result.addresses, vec!["93.184.216.34"]);
        assert_eq!(runner.count("nslookup"), 1);
        assert_eq!(runner.count("getent"), 0);
        assert_eq!(runner.count("ping"), 0);
    }

    #[test]
    fn dns_falls_through_to_ping() {
        let runner = Arc::new(
            FakeRunner::new()
                .on_output("nslookup", failed("nslookup: not found"))
                .on_output("getent", failed("getent: not found"))
                .on("ping", "PING example.com (93.184.216.34) 56(84) bytes of data.\n"),
        );
        let executor = executor_for(&runner, "AAA");
        let result = dns_lookup(&executor, "example.com", "t").expect("dns");
        assert_eq!(result.method, Some(DnsMethod::Ping));
        assert_eq!(
            runner.calls(),
            vec![
                "-s AAA shell nslookup example.com",
                "-s AAA shell getent hosts example.com",
                "-s AAA shell ping -c 1 -W 2 example.com",
            ]
        );
    }

    #[test]
    fn dns_ipv6_only_answer_moves_to_next_tier() {
        let runner = Arc::new(
            FakeRunner::new()
                .on("nslookup", "Server: 8.8.8.8\nAddress: 8.8.8.8#53\n\nName: v6.example\nAddress: 2001:db8::1\n")
                .on("getent", "2001:db8::1 v6.example\n"),
        );
        let executor = executor_for(&runner, "AAA");
        let result = dns_lookup(&executor, "v6.example", "t").expect("dns");
        assert_eq!(result.method, Some(DnsMethod::Getent));
        assert_eq!(result.addresses, vec!["2001:db8::1"]);
    }

    #[test]
    fn dns_unresolved_is_not_an_error() {
        let runner = Arc::new(FakeRunner::new());
        let executor = executor_for(&runner, "AAA");
        let result = dns_lookup(&executor, "nope.invalid", "t").expect("dns");
        assert!(!result.resolved);
        assert!(result.addresses.is_empty());
        assert_eq!(result.method, None);
    }

    #[test]
    fn dns_rejects_shell_metacharacters() {
        let runner = Arc::new(FakeRunner::new());
        let executor = executor_for(&runner, "AAA");
        let err = dns_lookup(&executor, "example.com; reboot", "t").expect_err("invalid");
        assert_eq!(err.code, "ERR_VALIDATION");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn ping_unreachable_is_negative_result() {
        let runner = Arc::new(FakeRunner::new().on_output(
            "ping -c 2",
            CommandOutput::completed(
                "2 packets transmitted, 0 received, 100% packet loss, time 1001ms\n",
                "",
                Some(1),
            ),
        ));
        let executor = executor_for(&runner, "AAA");
        let result = ping(&executor, "10.9.9.9", 2, "t").expect("ping");
        assert!(!result.alive);
        assert_eq!(runner.calls(), vec!["-s AAA shell ping -c 2 -W 2 10.9.9.9"]);
    }

    #[test]
    fn ping_error_on_stderr_is_not_alive() {
        let runner = Arc::new(
            FakeRunner::new()
                .on_output(
                    "10.9.9.9",
                    CommandOutput::completed("", "connect: Network is unreachable\n", Some(2)),
                )
                .on_output(
                    "nope.invalid",
                    CommandOutput::completed("", "ping: unknown host nope.invalid\n", Some(2)),
                ),
        );
        let executor = executor_for(&runner, "AAA");

        let unreachable = ping(&executor, "10.9.9.9", 1, "t").expect("ping");
        assert!(!unreachable.alive);
        assert!(unreachable.raw_output.contains("Network is unreachable"));

        let unknown = ping(&executor, "nope.invalid", 1, "t").expect("ping");
        assert!(!unknown.alive);
        assert_eq!(unknown.avg_rtt_ms, None);
    }

    #[test]
    fn ping_rejects_out_of_range_count() {
        let runner = Arc::new(FakeRunner::new());
        let executor = executor_for(&runner, "AAA");
        assert_eq!(ping(&executor, "8.8.8.8", 0, "t").expect_err("count").code, "ERR_VALIDATION");
        assert_eq!(ping(&executor, "8.8.8.8", 99, "t").expect_err("count").code, "ERR_VALIDATION");
    }

    #[test]
    fn internet_check_returns_on_first_success() {
        let runner = Arc::new(
            FakeRunner::new()
                .on("first.example", "000")
                .on("second.example", "200"),
        );
        let executor = executor_for(&runner, "AAA");
        let check = check_internet(&executor, &settings(), "t").expect("check");
        assert!(check.connected);
        assert_eq!(check.method, Some(ConnectivityMethod::Http));
        assert_eq!(check.endpoint.as_deref(), Some("http://second.example/ok"));
        assert_eq!(check.status_code, Some(200));
        assert!(check.latency_ms.is_some());
        assert_eq!(runner.count("ping"), 0);
    }

    #[test]
    fn internet_check_falls_back_to_ping() {
        let runner = Arc::new(
            FakeRunner::new()
                .on("curl", "000")
                .on("ping -c 1", "1 packets transmitted, 1 received, 0% packet loss\nrtt min/avg/max/mdev = 20.1/20.6/21.0/0.1 ms\n"),
        );
        let executor = executor_for(&runner, "AAA");
        let check = check_internet(&executor, &settings(), "t").expect("check");
        assert!(check.connected);
        assert_eq!(check.method, Some(ConnectivityMethod::Ping));
        assert_eq!(check.latency_ms, Some(21));
        assert_eq!(runner.count("curl"), 2);
    }

    #[test]
    fn internet_check_reports_offline() {
        let runner = Arc::new(
            FakeRunner::new()
                .on("curl", "000")
                .on("ping", "1 packets transmitted, 0 received, 100% packet loss\n"),
        );
        let executor = executor_for(&runner, "AAA");
        let check = check_internet(&executor, &settings(), "t").expect("check");
        assert!(!check.connected);
        assert_eq!(check.method, None);
    }

    #[test]
    fn internet_check_offline_when_ping_only_reports_an_error() {
        let runner = Arc::new(
            FakeRunner::new().on("curl", "000").on_output(
                "ping",
                CommandOutput::completed("", "connect: Network is unreachable\n", Some(2)),
            ),
        );
        let executor = executor_for(&runner, "AAA");
        let check = check_internet(&executor, &settings(), "t").expect("check");
        assert!(!check.connected);
        assert_eq!(check.method, None);
        assert_eq!(runner.count("ping -c 1"), 1);
    }

    #[test]
    fn captive_204_ignores_redirect() {
        let runner = Arc::new(FakeRunner::new().on("curl", "204 http://portal.example/login"));
        let executor = executor_for(&runner, "AAA");
        let check = check_captive_portal(&executor, &settings(), "t").expect("check");
        assert!(!check.is_captive);
        assert_eq!(check.portal_url, None);
        assert_eq!(runner.count("head -c"), 0);
    }

    #[test]
    fn captive_200_fetches_content_prefix() {
        let runner = Arc::new(
            FakeRunner::new()
                .on("head -c", "<html><title>Guest WiFi</title>")
                .on("curl", "200 "),
        );
        let executor = executor_for(&runner, "AAA");
        let check = check_captive_portal(&executor, &settings(), "t").expect("check");
        assert!(check.is_captive);
        assert_eq!(check.portal_url.as_deref(), Some("http://first.example/generate_204"));
        assert_eq!(runner.count("head -c 256"), 1);
    }

    #[test]
    fn interface_info_reads_ip_addr() {
        let runner = Arc::new(FakeRunner::new().on(
            "ip addr show wlan0",
            "7: wlan0: <UP> mtu 1500 qdisc mq state UP\n    link/ether aa:bb:cc:dd:ee:ff brd ff:ff:ff:ff:ff:ff\n    inet 10.0.0.5/24 scope global wlan0\n",
        ));
        let executor = executor_for(&runner, "AAA");
        let info = interface_info(&executor, "wlan0", "t").expect("info");
        assert_eq!(info.ipv4, vec!["10.0.0.5/24"]);
        assert_eq!(info.mac.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn interface_info_rejects_bad_names() {
        let runner = Arc::new(FakeRunner::new());
        let executor = executor_for(&runner, "AAA");
        let err = interface_info(&executor, "wlan0 && reboot", "t").expect_err("invalid");
        assert_eq!(err.code, "ERR_VALIDATION");
    }
}
