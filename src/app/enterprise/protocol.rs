use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::adb::executor::{Executor, Target};
use crate::app::adb::parse::parse_package_present;
use crate::app::adb::paths::{shell_quote, validate_device_path};
use crate::app::cancel::CancelToken;
use crate::app::config::EnterpriseSettings;
use crate::app::enterprise::models::{
    AgentStatus, CertificateInstallRequest, CertificatePayload, CertificateSource,
    EnterpriseAction, EnterpriseConnectRequest, EnterpriseResponse, EnterpriseResult,
    ExchangeOutcome, RequestEnvelope,
};
use crate::app::error::AppError;

const MAX_CERTIFICATE_BYTES: usize = 64 * 1024;
const MIN_READ_TIMEOUT: Duration = Duration::from_secs(1);

fn required(value: Option<&str>) -> bool {
    value.is_some_and(|value| !value.trim().is_empty())
}

/// BUILD step for a connect request; runs before any device I/O.
pub fn validate_connect_request(
    request: &EnterpriseConnectRequest,
    trace_id: &str,
) -> Result<(), AppError> {
    if request.ssid.trim().is_empty() {
        return Err(AppError::validation("ssid is required", trace_id));
    }
    let Some(method) = request.method else {
        return Err(AppError::validation("eap method is required", trace_id));
    };
    if request.identity.trim().is_empty() {
        return Err(AppError::validation("identity is required", trace_id));
    }
    if method.needs_password() && !required(request.password.as_deref()) {
        return Err(AppError::validation(
            format!("password is required for {}", method.as_str()),
            trace_id,
        ));
    }
    if !method.needs_password()
        && !(required(request.client_certificate.as_deref()) && required(request.private_key.as_deref()))
    {
        return Err(AppError::validation(
            "client certificate and private key are required for TLS",
            trace_id,
        ));
    }
    Ok(())
}

/// BUILD step for a certificate install: reads and encodes the certificate.
pub fn build_certificate_payload(
    request: &CertificateInstallRequest,
    trace_id: &str,
) -> Result<CertificatePayload, AppError> {
    let alias = request.alias.trim();
    if alias.is_empty() || alias.contains(['/', '\n', '\0']) {
        return Err(AppError::validation("certificate alias is invalid", trace_id));
    }
    let bytes = match &request.source {
        CertificateSource::Inline(bytes) => bytes.clone(),
        CertificateSource::File(path) => std::fs::read(path).map_err(|err| {
            AppError::validation(
                format!("failed to read certificate {}: {err}", path.display()),
                trace_id,
            )
        })?,
    };
    if bytes.is_empty() {
        return Err(AppError::validation("certificate is empty", trace_id));
    }
    if bytes.len() > MAX_CERTIFICATE_BYTES {
        return Err(AppError::validation(
            format!("certificate exceeds {MAX_CERTIFICATE_BYTES} bytes"),
            trace_id,
        ));
    }
    Ok(CertificatePayload {
        alias: alias.to_string(),
        kind: request.kind,
        certificate_base64: STANDARD.encode(bytes),
    })
}

fn validate_settings(settings: &EnterpriseSettings, trace_id: &str) -> Result<(), AppError> {
    for path in [&settings.request_path, &settings.result_path] {
        validate_device_path(path).map_err(|message| {
            AppError::validation(format!("{message}: {path}"), trace_id)
        })?;
    }
    if settings.request_path == settings.result_path {
        return Err(AppError::validation(
            "request and result paths must differ",
            trace_id,
        ));
    }
    Ok(())
}

fn agent_installed(
    target: &Target<'_>,
    package: &str,
    trace_id: &str,
) -> Result<bool, AppError> {
    let output = target
        .shell(&format!("pm list packages {}", shell_quote(package)), None, trace_id)?
        .into_result("pm list packages", trace_id)?;
    Ok(parse_package_present(&output.stdout, package))
}

pub fn check_agent(
    executor: &Executor,
    settings: &EnterpriseSettings,
    trace_id: &str,
) -> Result<AgentStatus, AppError> {
    let target = executor.target(trace_id)?;
    let installed = agent_installed(&target, &settings.companion_package, trace_id)?;
    Ok(AgentStatus {
        serial: target.serial().to_string(),
        package: settings.companion_package.clone(),
        installed,
    })
}

pub fn connect_enterprise(
    executor: &Executor,
    settings: &EnterpriseSettings,
    request: &EnterpriseConnectRequest,
    cancel: &CancelToken,
    trace_id: &str,
) -> Result<EnterpriseResponse, AppError> {
    validate_connect_request(request, trace_id)?;
    exchange(
        executor,
        settings,
        EnterpriseAction::ConnectEnterprise,
        request,
        cancel,
        trace_id,
    )
}

pub fn install_certificate(
    executor: &Executor,
    settings: &EnterpriseSettings,
    request: &CertificateInstallRequest,
    cancel: &CancelToken,
    trace_id: &str,
) -> Result<EnterpriseResponse, AppError> {
    let payload = build_certificate_payload(request, trace_id)?;
    exchange(
        executor,
        settings,
        EnterpriseAction::InstallCertificate,
        &payload,
        cancel,
        trace_id,
    )
}

/// WRITE, TRIGGER, POLL and CLEANUP for one request, holding the device lock throughout.
fn exchange<T: Serialize>(
    executor: &Executor,
    settings: &EnterpriseSettings,
    action: EnterpriseAction,
    payload: &T,
    cancel: &CancelToken,
    trace_id: &str,
) -> Result<EnterpriseResponse, AppError> {
    validate_settings(settings, trace_id)?;
    let request_id = Uuid::new_v4().to_string();
    let envelope = RequestEnvelope {
        action,
        request_id: &request_id,
        timestamp: chrono::Utc::now().to_rfc3339(),
        payload,
    };
    let body = serde_json::to_string(&envelope)
        .map_err(|err| AppError::system(format!("failed to encode request: {err}"), trace_id))?;

    executor.mutate(trace_id, |target| {
        if !agent_installed(target, &settings.companion_package, trace_id)? {
            return Err(AppError::companion_missing(&settings.companion_package, trace_id));
        }
        let result_path = shell_quote(&settings.result_path);
        let request_path = shell_quote(&settings.request_path);

        target
            .shell(&format!("rm -f {result_path}"), None, trace_id)?
            .into_result("remove stale result", trace_id)?;
        target
            .shell(&write_command(&body, &request_path), None, trace_id)?
            .into_result("write request", trace_id)?;
        let broadcast = format!(
            "am broadcast -a {} -n {} --es request_path {request_path}",
            shell_quote(&action.intent_action(&settings.companion_package)),
            shell_quote(&settings.receiver_component),
        );
        target
            .shell(&broadcast, None, trace_id)?
            .into_result("am broadcast", trace_id)?;
        info!(
            trace_id = %trace_id,
            serial = %target.serial(),
            action = action.as_str(),
            request_id = %request_id,
            "enterprise request sent"
        );

        let (outcome, result) = poll_result(target, settings, &request_id, cancel, trace_id)?;
        Ok(EnterpriseResponse {
            serial: target.serial().to_string(),
            action,
            request_id: request_id.clone(),
            outcome,
            result,
        })
    })
}

/// `printf '%s'` writes the body verbatim; the device shell's `echo` expands backslashes.
fn write_command(body: &str, quoted_path: &str) -> String {
    format!("printf '%s' {} > {quoted_path}", shell_quote(body))
}

/// `Ok(None)` while the file is absent or empty; `Err` carries the parse failure of a
/// file that is present but not a result record.
fn decode_result(raw: &str) -> Result<Option<EnterpriseResult>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some).map_err(|err| err.to_string())
}

fn synthetic_failure(request_id: &str, error: String) -> EnterpriseResult {
    EnterpriseResult {
        success: false,
        request_id: Some(request_id.to_string()),
        identifier: None,
        message: None,
        error: Some(error),
    }
}

fn poll_result(
    target: &Target<'_>,
    settings: &EnterpriseSettings,
    request_id: &str,
    cancel: &CancelToken,
    trace_id: &str,
) -> Result<(ExchangeOutcome, EnterpriseResult), AppError> {
    let window = Duration::from_secs(settings.timeout_secs);
    let interval = Duration::from_millis(settings.poll_interval_ms.max(1));
    let deadline = Instant::now() + window;
    let result_path = shell_quote(&settings.result_path);
    let mut attempts = 0u32;
    let mut malformed: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let output = target.shell(
            &format!("cat {result_path}"),
            Some(remaining.max(MIN_READ_TIMEOUT)),
            trace_id,
        )?;
        if output.success {
            match decode_result(&output.stdout) {
                Ok(Some(result)) if result.request_id.as_deref().map_or(true, |id| id == request_id) => {
                    let cleanup = target
                        .shell(&format!("rm -f {result_path}"), None, trace_id)
                        .and_then(|output| output.into_result("remove result", trace_id));
                    if let Err(err) = cleanup {
                        warn!(
                            trace_id = %trace_id,
                            serial = %target.serial(),
                            request_id,
                            error = %err.error,
                            "failed to remove enterprise result"
                        );
                    }
                    info!(
                        trace_id = %trace_id,
                        serial = %target.serial(),
                        request_id,
                        attempts,
                        success = result.success,
                        "enterprise result received"
                    );
                    return Ok((ExchangeOutcome::Delivered, result));
                }
                Ok(Some(result)) => {
                    malformed = None;
                    debug!(
                        trace_id = %trace_id,
                        expected = request_id,
                        found = ?result.request_id,
                        "ignoring result for another request"
                    );
                }
                Ok(None) => {
                    malformed = None;
                    debug!(trace_id = %trace_id, attempts, "result not ready");
                }
                // Possibly a partial write; read again on the next poll.
                Err(err) => {
                    debug!(trace_id = %trace_id, attempts, error = %err, "result not parsable yet");
                    malformed = Some(err);
                }
            }
        } else {
            malformed = None;
        }

        let now = Instant::now();
        if now >= deadline {
            if let Some(err) = malformed.take() {
                warn!(trace_id = %trace_id, serial = %target.serial(), request_id, attempts, error = %err, "enterprise result malformed");
                return Err(AppError::protocol(
                    format!("companion agent result is not a valid record: {err}"),
                    trace_id,
                ));
            }
            warn!(trace_id = %trace_id, serial = %target.serial(), request_id, attempts, "enterprise result timed out");
            return Ok((
                ExchangeOutcome::TimedOut,
                synthetic_failure(
                    request_id,
                    format!("no result from companion agent within {}s", window.as_secs()),
                ),
            ));
        }
        if !cancel.sleep(interval.min(deadline - now)) {
            break;
        }
    }

    warn!(trace_id = %trace_id, serial = %target.serial(), request_id, "enterprise exchange cancelled");
    Ok((
        ExchangeOutcome::Cancelled,
        synthetic_failure(request_id, "cancelled before the companion agent replied".to_string()),
    ))
}
