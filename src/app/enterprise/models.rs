use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EapMethod {
    Peap,
    Ttls,
    Tls,
}

impl EapMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Peap => "PEAP",
            Self::Ttls => "TTLS",
            Self::Tls => "TLS",
        }
    }

    pub fn needs_password(self) -> bool {
        matches!(self, Self::Peap | Self::Ttls)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase2 {
    Mschapv2,
    Gtc,
    Pap,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnterpriseConnectRequest {
    pub ssid: String,
    pub method: Option<EapMethod>,
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous_identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase2: Option<Phase2>,
    /// Alias of a CA certificate already installed through the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CertificateKind {
    Ca,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    File(PathBuf),
    Inline(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInstallRequest {
    pub alias: String,
    pub kind: CertificateKind,
    pub source: CertificateSource,
}

/// Certificate payload as written to the request file.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CertificatePayload {
    pub alias: String,
    pub kind: CertificateKind,
    pub certificate_base64: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnterpriseAction {
    ConnectEnterprise,
    InstallCertificate,
}

impl EnterpriseAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectEnterprise => "connect_enterprise",
            Self::InstallCertificate => "install_certificate",
        }
    }

    /// Broadcast action understood by the agent's receiver.
    pub fn intent_action(self, package: &str) -> String {
        let suffix = match self {
            Self::ConnectEnterprise => "CONNECT_ENTERPRISE",
            Self::InstallCertificate => "INSTALL_CERTIFICATE",
        };
        format!("{package}.action.{suffix}")
    }
}

/// Request file contents: the action envelope with the method fields flattened in.
#[derive(Debug, Serialize)]
pub struct RequestEnvelope<'a, T: Serialize> {
    pub action: EnterpriseAction,
    pub request_id: &'a str,
    pub timestamp: String,
    #[serde(flatten)]
    pub payload: &'a T,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnterpriseResult {
    pub success: bool,
    /// Absent when the agent predates request ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeOutcome {
    Delivered,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnterpriseResponse {
    pub serial: String,
    pub action: EnterpriseAction,
    pub request_id: String,
    pub outcome: ExchangeOutcome,
    pub result: EnterpriseResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentStatus {
    pub serial: String,
    pub package: String,
    pub installed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_flattens_payload() {
        let payload = EnterpriseConnectRequest {
            ssid: "Corp".to_string(),
            method: Some(EapMethod::Peap),
            identity: "alice".to_string(),
            password: Some("secret".to_string()),
            phase2: Some(Phase2::Mschapv2),
            ..EnterpriseConnectRequest::default()
        };
        let envelope = RequestEnvelope {
            action: EnterpriseAction::ConnectEnterprise,
            request_id: "req-1",
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            payload: &payload,
        };
        let json = serde_json::to_value(&envelope).expect("json");
        assert_eq!(json["action"], "connect_enterprise");
        assert_eq!(json["request_id"], "req-1");
        assert_eq!(json["method"], "peap");
        assert_eq!(json["phase2"], "mschapv2");
        assert!(json.get("private_key").is_none());
    }

    #[test]
    fn result_tolerates_missing_fields() {
        let result: EnterpriseResult =
            serde_json::from_str(r#"{"success":false,"error":"bad credentials"}"#).expect("parse");
        assert!(!result.success);
        assert_eq!(result.request_id, None);
        assert_eq!(result.error.as_deref(), Some("bad credentials"));
    }

    #[test]
    fn intent_action_is_namespaced_by_package() {
        assert_eq!(
            EnterpriseAction::InstallCertificate.intent_action("dev.adbwifi.companion"),
            "dev.adbwifi.companion.action.INSTALL_CERTIFICATE"
        );
    }
}
