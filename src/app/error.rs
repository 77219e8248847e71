use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
    /// What the caller should do next, for end-user recoverable states.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_VALIDATION", message, trace_id)
    }

    /// The bridge binary is missing or could not be spawned.
    pub fn bridge_unavailable(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_BRIDGE_UNAVAILABLE", message, trace_id)
            .with_hint("Install Android platform-tools or set adb.command_path in the config")
    }

    /// The command ran but the device rejected it.
    pub fn command_failed(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_COMMAND_FAILED", message, trace_id)
    }

    pub fn timeout(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_TIMEOUT", message, trace_id)
    }

    pub fn no_device(trace_id: impl Into<String>) -> Self {
        Self::new("ERR_NO_DEVICE", "No ready device is attached", trace_id).with_hint(
            "Connect a device, enable USB debugging and accept the authorization prompt",
        )
    }

    pub fn ambiguous_device(serials: &[String], trace_id: impl Into<String>) -> Self {
        let list = serials.join(", ");
        Self::new(
            "ERR_AMBIGUOUS_DEVICE",
            format!("Multiple ready devices attached: {list}"),
            trace_id,
        )
        .with_hint(format!(
            "Pass `--serial <serial>` or set ANDROID_SERIAL to one of: {list}"
        ))
    }

    pub fn protocol(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_PROTOCOL", message, trace_id)
    }

    pub fn companion_missing(package: &str, trace_id: impl Into<String>) -> Self {
        Self::new(
            "ERR_COMPANION_MISSING",
            format!("Companion agent {package} is not installed on the device"),
            trace_id,
        )
        .with_hint(format!(
            "Install the companion app ({package}) and open it once to grant its permissions"
        ))
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_SYSTEM", message, trace_id)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}
