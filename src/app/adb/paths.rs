pub fn validate_device_path(path: &str) -> Result<(), String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err("device path is required".to_string());
    }
    if !trimmed.starts_with('/') {
        return Err("device path must be absolute".to_string());
    }
    if trimmed.contains('\0') || trimmed.contains('\n') {
        return Err("device path contains invalid characters".to_string());
    }
    if trimmed.ends_with('/') {
        return Err("device path must name a file".to_string());
    }
    if trimmed.split('/').any(|segment| segment == "..") {
        return Err("device path must not contain '..' segments".to_string());
    }
    Ok(())
}

/// Single-quotes a value for the device shell: `it's` becomes `'it'\''s'`.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
