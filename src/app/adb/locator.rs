use std::path::Path;

pub const DEFAULT_ADB_PROGRAM: &str = "adb";

/// Strips one layer of wrapping quotes left over from copy-pasted paths.
pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|candidate| candidate.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Resolution order: explicit override, configured path, `adb` on `PATH`.
pub fn resolve_adb_program(override_path: Option<&str>, config_command_path: &str) -> String {
    override_path
        .map(normalize_command_path)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| {
            let configured = normalize_command_path(config_command_path);
            if configured.is_empty() {
                DEFAULT_ADB_PROGRAM.to_string()
            } else {
                configured
            }
        })
}

/// A bare program name is left to `PATH` lookup at spawn time.
pub fn validate_adb_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("adb command is empty".to_string());
    }
    let path = Path::new(program);
    if path.components().count() == 1 && !program.contains(std::path::MAIN_SEPARATOR) {
        return Ok(());
    }
    if path.is_dir() {
        return Err("adb path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err(format!("adb executable not found at {program}"));
    }
    Ok(())
}
