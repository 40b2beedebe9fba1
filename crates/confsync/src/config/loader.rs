use std::path::{Path, PathBuf};

use crate::config::schema::{LogFormat, Settings};
use crate::error::ConfigError;

pub const ENV_OUTPUT_ROOT: &str = "CONFSYNC_OUTPUT_ROOT";
pub const ENV_DATABASE: &str = "CONFSYNC_DATABASE";
pub const ENV_SERIALIZE: &str = "CONFSYNC_SERIALIZE_PER_USER";
pub const ENV_LOG_FORMAT: &str = "CONFSYNC_LOG_FORMAT";

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = serde_json::from_str(content)?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Overlays `CONFSYNC_*` environment variables onto `settings`.
pub fn apply_env_overrides(settings: &mut Settings) -> Result<(), ConfigError> {
    if let Ok(root) = std::env::var(ENV_OUTPUT_ROOT) {
        settings.output_root = PathBuf::from(root);
    }
    if let Ok(db) = std::env::var(ENV_DATABASE) {
        settings.database_path = PathBuf::from(db);
    }
    if let Ok(flag) = std::env::var(ENV_SERIALIZE) {
        settings.serialize_per_user = parse_flag(&flag).ok_or_else(|| ConfigError::Validation {
            message: format!("{} must be true or false, got '{}'", ENV_SERIALIZE, flag),
        })?;
    }
    if let Ok(format) = std::env::var(ENV_LOG_FORMAT) {
        settings.log_format = match format.to_ascii_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::Validation {
                    message: format!("{} must be text or json, got '{}'", ENV_LOG_FORMAT, other),
                })
            }
        };
    }
    validate_settings(settings)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.output_root.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "output_root must not be empty".to_string(),
        });
    }
    if settings.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "database_path must not be empty".to_string(),
        });
    }
    Ok(())
}
