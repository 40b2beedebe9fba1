use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Root under which one directory per username is created.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Serialize syncs per username instead of last-write-wins.
    #[serde(default = "default_true")]
    pub serialize_per_user: bool,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_true() -> bool {
    true
}

fn base_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".confsync")
}

fn default_output_root() -> PathBuf {
    base_directory().join("exports")
}

/// `~/.confsync/data/confsync.db`
pub fn default_database_path() -> PathBuf {
    base_directory().join("data").join("confsync.db")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            database_path: default_database_path(),
            serialize_per_user: true,
            log_format: LogFormat::default(),
        }
    }
}
