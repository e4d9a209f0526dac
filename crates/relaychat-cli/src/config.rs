//! CLI configuration file support
//!
//! Loads configuration from ~/.config/relaychat/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub default: DefaultConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultConfig {
    pub relay_url: Option<String>,
    pub user_id: Option<String>,
    /// Overrides the greeting shown when a session starts
    pub welcome_message: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    /// Limit for initialize, close and status calls
    pub request_timeout_secs: Option<u64>,
}

impl CliConfig {
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// A missing or unparsable file yields the defaults.
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "Ignoring invalid config");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("relaychat").join("config.toml"))
    }
}
