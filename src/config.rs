//! Deck configuration: listen address, workspace root, chat settings, and
//! role grants. Loaded from a TOML file with sensible defaults when the
//! file is absent.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::permissions::RoleGrant;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP + WebSocket listen address.
    pub listen: String,
    /// Root directory the fileSystem tool resolves relative paths against.
    pub workspace_dir: PathBuf,
    /// Chat configuration served and mutated via `/api/config`.
    pub chat: ChatConfig,
    /// Role-based permission grants.
    pub policy: PolicyConfig,
}

impl Default for Config {
    fn default() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            listen: "127.0.0.1:4100".to_string(),
            workspace_dir: home_dir,
            chat: ChatConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::default_path);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config at {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration, creating parent directories as needed.
    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let config_path = path.unwrap_or_else(Self::default_path);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        Ok(())
    }

    fn default_path() -> PathBuf {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home_dir.join(".hostdeck").join("config.toml")
    }
}

/// Process-wide chat configuration, mutable at runtime through the HTTP
/// surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatConfig {
    pub system_message: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_message: "You are a helpful AI assistant with access to various system tools."
                .to_string(),
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

/// Partial chat configuration accepted by `PATCH /api/config`. Absent
/// fields leave the current value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfigPatch {
    pub system_message: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl ChatConfig {
    /// Merge a partial update into this configuration.
    pub fn apply(&mut self, patch: ChatConfigPatch) {
        if let Some(system_message) = patch.system_message {
            self.system_message = system_message;
        }
        if let Some(temperature) = patch.temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = patch.max_tokens {
            self.max_tokens = max_tokens;
        }
    }
}

/// Role grants loaded from `[[policy.roles]]` tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub roles: Vec<RoleGrant>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            roles: RoleGrant::defaults(),
        }
    }
}
