use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub enabled: bool,
    pub webhooks: WebhooksConfig,
    pub bot: BotConfig,
    pub embeds: EmbedsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            webhooks: WebhooksConfig::default(),
            bot: BotConfig::default(),
            embeds: EmbedsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhooksConfig {
    pub server_status: WebhookConfig,
    pub shop_rotation: WebhookConfig,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            server_status: WebhookConfig::named("Neodyme Server"),
            shop_rotation: WebhookConfig::named("Neodyme Shop"),
        }
    }
}

/// A single webhook sink. Its `enabled` flag is checked independently of
/// the top-level switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    pub username: String,
    pub avatar_url: String,
}

impl WebhookConfig {
    fn named(username: &str) -> Self {
        Self {
            enabled: true,
            url: String::new(),
            username: username.to_owned(),
            avatar_url: String::new(),
        }
    }

    /// True when the channel is switched on and has somewhere to post to.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.url.is_empty()
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self::named("Neodyme")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BotConfig {
    pub enabled: bool,
    pub token: String,
    pub client_id: String,
    pub guild_id: String,
    pub prefix: String,
    /// Role name to Discord role ids.
    pub roles: BTreeMap<String, Vec<String>>,
    /// Keyed by the camelCase command key, e.g. `banUser`.
    pub commands: BTreeMap<String, CommandConfig>,
}

impl Default for BotConfig {
    fn default() -> Self {
        let roles = ["admin", "moderator", "support"]
            .into_iter()
            .map(|name| (name.to_owned(), Vec::new()))
            .collect();

        let commands = [
            ("createAccount", &["admin", "moderator"][..]),
            ("viewAccount", &["admin", "moderator", "support"][..]),
            ("banUser", &["admin", "moderator"][..]),
            ("unbanUser", &["admin", "moderator"][..]),
            ("giveVbucks", &["admin"][..]),
            ("serverStatus", &[][..]),
            ("playerCount", &[][..]),
        ]
        .into_iter()
        .map(|(key, roles)| (key.to_owned(), CommandConfig::allow(roles)))
        .collect();

        Self {
            enabled: false,
            token: String::new(),
            client_id: String::new(),
            guild_id: String::new(),
            prefix: "!".to_owned(),
            roles,
            commands,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandConfig {
    pub enabled: bool,
    /// Role names; empty means everyone may run the command.
    pub allowed_roles: Vec<String>,
}

impl CommandConfig {
    pub fn allow(roles: &[&str]) -> Self {
        Self {
            enabled: true,
            allowed_roles: roles.iter().map(|r| (*r).to_owned()).collect(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self::allow(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbedsConfig {
    pub colors: ColorsConfig,
    pub footer: FooterConfig,
    pub show_timestamp: bool,
}

impl Default for EmbedsConfig {
    fn default() -> Self {
        Self {
            colors: ColorsConfig::default(),
            footer: FooterConfig::default(),
            show_timestamp: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColorsConfig {
    pub success: String,
    pub error: String,
    pub info: String,
    pub warning: String,
    pub server_online: String,
    pub server_offline: String,
    pub shop_rotation: String,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            success: "#00ff00".to_owned(),
            error: "#ff0000".to_owned(),
            info: "#0099ff".to_owned(),
            warning: "#ffcc00".to_owned(),
            server_online: "#00ff00".to_owned(),
            server_offline: "#ff0000".to_owned(),
            shop_rotation: "#9b59b6".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FooterConfig {
    pub text: String,
    pub icon_url: String,
}

impl Default for FooterConfig {
    fn default() -> Self {
        Self {
            text: "Neodyme Server".to_owned(),
            icon_url: String::new(),
        }
    }
}

impl Config {
    /// Reads the config at `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Config file {} not found, creating default", path.display());
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Writes the config as pretty JSON with 4-space indentation.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = to_pretty_json(self).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Serializes with a 4-space indent, the layout used by every JSON file
/// this crate writes.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}
