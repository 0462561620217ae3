use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::EmbedsConfig;

/// Discord embed in webhook wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedMedia>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedMedia {
    pub url: String,
}

impl Embed {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into()).filter(|d| !d.is_empty());
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(EmbedMedia { url: url.into() });
        self
    }

    #[cfg(test)]
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Named colours from the `embeds.colors` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Error,
    Info,
    Warning,
    ServerOnline,
    ServerOffline,
    ShopRotation,
}

/// Builds embeds decorated with the configured colours, footer and timestamp.
#[derive(Debug, Clone)]
pub struct EmbedFactory {
    config: EmbedsConfig,
}

impl EmbedFactory {
    pub fn new(config: EmbedsConfig) -> Self {
        Self { config }
    }

    pub fn create(&self, title: impl Into<String>, tone: Tone) -> Embed {
        let footer = &self.config.footer;
        Embed {
            title: Some(title.into()).filter(|t| !t.is_empty()),
            color: self.color(tone),
            timestamp: self.config.show_timestamp.then(Utc::now),
            footer: (!footer.text.is_empty()).then(|| EmbedFooter {
                text: footer.text.clone(),
                icon_url: Some(footer.icon_url.clone()).filter(|u| !u.is_empty()),
            }),
            ..Default::default()
        }
    }

    pub fn color(&self, tone: Tone) -> u32 {
        let colors = &self.config.colors;
        let hex = match tone {
            Tone::Success => &colors.success,
            Tone::Error => &colors.error,
            Tone::Info => &colors.info,
            Tone::Warning => &colors.warning,
            Tone::ServerOnline => &colors.server_online,
            Tone::ServerOffline => &colors.server_offline,
            Tone::ShopRotation => &colors.shop_rotation,
        };
        parse_color(hex)
            .or_else(|| {
                warn!("Invalid embed color {:?}, using info color", hex);
                parse_color(&colors.info)
            })
            .unwrap_or(0)
    }
}

/// Parses `#RRGGBB` (the `#` is optional).
pub fn parse_color(hex: &str) -> Option<u32> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.is_empty() || digits.len() > 6 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn colors_parse_from_hex() {
        assert_eq!(parse_color("#9b59b6"), Some(0x9b59b6));
        assert_eq!(parse_color("00ff00"), Some(0x00ff00));
        assert_eq!(parse_color("#zzzzzz"), None);
        assert_eq!(parse_color(""), None);
    }

    #[test]
    fn bad_color_falls_back_to_info() {
        let mut config = EmbedsConfig::default();
        config.colors.warning = "orange".to_owned();
        let factory = EmbedFactory::new(config);
        assert_eq!(factory.color(Tone::Warning), 0x0099ff);
    }

    #[test]
    fn footer_and_timestamp_follow_config() {
        let factory = EmbedFactory::new(EmbedsConfig::default());
        let embed = factory.create("Hello", Tone::Info);
        assert!(embed.timestamp.is_some());
        assert_eq!(embed.footer.as_ref().unwrap().text, "Neodyme Server");
        assert_eq!(embed.footer.as_ref().unwrap().icon_url, None);

        let mut config = EmbedsConfig::default();
        config.show_timestamp = false;
        config.footer.text.clear();
        let embed = EmbedFactory::new(config).create("Hello", Tone::Info);
        assert!(embed.timestamp.is_none());
        assert!(embed.footer.is_none());
    }

    #[test]
    fn wire_format_omits_empty_parts() {
        let mut config = EmbedsConfig::default();
        config.show_timestamp = false;
        let embed = EmbedFactory::new(config)
            .create("Server Online", Tone::ServerOnline)
            .field("Status", "Online", true)
            .thumbnail("https://cdn.example/icon.png");

        assert_eq!(
            serde_json::to_value(&embed).unwrap(),
            json!({
                "title": "Server Online",
                "color": 0x00ff00,
                "fields": [{ "name": "Status", "value": "Online", "inline": true }],
                "footer": { "text": "Neodyme Server" },
                "thumbnail": { "url": "https://cdn.example/icon.png" }
            })
        );
    }
}
