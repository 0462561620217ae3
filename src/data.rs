use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

pub static CURRENCY_NAME: &str = "V-Bucks";
pub static DEFAULT_ROLE: &str = "player";
pub static NO_REASON: &str = "No reason provided";
pub static UNKNOWN: &str = "Unknown";
pub static NOT_AVAILABLE: &str = "N/A";
/// Key the shop file uses for its inline comment.
pub static SHOP_COMMENT_KEY: &str = "//";
pub static SHOP_LINES_PER_SECTION: usize = 5;

/// An account as stored by the game server. Fields this crate does not know
/// about are carried in `extra` so rewriting the collection keeps them.
/// Absent fields stay absent on the way back out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Kept as written; see [`AccountRecord::created`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vbucks: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban: Option<BanRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountRecord {
    pub fn is_banned(&self) -> bool {
        self.ban.as_ref().is_some_and(|ban| ban.banned)
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_ref().and_then(parse_timestamp)
    }

    pub fn balance(&self) -> i64 {
        self.vbucks.unwrap_or(0)
    }

    /// Case-insensitive display name comparison.
    pub fn matches_name(&self, name: &str) -> bool {
        self.display_name
            .as_deref()
            .is_some_and(|display| display.to_lowercase() == name.to_lowercase())
    }
}

/// Reads an RFC 3339 string, a bare date or date-time string taken as UTC,
/// or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?),
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|at| at.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                        .iter()
                        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                        .map(|at| at.and_utc())
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|day| day.and_hms_opt(0, 0, 0))
                        .map(|at| at.and_utc())
                })
        }
        _ => None,
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(parse_timestamp))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRecord {
    #[serde(default)]
    pub banned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    pub banned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banned_by: Option<String>,
    /// `None` means the ban never expires.
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    pub ban_expires: Option<DateTime<Utc>>,
}

impl BanRecord {
    pub fn issued(reason: String, by: String, at: DateTime<Utc>, expires: Option<DateTime<Utc>>) -> Self {
        Self {
            banned: true,
            reason: Some(reason),
            banned_at: Some(at),
            banned_by: Some(by),
            ban_expires: expires,
        }
    }

    pub fn lifted() -> Self {
        Self::default()
    }
}

pub fn find_by_name<'a>(clients: &'a mut [AccountRecord], name: &str) -> Option<&'a mut AccountRecord> {
    clients.iter_mut().find(|c| c.matches_name(name))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
    pub name: String,
    pub dev_name: String,
    pub price: Number,
    pub rarity: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShopRotation {
    pub featured: Vec<ShopItem>,
    pub daily: Vec<ShopItem>,
}

/// State shared with every poise command.
#[cfg(feature = "bot")]
pub struct DiscordData {
    pub dispatcher: std::sync::Arc<crate::command::Dispatcher>,
}
