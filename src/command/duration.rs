use std::sync::LazyLock;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;

pub static PERMANENT: &str = "permanent";

static DURATION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([dhm])$").expect("duration pattern is valid"));

/// Length of a ban given as `permanent`, `<n>d`, `<n>h` or `<n>m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanDuration {
    Permanent,
    For(TimeDelta),
}

impl BanDuration {
    /// Anything that is not a well-formed, representable token is a
    /// permanent ban.
    pub fn parse(token: &str) -> Self {
        if token == PERMANENT {
            return Self::Permanent;
        }
        let Some(caps) = DURATION_TOKEN.captures(token) else {
            return Self::Permanent;
        };
        let Ok(value) = caps[1].parse::<i64>() else {
            return Self::Permanent;
        };
        let delta = match &caps[2] {
            "d" => TimeDelta::try_days(value),
            "h" => TimeDelta::try_hours(value),
            _ => TimeDelta::try_minutes(value),
        };
        delta.map_or(Self::Permanent, Self::For)
    }

    pub fn expires_at(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Permanent => None,
            Self::For(delta) => now.checked_add_signed(delta),
        }
    }
}
