//! Slash command core: authorization, dispatch and the handlers behind the
//! seven moderation commands. Nothing in here depends on the Discord
//! gateway; the `discord` module adapts interactions to [`Invocation`] and
//! [`Responder`].

pub mod auth;
pub(crate) mod dispatch;
pub mod duration;
mod handlers;

use std::collections::HashSet;

pub use dispatch::{Dispatcher, Reply, Responder, ResponderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    CreateAccount,
    ViewAccount,
    BanUser,
    UnbanUser,
    GiveVbucks,
    ServerStatus,
    PlayerCount,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::CreateAccount,
        CommandKind::ViewAccount,
        CommandKind::BanUser,
        CommandKind::UnbanUser,
        CommandKind::GiveVbucks,
        CommandKind::ServerStatus,
        CommandKind::PlayerCount,
    ];

    pub fn slash_name(self) -> &'static str {
        match self {
            CommandKind::CreateAccount => "create-account",
            CommandKind::ViewAccount => "view-account",
            CommandKind::BanUser => "ban-user",
            CommandKind::UnbanUser => "unban-user",
            CommandKind::GiveVbucks => "give-vbucks",
            CommandKind::ServerStatus => "server-status",
            CommandKind::PlayerCount => "player-count",
        }
    }

    /// Key of the command in the `bot.commands` config table.
    pub fn config_key(self) -> &'static str {
        match self {
            CommandKind::CreateAccount => "createAccount",
            CommandKind::ViewAccount => "viewAccount",
            CommandKind::BanUser => "banUser",
            CommandKind::UnbanUser => "unbanUser",
            CommandKind::GiveVbucks => "giveVbucks",
            CommandKind::ServerStatus => "serverStatus",
            CommandKind::PlayerCount => "playerCount",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let canonical = canonical_name(name);
        Self::ALL
            .into_iter()
            .find(|kind| canonical_name(kind.slash_name()) == canonical)
    }

    /// Commands that wait on the account backend acknowledge first.
    pub fn defers(self) -> bool {
        !matches!(self, CommandKind::ServerStatus | CommandKind::PlayerCount)
    }
}

/// `Ban-User` and `banuser` both become `banuser`.
pub fn canonical_name(name: &str) -> String {
    name.chars().filter(|c| *c != '-').collect::<String>().to_lowercase()
}

/// Config key used to authorize `name`. Unknown names are looked up by
/// their canonical form.
pub fn policy_key(name: &str) -> String {
    CommandKind::from_name(name)
        .map(|kind| kind.config_key().to_owned())
        .unwrap_or_else(|| canonical_name(name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArg {
    pub name: String,
    pub value: ArgValue,
}

impl CommandArg {
    pub fn string(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_owned(),
            value: ArgValue::String(value.into()),
        }
    }

    pub fn integer(name: &str, value: i64) -> Self {
        Self {
            name: name.to_owned(),
            value: ArgValue::Integer(value),
        }
    }
}

/// One slash command call as seen by the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Discord tag of the caller, recorded as the ban issuer.
    pub caller: String,
    /// Role ids the caller holds in the guild.
    pub roles: HashSet<String>,
    pub name: String,
    pub args: Vec<CommandArg>,
}

impl Invocation {
    pub fn new(caller: &str, name: &str) -> Self {
        Self {
            caller: caller.to_owned(),
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn arg(mut self, arg: CommandArg) -> Self {
        self.args.push(arg);
        self
    }

    /// String option `name`, `None` if absent or empty.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.args.iter().find(|a| a.name == name).and_then(|a| match &a.value {
            ArgValue::String(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.args.iter().find(|a| a.name == name).and_then(|a| match a.value {
            ArgValue::Integer(i) => Some(i),
            _ => None,
        })
    }
}
