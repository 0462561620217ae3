use std::collections::{BTreeMap, HashSet};

use crate::config::{BotConfig, CommandConfig};

/// Static command permissions: which role names may run each command and
/// which Discord role ids make up each role name.
#[derive(Debug, Clone, Copy)]
pub struct Policy<'a> {
    commands: &'a BTreeMap<String, CommandConfig>,
    roles: &'a BTreeMap<String, Vec<String>>,
}

impl<'a> Policy<'a> {
    pub fn new(
        commands: &'a BTreeMap<String, CommandConfig>,
        roles: &'a BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self { commands, roles }
    }

    /// A command missing from the table or switched off is denied for
    /// everyone. An empty role list is open to all; otherwise holding any
    /// one of the listed roles is enough.
    pub fn authorize(&self, command: &str, memberships: &HashSet<String>) -> bool {
        let Some(entry) = self.commands.get(command).filter(|c| c.enabled) else {
            return false;
        };
        if entry.allowed_roles.is_empty() {
            return true;
        }
        entry.allowed_roles.iter().any(|role_name| {
            self.roles
                .get(role_name)
                .is_some_and(|ids| ids.iter().any(|id| memberships.contains(id)))
        })
    }
}

impl<'a> From<&'a BotConfig> for Policy<'a> {
    fn from(bot: &'a BotConfig) -> Self {
        Self::new(&bot.commands, &bot.roles)
    }
}
