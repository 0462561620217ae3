//! Slash-command surface over poise. Every command forwards to
//! [`crate::command::Dispatcher`], so nothing in here decides an outcome.

mod commands;
pub mod framework;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, crate::data::DiscordData, Error>;
