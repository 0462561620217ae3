use std::sync::Arc;

use poise::serenity_prelude as serenity;
use serenity::all::{ActivityData, GatewayIntents, GuildId, ShardManager};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::Error;
use crate::{command::Dispatcher, data::DiscordData, lifecycle::IntegrationContext};

/// A running gateway connection.
pub struct BotHandle {
    shard_manager: Arc<ShardManager>,
    task: JoinHandle<()>,
}

impl BotHandle {
    pub async fn disconnect(self) {
        self.shard_manager.shutdown_all().await;
        if let Err(e) = self.task.await {
            error!("Bot task ended abnormally: {}", e);
        }
    }
}

async fn on_error(error: poise::FrameworkError<'_, DiscordData, Error>) {
    if let Err(e) = poise::builtins::on_error(error).await {
        error!("Error while handling error: {}", e);
    }
}

/// Builds the poise framework, connects to the gateway and returns once the
/// client is running in the background.
pub async fn start(ctx: Arc<IntegrationContext>) -> anyhow::Result<BotHandle> {
    let bot = &ctx.config.bot;
    let guild_id = bot
        .guild_id
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(GuildId::new);
    let data = DiscordData {
        dispatcher: Arc::new(Dispatcher::new(ctx.clone())),
    };

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: super::commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot ready as {}", ready.user.tag());
                ctx.set_activity(Some(ActivityData::watching("Neodyme Server")));

                let commands = &framework.options().commands;
                let registered = match guild_id {
                    Some(guild_id) => poise::builtins::register_in_guild(ctx, commands, guild_id).await,
                    None => poise::builtins::register_globally(ctx, commands).await,
                };
                match registered {
                    Ok(()) => info!("Slash commands registered"),
                    Err(e) => error!("Failed to register commands: {}", e),
                }
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&bot.token, GatewayIntents::GUILDS)
        .framework(framework)
        .await?;
    let shard_manager = client.shard_manager.clone();

    let task = tokio::spawn(async move {
        if let Err(why) = client.start().await {
            error!("Bot error: {:?}", why);
        }
    });
    info!("Bot client started");

    Ok(BotHandle { shard_manager, task })
}
