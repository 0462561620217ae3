use async_trait::async_trait;
use poise::{CreateReply, serenity_prelude as serenity};
use serenity::all::{CreateEmbed, CreateEmbedFooter, EditInteractionResponse, Timestamp};

use super::{Context, Error};
use crate::{
    command::{CommandArg, Invocation, Reply, Responder, ResponderError},
    data::DiscordData,
    embed::Embed,
};

pub fn all() -> Vec<poise::Command<DiscordData, Error>> {
    vec![
        create_account(),
        view_account(),
        ban_user(),
        unban_user(),
        give_vbucks(),
        server_status(),
        player_count(),
    ]
}

fn to_serenity(embed: Embed) -> CreateEmbed {
    let mut out = CreateEmbed::new().colour(embed.color);
    if let Some(title) = embed.title {
        out = out.title(title);
    }
    if let Some(description) = embed.description {
        out = out.description(description);
    }
    for field in embed.fields {
        out = out.field(field.name, field.value, field.inline);
    }
    if let Some(timestamp) = embed
        .timestamp
        .and_then(|at| Timestamp::from_unix_timestamp(at.timestamp()).ok())
    {
        out = out.timestamp(timestamp);
    }
    if let Some(footer) = embed.footer {
        let mut builder = CreateEmbedFooter::new(footer.text);
        if let Some(icon) = footer.icon_url {
            builder = builder.icon_url(icon);
        }
        out = out.footer(builder);
    }
    if let Some(thumbnail) = embed.thumbnail {
        out = out.thumbnail(thumbnail.url);
    }
    if let Some(image) = embed.image {
        out = out.image(image.url);
    }
    out
}

fn to_create_reply(reply: Reply) -> CreateReply {
    let mut out = CreateReply::default().ephemeral(reply.ephemeral);
    if let Some(content) = reply.content {
        out = out.content(content);
    }
    if let Some(embed) = reply.embed {
        out = out.embed(to_serenity(embed));
    }
    out
}

/// Answers the slash command interaction behind a poise context.
struct InteractionResponder<'a> {
    ctx: Context<'a>,
}

#[async_trait]
impl Responder for InteractionResponder<'_> {
    async fn reply(&mut self, reply: Reply) -> Result<(), ResponderError> {
        self.ctx.send(to_create_reply(reply)).await?;
        Ok(())
    }

    async fn defer(&mut self) -> Result<(), ResponderError> {
        self.ctx.defer_ephemeral().await?;
        Ok(())
    }

    async fn edit(&mut self, reply: Reply) -> Result<(), ResponderError> {
        match self.ctx {
            poise::Context::Application(app) => {
                let mut edit = EditInteractionResponse::new();
                if let Some(content) = reply.content {
                    edit = edit.content(content);
                }
                if let Some(embed) = reply.embed {
                    edit = edit.embed(to_serenity(embed));
                }
                app.interaction.edit_response(app.serenity_context, edit).await?;
            }
            poise::Context::Prefix(_) => {
                self.ctx.send(to_create_reply(reply)).await?;
            }
        }
        Ok(())
    }
}

/// Hands the interaction to the dispatcher, which always answers it.
async fn forward(ctx: Context<'_>, args: Vec<CommandArg>) -> Result<(), Error> {
    let roles = match ctx.author_member().await {
        Some(member) => member.roles.iter().map(|role| role.to_string()).collect(),
        None => Default::default(),
    };
    let invocation = Invocation {
        caller: ctx.author().tag(),
        roles,
        name: ctx.command().name.clone(),
        args,
    };

    let mut responder = InteractionResponder { ctx };
    ctx.data().dispatcher.dispatch(invocation, &mut responder).await;
    Ok(())
}

/// Create a new account
#[poise::command(slash_command, guild_only, rename = "create-account")]
pub async fn create_account(
    ctx: Context<'_>,
    #[description = "Email address"] email: String,
    #[description = "Username"] username: String,
    #[description = "Password"] password: String,
) -> Result<(), Error> {
    forward(
        ctx,
        vec![
            CommandArg::string("email", email),
            CommandArg::string("username", username),
            CommandArg::string("password", password),
        ],
    )
    .await
}

/// View account information
#[poise::command(slash_command, guild_only, rename = "view-account")]
pub async fn view_account(
    ctx: Context<'_>,
    #[description = "Username to look up"] username: String,
) -> Result<(), Error> {
    forward(ctx, vec![CommandArg::string("username", username)]).await
}

/// Ban a user
#[poise::command(slash_command, guild_only, rename = "ban-user")]
pub async fn ban_user(
    ctx: Context<'_>,
    #[description = "Username to ban"] username: String,
    #[description = "Ban reason"] reason: Option<String>,
    #[description = "Ban duration (e.g., 7d, 30d, permanent)"] duration: Option<String>,
) -> Result<(), Error> {
    let mut args = vec![CommandArg::string("username", username)];
    if let Some(reason) = reason {
        args.push(CommandArg::string("reason", reason));
    }
    if let Some(duration) = duration {
        args.push(CommandArg::string("duration", duration));
    }
    forward(ctx, args).await
}

/// Unban a user
#[poise::command(slash_command, guild_only, rename = "unban-user")]
pub async fn unban_user(
    ctx: Context<'_>,
    #[description = "Username to unban"] username: String,
) -> Result<(), Error> {
    forward(ctx, vec![CommandArg::string("username", username)]).await
}

/// Give V-Bucks to a user
#[poise::command(slash_command, guild_only, rename = "give-vbucks")]
pub async fn give_vbucks(
    ctx: Context<'_>,
    #[description = "Username"] username: String,
    #[description = "Amount of V-Bucks"] amount: i64,
) -> Result<(), Error> {
    forward(
        ctx,
        vec![
            CommandArg::string("username", username),
            CommandArg::integer("amount", amount),
        ],
    )
    .await
}

/// View server status
#[poise::command(slash_command, guild_only, rename = "server-status")]
pub async fn server_status(ctx: Context<'_>) -> Result<(), Error> {
    forward(ctx, Vec::new()).await
}

/// View current player count
#[poise::command(slash_command, guild_only, rename = "player-count")]
pub async fn player_count(ctx: Context<'_>) -> Result<(), Error> {
    forward(ctx, Vec::new()).await
}
