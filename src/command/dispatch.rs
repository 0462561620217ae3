use std::{panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, info, warn};

use super::{CommandKind, Invocation, auth::Policy, handlers, policy_key};
use crate::{
    embed::{Embed, Tone},
    lifecycle::IntegrationContext,
};

pub type ResponderError = Box<dyn std::error::Error + Send + Sync>;

/// A message for the caller: an embed or plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub embed: Option<Embed>,
    pub content: Option<String>,
    /// Only the caller can see it.
    pub ephemeral: bool,
}

impl Reply {
    pub fn private(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            content: None,
            ephemeral: true,
        }
    }

    pub fn public(embed: Embed) -> Self {
        Self {
            ephemeral: false,
            ..Self::private(embed)
        }
    }

    pub fn text(content: &str) -> Self {
        Self {
            embed: None,
            content: Some(content.to_owned()),
            ephemeral: true,
        }
    }
}

/// Delivers replies for one interaction. `defer` posts a placeholder that a
/// later `edit` replaces.
#[async_trait]
pub trait Responder: Send {
    async fn reply(&mut self, reply: Reply) -> Result<(), ResponderError>;

    async fn defer(&mut self) -> Result<(), ResponderError>;

    async fn edit(&mut self, reply: Reply) -> Result<(), ResponderError>;
}

/// Routes invocations to their handler. Every call to [`Dispatcher::dispatch`]
/// ends with exactly one terminal reply and never returns an error.
pub struct Dispatcher {
    ctx: Arc<IntegrationContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<IntegrationContext>) -> Self {
        Self { ctx }
    }

    pub async fn dispatch<R>(&self, invocation: Invocation, responder: &mut R)
    where
        R: Responder + ?Sized,
    {
        let key = policy_key(&invocation.name);
        let policy = Policy::from(&self.ctx.config.bot);
        if !policy.authorize(&key, &invocation.roles) {
            info!("{} denied /{}", invocation.caller, invocation.name);
            let denied = self
                .ctx
                .embeds
                .create("Permission Denied", Tone::Error)
                .description("You do not have permission to use this command.");
            deliver(responder, &invocation, Reply::private(denied), false).await;
            return;
        }

        let Some(kind) = CommandKind::from_name(&invocation.name) else {
            warn!("No handler for /{}", invocation.name);
            deliver(responder, &invocation, Reply::text("Unknown command"), false).await;
            return;
        };

        let deferred = kind.defers()
            && match responder.defer().await {
                Ok(()) => true,
                Err(e) => {
                    error!("Failed to defer /{}: {}", invocation.name, e);
                    false
                }
            };

        let outcome = AssertUnwindSafe(handlers::run(&self.ctx, kind, &invocation))
            .catch_unwind()
            .await;
        let reply = match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                error!("Command /{} failed: {}", invocation.name, e);
                self.error_reply(&e.to_string())
            }
            Err(_) => {
                error!("Command /{} panicked", invocation.name);
                self.error_reply("An internal error occurred")
            }
        };
        deliver(responder, &invocation, reply, deferred).await;
    }

    fn error_reply(&self, message: &str) -> Reply {
        Reply::private(self.ctx.embeds.create("Error", Tone::Error).description(message))
    }
}

async fn deliver<R>(responder: &mut R, invocation: &Invocation, reply: Reply, deferred: bool)
where
    R: Responder + ?Sized,
{
    let sent = if deferred {
        responder.edit(reply).await
    } else {
        responder.reply(reply).await
    };
    if let Err(e) = sent {
        error!("Failed to answer /{} for {}: {}", invocation.name, invocation.caller, e);
    }
}
