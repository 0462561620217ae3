use chrono::Utc;
use sysinfo::{ProcessesToUpdate, System};
use tracing::info;

use super::{
    CommandKind, Invocation,
    dispatch::Reply,
    duration::{BanDuration, PERMANENT},
};
use crate::{
    data::{AccountRecord, BanRecord, CURRENCY_NAME, DEFAULT_ROLE, NO_REASON, NOT_AVAILABLE, UNKNOWN, find_by_name},
    embed::Tone,
    error::CommandError,
    lifecycle::{IntegrationContext, format_uptime},
};

type HandlerResult = Result<Reply, CommandError>;

pub(super) async fn run(ctx: &IntegrationContext, kind: CommandKind, invocation: &Invocation) -> HandlerResult {
    match kind {
        CommandKind::CreateAccount => create_account(ctx, invocation).await,
        CommandKind::ViewAccount => view_account(ctx, invocation).await,
        CommandKind::BanUser => ban_user(ctx, invocation).await,
        CommandKind::UnbanUser => unban_user(ctx, invocation).await,
        CommandKind::GiveVbucks => give_vbucks(ctx, invocation).await,
        CommandKind::ServerStatus => Ok(server_status(ctx)),
        CommandKind::PlayerCount => player_count(ctx).await,
    }
}

fn required<'a>(invocation: &'a Invocation, name: &'static str) -> Result<&'a str, CommandError> {
    invocation.string(name).ok_or(CommandError::MissingOption(name))
}

fn not_found(ctx: &IntegrationContext, username: &str) -> Reply {
    Reply::private(
        ctx.embeds
            .create("Not Found", Tone::Error)
            .description(format!("Account **{username}** not found.")),
    )
}

fn failed(ctx: &IntegrationContext, message: Option<String>, fallback: &str) -> Reply {
    Reply::private(
        ctx.embeds
            .create("Failed", Tone::Error)
            .description(message.filter(|m| !m.is_empty()).unwrap_or_else(|| fallback.to_owned())),
    )
}

async fn create_account(ctx: &IntegrationContext, invocation: &Invocation) -> HandlerResult {
    let email = required(invocation, "email")?;
    let username = required(invocation, "username")?;
    let password = required(invocation, "password")?;

    let result = ctx.accounts.create_account(email, username, password).await?;
    if !result.created() {
        return Ok(failed(ctx, result.message, "Failed to create account"));
    }

    info!("{} created account {}", invocation.caller, username);
    Ok(Reply::private(
        ctx.embeds
            .create("Account Created", Tone::Success)
            .description(format!("Account **{username}** created successfully!"))
            .field("Email", email, true)
            .field("Username", username, true),
    ))
}

async fn view_account(ctx: &IntegrationContext, invocation: &Invocation) -> HandlerResult {
    let username = required(invocation, "username")?;
    let mut clients = ctx.accounts.get_clients().await?;
    let Some(account) = find_by_name(&mut clients, username) else {
        return Ok(not_found(ctx, username));
    };

    let or_na = |value: &Option<String>| value.clone().unwrap_or_else(|| NOT_AVAILABLE.to_owned());
    let AccountRecord {
        account_id,
        display_name,
        email,
        role,
        ..
    } = &*account;
    let account_id = Some(account_id.clone()).filter(|id| !id.is_empty());

    Ok(Reply::private(
        ctx.embeds
            .create(format!("Account: {}", display_name.as_deref().unwrap_or(username)), Tone::Info)
            .field("Account ID", or_na(&account_id), false)
            .field("Display Name", or_na(display_name), true)
            .field("Email", or_na(email), true)
            .field("Role", role.as_deref().unwrap_or(DEFAULT_ROLE), true)
            .field(
                "Created",
                account
                    .created()
                    .map_or_else(|| NOT_AVAILABLE.to_owned(), |at| format!("<t:{}:R>", at.timestamp())),
                true,
            )
            .field("Banned", if account.is_banned() { "Yes" } else { "No" }, true),
    ))
}

async fn ban_user(ctx: &IntegrationContext, invocation: &Invocation) -> HandlerResult {
    let username = required(invocation, "username")?;
    let reason = invocation.string("reason").unwrap_or(NO_REASON);
    let duration = invocation.string("duration").unwrap_or(PERMANENT);

    let mut clients = ctx.accounts.get_clients().await?;
    let Some(account) = find_by_name(&mut clients, username) else {
        return Ok(not_found(ctx, username));
    };

    let now = Utc::now();
    account.ban = Some(BanRecord::issued(
        reason.to_owned(),
        invocation.caller.clone(),
        now,
        BanDuration::parse(duration).expires_at(now),
    ));
    ctx.accounts.save_clients(&clients).await?;

    info!("{} banned {} ({}, {})", invocation.caller, username, duration, reason);
    Ok(Reply::private(
        ctx.embeds
            .create("User Banned", Tone::Success)
            .description(format!("**{username}** has been banned."))
            .field("Reason", reason, true)
            .field("Duration", duration, true)
            .field("Banned By", invocation.caller.as_str(), true),
    ))
}

async fn unban_user(ctx: &IntegrationContext, invocation: &Invocation) -> HandlerResult {
    let username = required(invocation, "username")?;
    let mut clients = ctx.accounts.get_clients().await?;
    let Some(account) = find_by_name(&mut clients, username) else {
        return Ok(not_found(ctx, username));
    };

    if !account.is_banned() {
        return Ok(Reply::private(
            ctx.embeds
                .create("Not Banned", Tone::Warning)
                .description(format!("**{username}** is not banned.")),
        ));
    }

    account.ban = Some(BanRecord::lifted());
    ctx.accounts.save_clients(&clients).await?;

    info!("{} unbanned {}", invocation.caller, username);
    Ok(Reply::private(
        ctx.embeds
            .create("User Unbanned", Tone::Success)
            .description(format!("**{username}** has been unbanned.")),
    ))
}

async fn give_vbucks(ctx: &IntegrationContext, invocation: &Invocation) -> HandlerResult {
    let username = required(invocation, "username")?;
    let amount = invocation
        .integer("amount")
        .ok_or(CommandError::MissingOption("amount"))?;

    let mut clients = ctx.accounts.get_clients().await?;
    let Some(account) = find_by_name(&mut clients, username) else {
        return Ok(not_found(ctx, username));
    };

    let result = ctx.accounts.add_vbucks(&account.account_id, amount).await?;
    if !result.success {
        return Ok(failed(ctx, result.message, "Failed to add V-Bucks"));
    }

    info!("{} gave {} {} to {}", invocation.caller, amount, CURRENCY_NAME, username);
    let balance = result
        .new_balance
        .map_or_else(|| UNKNOWN.to_owned(), |b| b.to_string());
    Ok(Reply::private(
        ctx.embeds
            .create("V-Bucks Added", Tone::Success)
            .description(format!("Added **{amount}** {CURRENCY_NAME} to **{username}**"))
            .field("New Balance", format!("{balance} {CURRENCY_NAME}"), true),
    ))
}

fn memory_usage_mb() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map(|process| process.memory() / 1024 / 1024)
}

fn server_status(ctx: &IntegrationContext) -> Reply {
    let memory = memory_usage_mb().map_or_else(|| UNKNOWN.to_owned(), |mb| format!("{mb} MB"));
    Reply::public(
        ctx.embeds
            .create("Server Status", Tone::Info)
            .field("Status", "Online", true)
            .field("Uptime", format_uptime(ctx.uptime()), true)
            .field("Memory Usage", memory, true)
            .field("Version", concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")), true),
    )
}

async fn player_count(ctx: &IntegrationContext) -> HandlerResult {
    let total = ctx.accounts.get_clients().await?.len();
    Ok(Reply::public(
        ctx.embeds
            .create("Player Statistics", Tone::Info)
            .field("Total Accounts", total.to_string(), true),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::testing::{Failure, MemoryBackend},
        command::{
            CommandArg,
            dispatch::tests::{ADMIN_ROLE, RecordingResponder, dispatcher},
        },
        embed::Embed,
    };

    fn call(name: &str) -> Invocation {
        Invocation::new("mod#0042", name).with_roles([ADMIN_ROLE])
    }

    async fn run_with(backend: &MemoryBackend, invocation: Invocation) -> Embed {
        let mut responder = RecordingResponder::default();
        dispatcher(backend.clone()).dispatch(invocation, &mut responder).await;
        responder.embed().clone()
    }

    #[tokio::test]
    async fn view_account_matches_any_case() {
        let backend = MemoryBackend::with_alice();
        let embed = run_with(&backend, call("view-account").arg(CommandArg::string("username", "ALICE"))).await;

        assert_eq!(embed.title.as_deref(), Some("Account: alice"));
        assert_eq!(embed.field_value("Account ID"), Some("acc-alice"));
        assert_eq!(embed.field_value("Email"), Some("alice@example.com"));
        assert_eq!(embed.field_value("Role"), Some("player"));
        assert_eq!(embed.field_value("Created"), Some("<t:1700000000:R>"));
        assert_eq!(embed.field_value("Banned"), Some("No"));
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let backend = MemoryBackend::with_alice();
        for name in ["view-account", "ban-user", "unban-user"] {
            let embed = run_with(&backend, call(name).arg(CommandArg::string("username", "bob"))).await;
            assert_eq!(embed.title.as_deref(), Some("Not Found"));
            assert_eq!(embed.description.as_deref(), Some("Account **bob** not found."));
        }
        assert_eq!(backend.saves(), 0);
    }

    #[tokio::test]
    async fn ban_then_unban_round_trip() {
        let backend = MemoryBackend::with_alice();
        let embed = run_with(
            &backend,
            call("ban-user")
                .arg(CommandArg::string("username", "Alice"))
                .arg(CommandArg::string("reason", "griefing"))
                .arg(CommandArg::string("duration", "7d")),
        )
        .await;
        assert_eq!(embed.title.as_deref(), Some("User Banned"));
        assert_eq!(embed.field_value("Banned By"), Some("mod#0042"));
        assert_eq!(embed.field_value("Duration"), Some("7d"));

        let ban = backend.account("acc-alice").ban.unwrap();
        assert!(ban.banned);
        assert_eq!(ban.reason.as_deref(), Some("griefing"));
        assert_eq!(ban.banned_by.as_deref(), Some("mod#0042"));
        let length = ban.ban_expires.unwrap() - ban.banned_at.unwrap();
        assert_eq!(length.num_seconds(), 604_800);

        let embed = run_with(&backend, call("unban-user").arg(CommandArg::string("username", "alice"))).await;
        assert_eq!(embed.title.as_deref(), Some("User Unbanned"));
        assert_eq!(backend.account("acc-alice").ban, Some(BanRecord::lifted()));
        assert_eq!(backend.saves(), 2);
    }

    #[tokio::test]
    async fn ban_defaults_to_permanent_without_reason() {
        let backend = MemoryBackend::with_alice();
        let embed = run_with(&backend, call("ban-user").arg(CommandArg::string("username", "alice"))).await;
        assert_eq!(embed.field_value("Reason"), Some(NO_REASON));
        assert_eq!(embed.field_value("Duration"), Some("permanent"));

        let ban = backend.account("acc-alice").ban.unwrap();
        assert_eq!(ban.reason.as_deref(), Some(NO_REASON));
        assert_eq!(ban.ban_expires, None);
    }

    #[tokio::test]
    async fn unrecognized_duration_bans_forever() {
        let backend = MemoryBackend::with_alice();
        run_with(
            &backend,
            call("ban-user")
                .arg(CommandArg::string("username", "alice"))
                .arg(CommandArg::string("duration", "two weeks")),
        )
        .await;
        let ban = backend.account("acc-alice").ban.unwrap();
        assert!(ban.banned);
        assert_eq!(ban.ban_expires, None);
    }

    #[tokio::test]
    async fn unban_of_unbanned_account_is_informational() {
        let backend = MemoryBackend::with_alice();
        let embed = run_with(&backend, call("unban-user").arg(CommandArg::string("username", "alice"))).await;
        assert_eq!(embed.title.as_deref(), Some("Not Banned"));
        assert_eq!(embed.color, 0xffcc00);
        assert_eq!(backend.saves(), 0);
    }

    #[tokio::test]
    async fn create_account_echoes_fields_or_backend_message() {
        let backend = MemoryBackend::default();
        let invocation = call("create-account")
            .arg(CommandArg::string("email", "new@example.com"))
            .arg(CommandArg::string("username", "newbie"))
            .arg(CommandArg::string("password", "hunter2"));

        let embed = run_with(&backend, invocation.clone()).await;
        assert_eq!(embed.title.as_deref(), Some("Account Created"));
        assert_eq!(embed.field_value("Email"), Some("new@example.com"));
        assert_eq!(embed.field_value("Username"), Some("newbie"));

        let rejecting = MemoryBackend::default().failing(Failure::Reject);
        let embed = run_with(&rejecting, invocation).await;
        assert_eq!(embed.title.as_deref(), Some("Failed"));
        assert_eq!(embed.description.as_deref(), Some("rejected by backend"));
    }

    #[tokio::test]
    async fn give_vbucks_reports_new_balance() {
        let backend = MemoryBackend::with_alice();
        let embed = run_with(
            &backend,
            call("give-vbucks")
                .arg(CommandArg::string("username", "alice"))
                .arg(CommandArg::integer("amount", 250)),
        )
        .await;
        assert_eq!(embed.title.as_deref(), Some("V-Bucks Added"));
        assert_eq!(embed.description.as_deref(), Some("Added **250** V-Bucks to **alice**"));
        assert_eq!(embed.field_value("New Balance"), Some("1250 V-Bucks"));
    }

    #[tokio::test]
    async fn player_count_and_status_are_public() {
        let backend = MemoryBackend::with_alice();
        let mut responder = RecordingResponder::default();
        dispatcher(backend.clone()).dispatch(call("player-count"), &mut responder).await;
        assert!(!responder.terminal()[0].ephemeral);
        assert_eq!(responder.embed().field_value("Total Accounts"), Some("1"));

        let mut responder = RecordingResponder::default();
        dispatcher(backend).dispatch(call("server-status"), &mut responder).await;
        let embed = responder.embed();
        assert!(!responder.terminal()[0].ephemeral);
        assert_eq!(embed.field_value("Status"), Some("Online"));
        assert!(embed.field_value("Uptime").unwrap().ends_with('s'));
        assert!(embed.field_value("Memory Usage").is_some());
    }

    #[tokio::test]
    async fn player_count_error_is_private() {
        let backend = MemoryBackend::with_alice().failing(Failure::Error);
        let mut responder = RecordingResponder::default();
        dispatcher(backend).dispatch(call("player-count"), &mut responder).await;
        assert!(responder.terminal()[0].ephemeral);
        assert_eq!(responder.embed().title.as_deref(), Some("Error"));
    }
}
