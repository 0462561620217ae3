use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    backend::{AccountBackend, ShopSource},
    config::Config,
    embed::{EmbedFactory, Tone},
    error::ConfigError,
    shop,
    webhook::{Delivery, Notifier},
};

/// Everything the commands, notifications and rotation hook share. Built
/// once at startup and read-only afterwards.
pub struct IntegrationContext {
    pub config: Config,
    pub embeds: EmbedFactory,
    pub notifier: Notifier,
    pub accounts: Arc<dyn AccountBackend>,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
}

impl IntegrationContext {
    pub fn new(config: Config, accounts: Arc<dyn AccountBackend>) -> Self {
        Self {
            embeds: EmbedFactory::new(config.embeds.clone()),
            config,
            notifier: Notifier::new(),
            accounts,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// `3h 4m 5s`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// `enabled` is false in the config file.
    DisabledByConfig,
    /// The bot was requested but cannot run; webhooks still work.
    BotUnavailable,
    Active,
}

#[cfg(feature = "bot")]
type BotHandle = crate::discord::framework::BotHandle;

pub struct Lifecycle {
    ctx: Arc<IntegrationContext>,
    status: ModuleStatus,
    #[cfg(feature = "bot")]
    bot: Option<BotHandle>,
    rotation: Option<JoinHandle<()>>,
}

impl Lifecycle {
    /// Loads the config and brings up webhooks, the bot and the rotation
    /// hook. Only a broken config file is an error; the caller logs it.
    pub async fn start(
        config_path: &Path,
        accounts: Arc<dyn AccountBackend>,
        shop: Arc<dyn ShopSource>,
    ) -> Result<Self, ConfigError> {
        let config = Config::load_or_create(config_path)?;
        let ctx = Arc::new(IntegrationContext::new(config, accounts));

        let mut lifecycle = Lifecycle {
            ctx: ctx.clone(),
            status: ModuleStatus::Active,
            #[cfg(feature = "bot")]
            bot: None,
            rotation: None,
        };

        if !ctx.config.enabled {
            info!("Discord integration disabled in config");
            lifecycle.status = ModuleStatus::DisabledByConfig;
            return Ok(lifecycle);
        }

        if ctx.config.webhooks.server_status.is_configured() {
            send_start_notification(&ctx).await;
        }

        let bot = &ctx.config.bot;
        if bot.enabled && !bot.token.is_empty() {
            lifecycle.start_bot().await;
        }

        lifecycle.rotation = Some(shop::spawn_rotation_listener(ctx.clone(), shop));

        info!("Discord integration initialized ({:?})", lifecycle.status);
        Ok(lifecycle)
    }

    #[cfg(feature = "bot")]
    async fn start_bot(&mut self) {
        match crate::discord::framework::start(self.ctx.clone()).await {
            Ok(handle) => self.bot = Some(handle),
            Err(e) => {
                warn!("Bot initialization failed: {:#}", e);
                warn!("Bot features disabled. Webhooks will still work.");
                self.status = ModuleStatus::BotUnavailable;
            }
        }
    }

    #[cfg(not(feature = "bot"))]
    async fn start_bot(&mut self) {
        warn!("Built without the `bot` feature, slash commands are unavailable");
        warn!("Bot features disabled. Webhooks will still work.");
        self.status = ModuleStatus::BotUnavailable;
    }

    #[cfg(feature = "bot")]
    async fn disconnect_bot(&mut self) {
        if let Some(bot) = self.bot.take() {
            bot.disconnect().await;
            info!("Bot disconnected");
        }
    }

    #[cfg(not(feature = "bot"))]
    async fn disconnect_bot(&mut self) {}

    pub fn status(&self) -> ModuleStatus {
        self.status
    }

    #[cfg(test)]
    pub fn context(&self) -> &Arc<IntegrationContext> {
        &self.ctx
    }

    /// Stop notification, then bot disconnect, then the rotation hook. No
    /// step can prevent the next one from running.
    pub async fn shutdown(mut self) {
        if self.status != ModuleStatus::DisabledByConfig
            && self.ctx.config.webhooks.server_status.is_configured()
        {
            send_stop_notification(&self.ctx).await;
        }

        self.disconnect_bot().await;

        if let Some(rotation) = self.rotation.take() {
            rotation.abort();
        }
        info!("Discord integration shut down");
    }
}

async fn send_start_notification(ctx: &IntegrationContext) {
    let embed = ctx
        .embeds
        .create("Server Online", Tone::ServerOnline)
        .description("The Neodyme server has started successfully!")
        .field("Status", "Online", true)
        .field("Started At", format!("<t:{}:F>", ctx.started_at.timestamp()), true);

    match ctx.notifier.notify(&ctx.config.webhooks.server_status, &embed).await {
        Ok(Delivery::Sent(_)) => info!("Server start webhook sent"),
        Ok(Delivery::Skipped) => {}
        Err(e) => error!("Failed to send start webhook: {}", e),
    }
}

async fn send_stop_notification(ctx: &IntegrationContext) {
    let embed = ctx
        .embeds
        .create("Server Offline", Tone::ServerOffline)
        .description("The Neodyme server is shutting down.")
        .field("Status", "Offline", true)
        .field("Uptime", format_uptime(ctx.uptime()), true);

    match ctx.notifier.notify(&ctx.config.webhooks.server_status, &embed).await {
        Ok(Delivery::Sent(_)) => info!("Server stop webhook sent"),
        Ok(Delivery::Skipped) => {}
        Err(e) => error!("Failed to send stop webhook: {}", e),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::broadcast;

    use super::*;
    use crate::{
        backend::{RotationCompleted, testing::MemoryBackend},
        error::BackendError,
        webhook::tests::spawn_sink,
    };

    pub fn context_with(config: Config, backend: MemoryBackend) -> IntegrationContext {
        IntegrationContext::new(config, Arc::new(backend))
    }

    struct NoShop(broadcast::Sender<RotationCompleted>);

    #[async_trait]
    impl ShopSource for NoShop {
        async fn get_shop_data(&self) -> Result<Option<Value>, BackendError> {
            Ok(None)
        }

        fn subscribe_rotations(&self) -> broadcast::Receiver<RotationCompleted> {
            self.0.subscribe()
        }
    }

    fn no_shop() -> Arc<dyn ShopSource> {
        Arc::new(NoShop(broadcast::channel(1).0))
    }

    fn write_config(dir: &tempfile::TempDir, config: &Config) -> std::path::PathBuf {
        let path = dir.path().join("config.json");
        config.save(&path).unwrap();
        path
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0h 0m 0s");
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 4 * 60 + 5)), "3h 4m 5s");
        assert_eq!(format_uptime(Duration::from_secs(50 * 3600 + 59)), "50h 0m 59s");
    }

    #[tokio::test]
    async fn start_and_stop_notifications_are_sent() {
        let sink = spawn_sink(204).await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.webhooks.server_status.url = sink.url.clone();
        let path = write_config(&dir, &config);

        let lifecycle = Lifecycle::start(&path, Arc::new(MemoryBackend::default()), no_shop())
            .await
            .unwrap();
        assert_eq!(lifecycle.status(), ModuleStatus::Active);
        lifecycle.shutdown().await;

        let bodies = sink.bodies();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["embeds"][0]["title"], "Server Online");
        assert_eq!(bodies[1]["embeds"][0]["title"], "Server Offline");
        assert_eq!(bodies[1]["embeds"][0]["fields"][1]["name"], "Uptime");
    }

    #[tokio::test]
    async fn failed_notifications_do_not_stop_startup() {
        let sink = spawn_sink(500).await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.webhooks.server_status.url = sink.url.clone();
        let path = write_config(&dir, &config);

        let lifecycle = Lifecycle::start(&path, Arc::new(MemoryBackend::default()), no_shop())
            .await
            .unwrap();
        assert_eq!(lifecycle.status(), ModuleStatus::Active);
        lifecycle.shutdown().await;
        assert_eq!(sink.bodies().len(), 2);
    }

    #[tokio::test]
    async fn disabled_config_sends_nothing() {
        let sink = spawn_sink(204).await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.enabled = false;
        config.webhooks.server_status.url = sink.url.clone();
        config.bot.enabled = true;
        config.bot.token = "token".to_owned();
        let path = write_config(&dir, &config);

        let lifecycle = Lifecycle::start(&path, Arc::new(MemoryBackend::default()), no_shop())
            .await
            .unwrap();
        assert_eq!(lifecycle.status(), ModuleStatus::DisabledByConfig);
        lifecycle.shutdown().await;
        assert!(sink.bodies().is_empty());
    }

    #[tokio::test]
    async fn broken_config_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let result = Lifecycle::start(&path, Arc::new(MemoryBackend::default()), no_shop()).await;
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[tokio::test]
    async fn missing_config_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let lifecycle = Lifecycle::start(&path, Arc::new(MemoryBackend::default()), no_shop())
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(lifecycle.context().config, Config::default());
        lifecycle.shutdown().await;
    }
}
