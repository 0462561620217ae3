use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info};

use crate::{
    backend::{AccountBackend, CreateAccountResult, RotationCompleted, ShopSource, VbucksResult},
    config::to_pretty_json,
    data::{AccountRecord, DEFAULT_ROLE},
    error::BackendError,
};

/// Account collection kept as a JSON array in a single file, the layout
/// the game server writes.
pub struct JsonAccountStore {
    path: PathBuf,
}

impl JsonAccountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn stored(&self) -> Result<Vec<Value>, BackendError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn rejected(message: &str) -> CreateAccountResult {
        CreateAccountResult {
            success: false,
            account_id: None,
            message: Some(message.to_owned()),
        }
    }
}

#[async_trait]
impl AccountBackend for JsonAccountStore {
    async fn create_account(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<CreateAccountResult, BackendError> {
        if email.trim().is_empty() || username.trim().is_empty() || password.is_empty() {
            return Ok(Self::rejected("Email, username and password are required"));
        }

        let mut clients = self.get_clients().await?;
        let email_taken = clients
            .iter()
            .any(|c| c.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)));
        if email_taken {
            return Ok(Self::rejected("Email already in use"));
        }
        if clients.iter().any(|c| c.matches_name(username)) {
            return Ok(Self::rejected("Username already taken"));
        }

        let password = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?
            .map_err(|e| BackendError::Other(e.to_string()))?;

        let account_id = uuid::Uuid::new_v4().simple().to_string();
        let mut extra = Map::new();
        extra.insert("password".to_owned(), Value::String(hash));
        clients.push(AccountRecord {
            account_id: account_id.clone(),
            display_name: Some(username.to_owned()),
            email: Some(email.to_owned()),
            role: Some(DEFAULT_ROLE.to_owned()),
            created_at: Some(Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))),
            vbucks: Some(0),
            ban: None,
            extra,
        });
        self.save_clients(&clients).await?;

        info!("Account {} created for {}", account_id, username);
        Ok(CreateAccountResult {
            success: true,
            account_id: Some(account_id),
            message: None,
        })
    }

    async fn get_clients(&self) -> Result<Vec<AccountRecord>, BackendError> {
        self.stored()
            .await?
            .into_iter()
            .map(|raw| serde_json::from_value(raw).map_err(BackendError::from))
            .collect()
    }

    /// Records equal to what is already stored at the same position are
    /// written back exactly as they were read.
    async fn save_clients(&self, clients: &[AccountRecord]) -> Result<(), BackendError> {
        let stored = self.stored().await?;
        let merged = clients
            .iter()
            .enumerate()
            .map(|(i, record)| match stored.get(i) {
                Some(raw) if serde_json::from_value::<AccountRecord>(raw.clone()).is_ok_and(|r| r == *record) => {
                    Ok(raw.clone())
                }
                _ => serde_json::to_value(record),
            })
            .collect::<Result<Vec<_>, _>>()?;
        tokio::fs::write(&self.path, to_pretty_json(&merged)?).await?;
        Ok(())
    }

    async fn add_vbucks(&self, account_id: &str, amount: i64) -> Result<VbucksResult, BackendError> {
        let failed = |message: &str| VbucksResult {
            success: false,
            new_balance: None,
            message: Some(message.to_owned()),
        };
        if amount < 0 {
            return Ok(failed("Amount must not be negative"));
        }

        let mut clients = self.get_clients().await?;
        let Some(account) = clients.iter_mut().find(|c| c.account_id == account_id) else {
            return Ok(failed("Account not found"));
        };
        let Some(balance) = account.balance().checked_add(amount) else {
            return Ok(failed("Balance would overflow"));
        };
        account.vbucks = Some(balance);
        self.save_clients(&clients).await?;

        Ok(VbucksResult {
            success: true,
            new_balance: Some(balance),
            message: None,
        })
    }
}

/// Shop document read from a JSON file. A change of the file's modification
/// time counts as a completed rotation.
pub struct JsonShopSource {
    path: PathBuf,
    rotations: broadcast::Sender<RotationCompleted>,
}

impl JsonShopSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (rotations, _) = broadcast::channel(16);
        Self {
            path: path.into(),
            rotations,
        }
    }

    async fn modified(&self) -> Option<SystemTime> {
        tokio::fs::metadata(&self.path).await.ok()?.modified().ok()
    }

    /// Checks the file every `every` and publishes one event per change.
    pub fn watch(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let source = self.clone();
        tokio::spawn(async move {
            let mut last = source.modified().await;
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let current = source.modified().await;
                if current.is_some() && current != last {
                    last = current;
                    debug!("Shop file {} changed", source.path.display());
                    // no subscribers is fine
                    let _ = source.rotations.send(RotationCompleted);
                }
            }
        })
    }
}

#[async_trait]
impl ShopSource for JsonShopSource {
    async fn get_shop_data(&self) -> Result<Option<Value>, BackendError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn subscribe_rotations(&self) -> broadcast::Receiver<RotationCompleted> {
        self.rotations.subscribe()
    }
}
