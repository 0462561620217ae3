use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{data::AccountRecord, error::BackendError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateAccountResult {
    pub success: bool,
    pub account_id: Option<String>,
    pub message: Option<String>,
}

impl CreateAccountResult {
    pub fn created(&self) -> bool {
        self.success || self.account_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VbucksResult {
    pub success: bool,
    pub new_balance: Option<i64>,
    pub message: Option<String>,
}

/// Account storage owned by the game server.
///
/// `get_clients` followed by `save_clients` is not atomic: two commands that
/// rewrite the collection at the same time can lose one of the updates.
#[async_trait]
pub trait AccountBackend: Send + Sync {
    async fn create_account(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<CreateAccountResult, BackendError>;

    async fn get_clients(&self) -> Result<Vec<AccountRecord>, BackendError>;

    async fn save_clients(&self, clients: &[AccountRecord]) -> Result<(), BackendError>;

    async fn add_vbucks(&self, account_id: &str, amount: i64) -> Result<VbucksResult, BackendError>;
}

/// Published once per completed shop rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationCompleted;

#[async_trait]
pub trait ShopSource: Send + Sync {
    /// Raw shop document, `None` if the shop has not been generated yet.
    async fn get_shop_data(&self) -> Result<Option<Value>, BackendError>;

    fn subscribe_rotations(&self) -> broadcast::Receiver<RotationCompleted>;
}
