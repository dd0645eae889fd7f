//! The storage seam used by address lookup, the quota gate and the bulk
//! provisioner. `SqliteStore` is the production implementation.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::mailbox::Mailbox;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("address `{0}` is already taken")]
    DuplicateAddress(String),
    #[error("tenant `{0}` has no mailbox capacity left")]
    QuotaExhausted(Uuid),
    #[error("tenant `{0}` not found")]
    TenantNotFound(Uuid),
    #[error("mailbox `{0}` not found")]
    MailboxNotFound(Uuid),
    #[error("domain `{0}` is already registered")]
    DomainTaken(String),
    #[error("domain `{domain}` invalid: {reason}")]
    InvalidDomain { domain: String, reason: String },
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations the provisioning workflow needs from persistent storage.
#[async_trait]
pub trait MailboxStore: Send + Sync {
    /// Number of mailboxes currently owned by the tenant.
    async fn count_mailboxes(&self, tenant_id: Uuid) -> StoreResult<i64>;

    async fn find_mailbox_by_address(&self, address: &str) -> StoreResult<Option<Mailbox>>;

    /// Any mailbox owned by `owner_id`, across all tenants.
    async fn find_mailbox_by_owner(&self, owner_id: &str) -> StoreResult<Option<Mailbox>>;

    /// Create an active, empty mailbox.
    ///
    /// Must fail with `DuplicateAddress` when the address was taken in the
    /// meantime, and with `QuotaExhausted` when the tenant is already full.
    async fn insert_mailbox(
        &self,
        address: &str,
        owner_id: &str,
        tenant_id: Uuid,
    ) -> StoreResult<Mailbox>;

    /// Configured mailbox limit, or the service default when unset.
    async fn tenant_mailbox_limit(&self, tenant_id: Uuid) -> StoreResult<i64>;
}
