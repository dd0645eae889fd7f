//! Whole-batch admission against a tenant's mailbox limit.

use serde::Serialize;
use uuid::Uuid;

use crate::services::mailbox_store::{MailboxStore, StoreResult};

/// Snapshot of a tenant's capacity at the time of the check.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCheck {
    pub allowed: bool,
    /// `limit - current_count`; zero or negative once the tenant is full.
    pub remaining: i64,
    pub current_count: i64,
    pub limit: i64,
}

/// Decide whether `requested` more mailboxes fit into the tenant's quota.
///
/// Reads the limit and the current count once; nothing is reserved.
pub async fn check_capacity(
    store: &dyn MailboxStore,
    tenant_id: Uuid,
    requested: usize,
) -> StoreResult<QuotaCheck> {
    let limit = store.tenant_mailbox_limit(tenant_id).await?;
    let current_count = store.count_mailboxes(tenant_id).await?;
    let remaining = limit - current_count;
    let requested = i64::try_from(requested).unwrap_or(i64::MAX);

    Ok(QuotaCheck {
        allowed: requested <= remaining,
        remaining,
        current_count,
        limit,
    })
}
