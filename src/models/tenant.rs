//! Represents a tenant — a customer organization owning one mail domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Subscription plan of a tenant. Each tier carries a default mailbox quota.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Starter,
    Business,
    Enterprise,
}

impl PlanTier {
    /// Mailbox quota granted by the tier when no override is given.
    pub fn default_mailbox_limit(self) -> i64 {
        match self {
            PlanTier::Starter => 10,
            PlanTier::Business => 50,
            PlanTier::Enterprise => 500,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
}

/// A tenant (company) of the hosting platform.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Unique identifier for this tenant.
    pub id: Uuid,

    /// Display name of the organization.
    pub name: String,

    /// Mail domain, lowercase and unique across the system.
    pub domain: String,

    pub plan: PlanTier,

    /// Mailbox quota. `None` falls back to the service-wide default.
    pub max_mailboxes: Option<i64>,

    pub status: TenantStatus,

    /// When this tenant was registered.
    pub created_at: DateTime<Utc>,
}
