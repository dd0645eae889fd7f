//! Represents a mailbox (email account) hosted for a tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MailboxStatus {
    Active,
    Inactive,
}

/// Forward incoming mail for a mailbox to another address.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingRule {
    /// Address that receives the forwarded copy.
    pub destination: String,

    /// Whether the original mailbox keeps its own copy.
    #[serde(default = "default_keep_copy")]
    pub keep_copy: bool,
}

fn default_keep_copy() -> bool {
    true
}

/// A single hosted email address and its metadata.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Full address (`local@domain`), globally unique.
    pub address: String,

    /// Identifier of the owning user. Not validated against any user table.
    pub owner_id: String,

    /// Tenant this mailbox belongs to.
    pub tenant_id: Uuid,

    pub status: MailboxStatus,

    /// Bytes currently stored.
    pub storage_used: i64,

    pub forwarding_rules: Json<Vec<ForwardingRule>>,

    pub created_at: DateTime<Utc>,
}
