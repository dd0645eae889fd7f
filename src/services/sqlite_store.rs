//! src/services/sqlite_store.rs
//!
//! SqliteStore — tenant and mailbox persistence backed by SQLite. Implements
//! `MailboxStore` for the provisioning workflow and carries the plain CRUD
//! used by the admin handlers.

use crate::{
    models::{
        mailbox::{ForwardingRule, Mailbox, MailboxStatus},
        tenant::{PlanTier, Tenant, TenantStatus},
    },
    services::mailbox_store::{MailboxStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqlitePool, types::Json};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const MAILBOX_COLUMNS: &str =
    "id, address, owner_id, tenant_id, status, storage_used, forwarding_rules, created_at";
const TENANT_COLUMNS: &str = "id, name, domain, plan, max_mailboxes, status, created_at";

const DOMAIN_MAX_LEN: usize = 253;
const DOMAIN_LABEL_MAX_LEN: usize = 63;

/// Input for registering a tenant.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub domain: String,
    pub plan: PlanTier,
    pub max_mailboxes: Option<i64>,
}

#[derive(Clone)]
pub struct SqliteStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,

    /// Limit applied to tenants whose `max_mailboxes` is NULL.
    pub default_limit: i64,
}

impl SqliteStore {
    pub fn new(db: Arc<SqlitePool>, default_limit: i64) -> Self {
        Self { db, default_limit }
    }

    /// Validate a mail domain.
    ///
    /// - lowercase letters, digits, dots and hyphens
    /// - at least two labels, each 1–63 characters
    /// - labels cannot start or end with a hyphen
    fn ensure_domain_safe(&self, domain: &str) -> StoreResult<()> {
        let invalid = |reason: &str| StoreError::InvalidDomain {
            domain: domain.to_string(),
            reason: reason.to_string(),
        };

        if domain.is_empty() || domain.len() > DOMAIN_MAX_LEN {
            return Err(invalid("must be between 1 and 253 characters"));
        }
        if !domain
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            ));
        }

        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 {
            return Err(invalid("must contain at least one dot"));
        }
        for label in labels {
            if label.is_empty() || label.len() > DOMAIN_LABEL_MAX_LEN {
                return Err(invalid("each label must be between 1 and 63 characters"));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(invalid("labels cannot start or end with a hyphen"));
            }
        }
        Ok(())
    }

    /// Register a tenant. The quota defaults to the plan tier's limit.
    ///
    /// Returns DomainTaken if another tenant already owns the domain.
    pub async fn create_tenant(&self, input: NewTenant) -> StoreResult<Tenant> {
        let domain = input.domain.trim().to_ascii_lowercase();
        self.ensure_domain_safe(&domain)?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("tenant name must not be empty".into()));
        }
        if let Some(limit) = input.max_mailboxes {
            if limit < 0 {
                return Err(StoreError::InvalidInput(
                    "max mailboxes must not be negative".into(),
                ));
            }
        }

        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            domain,
            plan: input.plan,
            max_mailboxes: Some(
                input
                    .max_mailboxes
                    .unwrap_or_else(|| input.plan.default_mailbox_limit()),
            ),
            status: TenantStatus::Active,
            created_at: Utc::now(),
        };

        match sqlx::query(
            "INSERT INTO tenants (id, name, domain, plan, max_mailboxes, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.domain)
        .bind(tenant.plan)
        .bind(tenant.max_mailboxes)
        .bind(tenant.status)
        .bind(tenant.created_at)
        .execute(&*self.db)
        .await
        {
            Ok(_) => {
                tracing::info!(tenant_id = %tenant.id, domain = %tenant.domain, "tenant registered");
                Ok(tenant)
            }
            Err(err) if is_unique_violation(&err) => Err(StoreError::DomainTaken(tenant.domain)),
            Err(err) => Err(StoreError::Sqlx(err)),
        }
    }

    /// Fetch tenant metadata. Returns TenantNotFound if missing.
    pub async fn fetch_tenant(&self, tenant_id: Uuid) -> StoreResult<Tenant> {
        let sql = format!("SELECT {} FROM tenants WHERE id = ?", TENANT_COLUMNS);
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(tenant_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(StoreError::TenantNotFound(tenant_id))
    }

    pub async fn set_tenant_status(
        &self,
        tenant_id: Uuid,
        status: TenantStatus,
    ) -> StoreResult<Tenant> {
        let result = sqlx::query("UPDATE tenants SET status = ? WHERE id = ?")
            .bind(status)
            .bind(tenant_id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::TenantNotFound(tenant_id));
        }
        self.fetch_tenant(tenant_id).await
    }

    /// All mailboxes of a tenant, oldest first.
    pub async fn list_mailboxes(&self, tenant_id: Uuid) -> StoreResult<Vec<Mailbox>> {
        let sql = format!(
            "SELECT {} FROM mailboxes WHERE tenant_id = ? ORDER BY created_at ASC, address ASC",
            MAILBOX_COLUMNS
        );
        let rows = sqlx::query_as::<_, Mailbox>(&sql)
            .bind(tenant_id)
            .fetch_all(&*self.db)
            .await?;
        Ok(rows)
    }

    pub async fn fetch_mailbox(&self, mailbox_id: Uuid) -> StoreResult<Mailbox> {
        let sql = format!("SELECT {} FROM mailboxes WHERE id = ?", MAILBOX_COLUMNS);
        sqlx::query_as::<_, Mailbox>(&sql)
            .bind(mailbox_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(StoreError::MailboxNotFound(mailbox_id))
    }

    /// Activate or deactivate a mailbox.
    pub async fn set_mailbox_status(
        &self,
        mailbox_id: Uuid,
        status: MailboxStatus,
    ) -> StoreResult<Mailbox> {
        let result = sqlx::query("UPDATE mailboxes SET status = ? WHERE id = ?")
            .bind(status)
            .bind(mailbox_id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::MailboxNotFound(mailbox_id));
        }
        debug!("mailbox {} set to {:?}", mailbox_id, status);
        self.fetch_mailbox(mailbox_id).await
    }

    /// Replace the forwarding rules of a mailbox.
    ///
    /// Destinations must look like addresses and cannot point back at the
    /// mailbox itself.
    pub async fn set_forwarding_rules(
        &self,
        mailbox_id: Uuid,
        rules: Vec<ForwardingRule>,
    ) -> StoreResult<Mailbox> {
        let mailbox = self.fetch_mailbox(mailbox_id).await?;

        let mut normalized = Vec::with_capacity(rules.len());
        for rule in rules {
            let destination = rule.destination.trim().to_ascii_lowercase();
            let looks_like_address = destination
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
                .unwrap_or(false);
            if !looks_like_address {
                return Err(StoreError::InvalidInput(format!(
                    "forwarding destination `{}` is not an email address",
                    rule.destination
                )));
            }
            if destination == mailbox.address {
                return Err(StoreError::InvalidInput(
                    "a mailbox cannot forward to itself".into(),
                ));
            }
            normalized.push(ForwardingRule {
                destination,
                keep_copy: rule.keep_copy,
            });
        }

        sqlx::query("UPDATE mailboxes SET forwarding_rules = ? WHERE id = ?")
            .bind(Json(&normalized))
            .bind(mailbox_id)
            .execute(&*self.db)
            .await?;

        Ok(Mailbox {
            forwarding_rules: Json(normalized),
            ..mailbox
        })
    }
}

#[async_trait]
impl MailboxStore for SqliteStore {
    async fn count_mailboxes(&self, tenant_id: Uuid) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mailboxes WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&*self.db)
            .await?;
        Ok(count)
    }

    async fn find_mailbox_by_address(&self, address: &str) -> StoreResult<Option<Mailbox>> {
        let sql = format!("SELECT {} FROM mailboxes WHERE address = ?", MAILBOX_COLUMNS);
        let row = sqlx::query_as::<_, Mailbox>(&sql)
            .bind(address)
            .fetch_optional(&*self.db)
            .await?;
        Ok(row)
    }

    async fn find_mailbox_by_owner(&self, owner_id: &str) -> StoreResult<Option<Mailbox>> {
        let sql = format!(
            "SELECT {} FROM mailboxes WHERE owner_id = ? ORDER BY created_at ASC LIMIT 1",
            MAILBOX_COLUMNS
        );
        let row = sqlx::query_as::<_, Mailbox>(&sql)
            .bind(owner_id)
            .fetch_optional(&*self.db)
            .await?;
        Ok(row)
    }

    /// Insert guarded by the tenant quota in the same statement, so
    /// concurrent callers cannot push a tenant past its limit.
    async fn insert_mailbox(
        &self,
        address: &str,
        owner_id: &str,
        tenant_id: Uuid,
    ) -> StoreResult<Mailbox> {
        let sql = format!(
            "INSERT INTO mailboxes ({cols})
             SELECT ?, ?, ?, ?, 'active', 0, '[]', ?
             WHERE (SELECT COUNT(*) FROM mailboxes WHERE tenant_id = ?)
                 < (SELECT COALESCE(max_mailboxes, ?) FROM tenants WHERE id = ?)
             RETURNING {cols}",
            cols = MAILBOX_COLUMNS
        );

        let inserted = sqlx::query_as::<_, Mailbox>(&sql)
            .bind(Uuid::new_v4())
            .bind(address)
            .bind(owner_id)
            .bind(tenant_id)
            .bind(Utc::now())
            .bind(tenant_id)
            .bind(self.default_limit)
            .bind(tenant_id)
            .fetch_optional(&*self.db)
            .await;

        match inserted {
            Ok(Some(mailbox)) => {
                debug!("inserted mailbox {} for owner {}", mailbox.address, owner_id);
                Ok(mailbox)
            }
            Ok(None) => Err(StoreError::QuotaExhausted(tenant_id)),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::DuplicateAddress(address.to_string()))
            }
            Err(err) => Err(StoreError::Sqlx(err)),
        }
    }

    async fn tenant_mailbox_limit(&self, tenant_id: Uuid) -> StoreResult<i64> {
        let limit = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT max_mailboxes FROM tenants WHERE id = ?",
        )
        .bind(tenant_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(StoreError::TenantNotFound(tenant_id))?;

        Ok(limit.unwrap_or(self.default_limit))
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
