//! src/services/provisioning_service.rs
//!
//! Provisioner — creates mailboxes with generated unique addresses, either
//! one at a time or as a quota-gated batch with per-item outcomes.

use crate::{
    models::{
        mailbox::Mailbox,
        provisioning::{ProvisioningItem, ProvisioningResult},
    },
    services::{
        availability::{find_available_address, find_available_from},
        mailbox_store::{MailboxStore, StoreError},
        quota::{QuotaCheck, check_capacity},
    },
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEADLINE_EXCEEDED: &str = "batch deadline exceeded";

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error(
        "mailbox quota exceeded: requested {requested}, remaining {}, limit {}",
        .check.remaining,
        .check.limit
    )]
    QuotaExceeded { requested: usize, check: QuotaCheck },
    #[error("owner already has a mailbox")]
    OwnerAlreadyHasMailbox(String),
    #[error("no free address for {first_name}.{last_name} after {attempts} attempts")]
    GenerationExhausted {
        first_name: String,
        last_name: String,
        attempts: u32,
    },
    #[error("tenant `{0}` is suspended")]
    TenantSuspended(Uuid),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy)]
pub struct ProvisioningSettings {
    /// Candidate addresses probed per item before failing.
    pub max_address_attempts: u32,
    /// Upper bound for a whole batch call.
    pub batch_timeout: Duration,
}

#[derive(Clone)]
pub struct Provisioner {
    store: Arc<dyn MailboxStore>,
    settings: ProvisioningSettings,
}

impl Provisioner {
    pub fn new(store: Arc<dyn MailboxStore>, settings: ProvisioningSettings) -> Self {
        Self { store, settings }
    }

    /// Provision one mailbox per item, in order.
    ///
    /// - Rejects the whole batch up front if it does not fit the quota.
    /// - Skips owners that already have a mailbox.
    /// - Retries address generation when an insert loses a uniqueness race.
    /// - Records every other per-item error and moves on.
    ///
    /// Items run sequentially so a later item sees the addresses taken by
    /// earlier ones. When the batch deadline passes, the unfinished items are
    /// reported as failed and the accumulated result is returned.
    pub async fn provision_batch(
        &self,
        tenant_id: Uuid,
        domain: &str,
        items: Vec<ProvisioningItem>,
    ) -> Result<ProvisioningResult, ProvisioningError> {
        if items.is_empty() {
            return Err(ProvisioningError::InvalidRequest(
                "batch must contain at least one item".into(),
            ));
        }

        let requested = items.len();
        let check = check_capacity(&*self.store, tenant_id, requested).await?;
        if !check.allowed {
            warn!(
                "rejecting batch of {} for tenant {}: {} of {} mailboxes used",
                requested, tenant_id, check.current_count, check.limit
            );
            return Err(ProvisioningError::QuotaExceeded { requested, check });
        }

        let deadline = Instant::now() + self.settings.batch_timeout;
        let mut result = ProvisioningResult::with_capacity(requested);
        let mut pending = items.into_iter();

        while let Some(item) = pending.next() {
            let outcome = timeout_at(deadline, self.provision_item(tenant_id, domain, &item)).await;
            match outcome {
                Ok(Ok(mailbox)) => result.record_success(mailbox),
                Ok(Err(err)) => {
                    debug!("item for owner {} failed: {}", item.owner_id, err);
                    result.record_failure(item.owner_id, err.to_string());
                }
                Err(_) => {
                    warn!(
                        "batch for tenant {} hit its deadline with {} items left",
                        tenant_id,
                        pending.len() + 1
                    );
                    result.record_failure(item.owner_id, DEADLINE_EXCEEDED);
                    for rest in &mut pending {
                        result.record_failure(rest.owner_id, DEADLINE_EXCEEDED);
                    }
                    break;
                }
            }
        }

        info!(
            "batch for tenant {} finished: {} created, {} failed",
            tenant_id, result.summary.successful, result.summary.failed
        );
        Ok(result)
    }

    /// Create a single mailbox without the one-per-owner check.
    pub async fn create_mailbox(
        &self,
        tenant_id: Uuid,
        domain: &str,
        item: &ProvisioningItem,
    ) -> Result<Mailbox, ProvisioningError> {
        let mailbox = self.insert_with_unique_address(tenant_id, domain, item).await?;
        info!("created mailbox {} for owner {}", mailbox.address, mailbox.owner_id);
        Ok(mailbox)
    }

    /// Address the next mailbox for this name pair would get right now.
    /// Nothing is reserved.
    pub async fn suggest_address(
        &self,
        first_name: &str,
        last_name: &str,
        domain: &str,
    ) -> Result<String, ProvisioningError> {
        find_available_address(
            &*self.store,
            first_name,
            last_name,
            domain,
            self.settings.max_address_attempts,
        )
        .await
    }

    async fn provision_item(
        &self,
        tenant_id: Uuid,
        domain: &str,
        item: &ProvisioningItem,
    ) -> Result<Mailbox, ProvisioningError> {
        if self
            .store
            .find_mailbox_by_owner(&item.owner_id)
            .await?
            .is_some()
        {
            return Err(ProvisioningError::OwnerAlreadyHasMailbox(
                item.owner_id.clone(),
            ));
        }
        self.insert_with_unique_address(tenant_id, domain, item).await
    }

    async fn insert_with_unique_address(
        &self,
        tenant_id: Uuid,
        domain: &str,
        item: &ProvisioningItem,
    ) -> Result<Mailbox, ProvisioningError> {
        let mut start = 0;
        loop {
            let (attempt, address) = find_available_from(
                &*self.store,
                &item.first_name,
                &item.last_name,
                domain,
                start,
                self.settings.max_address_attempts,
            )
            .await?;

            match self
                .store
                .insert_mailbox(&address, &item.owner_id, tenant_id)
                .await
            {
                Ok(mailbox) => return Ok(mailbox),
                Err(StoreError::DuplicateAddress(taken)) => {
                    debug!("address {} was taken concurrently, retrying", taken);
                    start = attempt + 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool,
        models::tenant::PlanTier,
        services::{
            mailbox_store::StoreResult,
            sqlite_store::{NewTenant, SqliteStore},
        },
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DOMAIN: &str = "acme.example";

    fn settings() -> ProvisioningSettings {
        ProvisioningSettings {
            max_address_attempts: 1000,
            batch_timeout: Duration::from_secs(30),
        }
    }

    async fn setup(limit: i64) -> (SqliteStore, Uuid) {
        let store = SqliteStore::new(Arc::new(test_pool().await), 10);
        let tenant = store
            .create_tenant(NewTenant {
                name: "Acme".into(),
                domain: DOMAIN.into(),
                plan: PlanTier::Starter,
                max_mailboxes: Some(limit),
            })
            .await
            .unwrap();
        (store, tenant.id)
    }

    fn item(first: &str, last: &str, owner: &str) -> ProvisioningItem {
        ProvisioningItem {
            first_name: first.into(),
            last_name: last.into(),
            owner_id: owner.into(),
        }
    }

    async fn all_addresses(store: &SqliteStore, tenant_id: Uuid) -> Vec<String> {
        let mut addresses: Vec<String> = store
            .list_mailboxes(tenant_id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.address)
            .collect();
        addresses.sort();
        addresses
    }

    /// Pretends every address is free, so inserts hit the unique index.
    struct StaleLookupStore {
        inner: SqliteStore,
        duplicate_inserts: AtomicUsize,
    }

    #[async_trait]
    impl MailboxStore for StaleLookupStore {
        async fn count_mailboxes(&self, tenant_id: Uuid) -> StoreResult<i64> {
            self.inner.count_mailboxes(tenant_id).await
        }

        async fn find_mailbox_by_address(&self, _address: &str) -> StoreResult<Option<Mailbox>> {
            Ok(None)
        }

        async fn find_mailbox_by_owner(&self, owner_id: &str) -> StoreResult<Option<Mailbox>> {
            self.inner.find_mailbox_by_owner(owner_id).await
        }

        async fn insert_mailbox(
            &self,
            address: &str,
            owner_id: &str,
            tenant_id: Uuid,
        ) -> StoreResult<Mailbox> {
            let result = self.inner.insert_mailbox(address, owner_id, tenant_id).await;
            if matches!(result, Err(StoreError::DuplicateAddress(_))) {
                self.duplicate_inserts.fetch_add(1, Ordering::SeqCst);
            }
            result
        }

        async fn tenant_mailbox_limit(&self, tenant_id: Uuid) -> StoreResult<i64> {
            self.inner.tenant_mailbox_limit(tenant_id).await
        }
    }

    /// Reports an empty tenant, like a gate check that ran before a
    /// concurrent batch filled it.
    struct UndercountingStore {
        inner: SqliteStore,
    }

    #[async_trait]
    impl MailboxStore for UndercountingStore {
        async fn count_mailboxes(&self, _tenant_id: Uuid) -> StoreResult<i64> {
            Ok(0)
        }

        async fn find_mailbox_by_address(&self, address: &str) -> StoreResult<Option<Mailbox>> {
            self.inner.find_mailbox_by_address(address).await
        }

        async fn find_mailbox_by_owner(&self, owner_id: &str) -> StoreResult<Option<Mailbox>> {
            self.inner.find_mailbox_by_owner(owner_id).await
        }

        async fn insert_mailbox(
            &self,
            address: &str,
            owner_id: &str,
            tenant_id: Uuid,
        ) -> StoreResult<Mailbox> {
            self.inner.insert_mailbox(address, owner_id, tenant_id).await
        }

        async fn tenant_mailbox_limit(&self, tenant_id: Uuid) -> StoreResult<i64> {
            self.inner.tenant_mailbox_limit(tenant_id).await
        }
    }

    /// Lookups never return, to drive a batch into its deadline.
    struct HangingStore {
        inner: SqliteStore,
    }

    #[async_trait]
    impl MailboxStore for HangingStore {
        async fn count_mailboxes(&self, tenant_id: Uuid) -> StoreResult<i64> {
            self.inner.count_mailboxes(tenant_id).await
        }

        async fn find_mailbox_by_address(&self, _address: &str) -> StoreResult<Option<Mailbox>> {
            std::future::pending().await
        }

        async fn find_mailbox_by_owner(&self, owner_id: &str) -> StoreResult<Option<Mailbox>> {
            self.inner.find_mailbox_by_owner(owner_id).await
        }

        async fn insert_mailbox(
            &self,
            address: &str,
            owner_id: &str,
            tenant_id: Uuid,
        ) -> StoreResult<Mailbox> {
            self.inner.insert_mailbox(address, owner_id, tenant_id).await
        }

        async fn tenant_mailbox_limit(&self, tenant_id: Uuid) -> StoreResult<i64> {
            self.inner.tenant_mailbox_limit(tenant_id).await
        }
    }

    #[tokio::test]
    async fn batch_creates_all_items() {
        let (store, tenant_id) = setup(10).await;
        let provisioner = Provisioner::new(Arc::new(store.clone()), settings());

        let result = provisioner
            .provision_batch(
                tenant_id,
                DOMAIN,
                vec![item("Ada", "Lovelace", "u1"), item("Alan", "Turing", "u2")],
            )
            .await
            .unwrap();

        assert!(!result.has_failures());
        assert_eq!(result.summary.total, 2);
        assert_eq!(result.summary.successful, 2);
        assert_eq!(result.created[0].address, "ada.lovelace@acme.example");
        assert_eq!(result.created[1].address, "alan.turing@acme.example");
        assert_eq!(result.created[1].owner_id, "u2");
    }

    #[tokio::test]
    async fn owner_with_mailbox_is_reported_and_batch_continues() {
        let (store, tenant_id) = setup(10).await;
        store
            .insert_mailbox("existing@acme.example", "u2", tenant_id)
            .await
            .unwrap();
        let provisioner = Provisioner::new(Arc::new(store.clone()), settings());

        let result = provisioner
            .provision_batch(
                tenant_id,
                DOMAIN,
                vec![
                    item("a", "one", "u1"),
                    item("b", "two", "u2"),
                    item("c", "three", "u3"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(result.summary.successful, 2);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].owner_id, "u2");
        assert_eq!(result.errors[0].error, "owner already has a mailbox");
    }

    #[tokio::test]
    async fn identical_names_in_one_batch_get_distinct_addresses() {
        let (store, tenant_id) = setup(10).await;
        let provisioner = Provisioner::new(Arc::new(store.clone()), settings());

        let result = provisioner
            .provision_batch(
                tenant_id,
                DOMAIN,
                vec![item("John", "Smith", "u1"), item("john", "smith", "u2")],
            )
            .await
            .unwrap();

        assert_eq!(result.created[0].address, "john.smith@acme.example");
        assert_eq!(result.created[1].address, "john.smith1@acme.example");
    }

    #[tokio::test]
    async fn quota_rejection_writes_nothing() {
        let (store, tenant_id) = setup(3).await;
        store.insert_mailbox("x.y@acme.example", "u0", tenant_id).await.unwrap();
        let before = all_addresses(&store, tenant_id).await;
        let provisioner = Provisioner::new(Arc::new(store.clone()), settings());

        let err = provisioner
            .provision_batch(
                tenant_id,
                DOMAIN,
                vec![item("a", "a", "u1"), item("b", "b", "u2"), item("c", "c", "u3")],
            )
            .await
            .unwrap_err();

        match err {
            ProvisioningError::QuotaExceeded { requested, check } => {
                assert_eq!(requested, 3);
                assert_eq!(check.remaining, 2);
                assert_eq!(check.current_count, 1);
                assert_eq!(check.limit, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(all_addresses(&store, tenant_id).await, before);
    }

    #[tokio::test]
    async fn rerunning_a_batch_does_not_duplicate_successes() {
        let (store, tenant_id) = setup(10).await;
        store
            .insert_mailbox("taken@acme.example", "u2", tenant_id)
            .await
            .unwrap();
        let provisioner = Provisioner::new(Arc::new(store.clone()), settings());
        let batch = vec![item("a", "one", "u1"), item("b", "two", "u2")];

        let first = provisioner
            .provision_batch(tenant_id, DOMAIN, batch.clone())
            .await
            .unwrap();
        assert_eq!(first.summary.successful, 1);

        let second = provisioner
            .provision_batch(tenant_id, DOMAIN, batch)
            .await
            .unwrap();
        assert_eq!(second.summary.successful, 0);
        assert_eq!(second.summary.failed, 2);
        assert_eq!(store.count_mailboxes(tenant_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_batch_is_invalid() {
        let (store, tenant_id) = setup(10).await;
        let provisioner = Provisioner::new(Arc::new(store), settings());
        let err = provisioner
            .provision_batch(tenant_id, DOMAIN, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn lost_uniqueness_race_retries_with_next_suffix() {
        let (store, tenant_id) = setup(10).await;
        store
            .insert_mailbox("jane.doe@acme.example", "other-1", tenant_id)
            .await
            .unwrap();
        store
            .insert_mailbox("jane.doe1@acme.example", "other-2", tenant_id)
            .await
            .unwrap();

        let racing = Arc::new(StaleLookupStore {
            inner: store.clone(),
            duplicate_inserts: AtomicUsize::new(0),
        });
        let provisioner = Provisioner::new(racing.clone(), settings());

        let result = provisioner
            .provision_batch(tenant_id, DOMAIN, vec![item("Jane", "Doe", "u1")])
            .await
            .unwrap();

        assert!(!result.has_failures());
        assert_eq!(result.created[0].address, "jane.doe2@acme.example");
        assert_eq!(racing.duplicate_inserts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_become_item_failure() {
        let (store, tenant_id) = setup(10).await;
        store
            .insert_mailbox("jane.doe@acme.example", "other-1", tenant_id)
            .await
            .unwrap();
        let racing = Arc::new(StaleLookupStore {
            inner: store.clone(),
            duplicate_inserts: AtomicUsize::new(0),
        });
        let provisioner = Provisioner::new(
            racing,
            ProvisioningSettings {
                max_address_attempts: 1,
                ..settings()
            },
        );

        let result = provisioner
            .provision_batch(
                tenant_id,
                DOMAIN,
                vec![item("jane", "doe", "u1"), item("max", "mustermann", "u2")],
            )
            .await
            .unwrap();

        assert_eq!(result.summary.successful, 1);
        assert_eq!(result.errors[0].owner_id, "u1");
        assert!(result.errors[0].error.contains("after 1 attempts"));
    }

    #[tokio::test]
    async fn guarded_insert_failure_is_per_item() {
        let (store, tenant_id) = setup(2).await;
        store.insert_mailbox("p.q@acme.example", "w1", tenant_id).await.unwrap();
        store.insert_mailbox("r.s@acme.example", "w2", tenant_id).await.unwrap();

        // The gate sees an empty tenant, the insert guard sees the real count.
        let provisioner = Provisioner::new(
            Arc::new(UndercountingStore { inner: store.clone() }),
            settings(),
        );

        let result = provisioner
            .provision_batch(tenant_id, DOMAIN, vec![item("a", "b", "u1"), item("c", "d", "u2")])
            .await
            .unwrap();

        assert_eq!(result.summary.successful, 0);
        assert_eq!(result.summary.failed, 2);
        assert!(result.errors[0].error.contains("no mailbox capacity left"));
        assert_eq!(store.count_mailboxes(tenant_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn deadline_returns_partial_result() {
        let (store, tenant_id) = setup(10).await;
        let provisioner = Provisioner::new(
            Arc::new(HangingStore { inner: store }),
            ProvisioningSettings {
                batch_timeout: Duration::from_millis(50),
                ..settings()
            },
        );

        let result = provisioner
            .provision_batch(
                tenant_id,
                DOMAIN,
                vec![item("a", "b", "u1"), item("c", "d", "u2"), item("e", "f", "u3")],
            )
            .await
            .unwrap();

        assert_eq!(result.summary.total, 3);
        assert_eq!(result.summary.failed, 3);
        assert!(result.errors.iter().all(|e| e.error == DEADLINE_EXCEEDED));
        assert_eq!(result.errors[2].owner_id, "u3");
    }

    #[tokio::test]
    async fn single_creation_allows_second_mailbox_per_owner() {
        let (store, tenant_id) = setup(10).await;
        let provisioner = Provisioner::new(Arc::new(store.clone()), settings());

        let first = provisioner
            .create_mailbox(tenant_id, DOMAIN, &item("jane", "doe", "u1"))
            .await
            .unwrap();
        let second = provisioner
            .create_mailbox(tenant_id, DOMAIN, &item("jane", "doe", "u1"))
            .await
            .unwrap();

        assert_eq!(first.address, "jane.doe@acme.example");
        assert_eq!(second.address, "jane.doe1@acme.example");
    }

    #[tokio::test]
    async fn single_creation_respects_quota() {
        let (store, tenant_id) = setup(1).await;
        let provisioner = Provisioner::new(Arc::new(store.clone()), settings());

        provisioner
            .create_mailbox(tenant_id, DOMAIN, &item("a", "b", "u1"))
            .await
            .unwrap();
        let err = provisioner
            .create_mailbox(tenant_id, DOMAIN, &item("c", "d", "u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::Store(StoreError::QuotaExhausted(_))));
    }
}
