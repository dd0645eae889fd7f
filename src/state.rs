//! Shared state handed to every handler.

use std::sync::Arc;

use crate::services::{
    provisioning_service::{Provisioner, ProvisioningSettings},
    sqlite_store::SqliteStore,
};

#[derive(Clone)]
pub struct AppState {
    /// Tenant and mailbox CRUD.
    pub store: SqliteStore,
    /// Address generation and quota-gated creation on top of `store`.
    pub provisioner: Provisioner,
}

impl AppState {
    pub fn new(store: SqliteStore, settings: ProvisioningSettings) -> Self {
        let provisioner = Provisioner::new(Arc::new(store.clone()), settings);
        Self { store, provisioner }
    }
}
