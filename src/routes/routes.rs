//! Defines routes for tenant and mailbox operations.
//!
//! ## Structure
//! - **Tenant endpoints**
//!   - `POST  /tenants` — register tenant
//!   - `GET   /tenants/{tenant_id}` — fetch tenant
//!   - `PATCH /tenants/{tenant_id}/status` — suspend / reactivate
//!   - `GET   /tenants/{tenant_id}/quota` — mailbox usage vs. limit
//!
//! - **Mailbox endpoints**
//!   - `GET   /tenants/{tenant_id}/mailboxes` — list mailboxes
//!   - `POST  /tenants/{tenant_id}/mailboxes` — create one mailbox
//!   - `POST  /tenants/{tenant_id}/mailboxes/bulk` — batch provisioning
//!   - `GET   /tenants/{tenant_id}/mailboxes/suggest` — preview next free address
//!   - `PATCH /mailboxes/{mailbox_id}/status` — activate / deactivate
//!   - `PUT   /mailboxes/{mailbox_id}/forwarding` — replace forwarding rules

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        mailbox_handlers::{
            create_mailbox, list_mailboxes, provision_mailboxes, set_forwarding_rules,
            set_mailbox_status, suggest_address,
        },
        tenant_handlers::{create_tenant, get_quota, get_tenant, set_tenant_status},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, patch, post, put},
};

/// Build and return the router for all API routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Tenant routes
        .route("/tenants", post(create_tenant))
        .route("/tenants/{tenant_id}", get(get_tenant))
        .route("/tenants/{tenant_id}/status", patch(set_tenant_status))
        .route("/tenants/{tenant_id}/quota", get(get_quota))
        // Mailbox routes
        .route(
            "/tenants/{tenant_id}/mailboxes",
            get(list_mailboxes).post(create_mailbox),
        )
        .route("/tenants/{tenant_id}/mailboxes/bulk", post(provision_mailboxes))
        .route("/tenants/{tenant_id}/mailboxes/suggest", get(suggest_address))
        .route("/mailboxes/{mailbox_id}/status", patch(set_mailbox_status))
        .route("/mailboxes/{mailbox_id}/forwarding", put(set_forwarding_rules))
}
