//! HTTP handlers for mailbox creation and administration.
//! Address generation and quota checks are delegated to `Provisioner`,
//! plain reads and updates go straight to `SqliteStore`.

use crate::{
    errors::AppError,
    models::{
        mailbox::{ForwardingRule, Mailbox, MailboxStatus},
        provisioning::ProvisioningItem,
        tenant::{Tenant, TenantStatus},
    },
    services::{address::is_valid_name_part, provisioning_service::ProvisioningError},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for `POST /tenants/{tenant_id}/mailboxes/bulk`.
#[derive(Debug, Deserialize)]
pub struct BulkProvisionReq {
    /// Must match the tenant's domain when given.
    pub domain: Option<String>,
    pub items: Vec<ProvisioningItem>,
}

/// Query params for `GET /tenants/{tenant_id}/mailboxes/suggest`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestQuery {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestedAddress {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct MailboxStatusReq {
    pub status: MailboxStatus,
}

#[derive(Debug, Deserialize)]
pub struct ForwardingReq {
    pub rules: Vec<ForwardingRule>,
}

/// GET `/tenants/{tenant_id}/mailboxes`
pub async fn list_mailboxes(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<Mailbox>>, AppError> {
    state.store.fetch_tenant(tenant_id).await?;
    Ok(Json(state.store.list_mailboxes(tenant_id).await?))
}

/// GET `/tenants/{tenant_id}/mailboxes/suggest?firstName=&lastName=`
///
/// Preview of the address a new mailbox would receive. Not reserved.
pub async fn suggest_address(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(q): Query<SuggestQuery>,
) -> Result<Json<SuggestedAddress>, AppError> {
    if !is_valid_name_part(&q.first_name) || !is_valid_name_part(&q.last_name) {
        return Err(AppError::bad_request(
            "names may only contain letters, digits, `.`, `-` and `_`",
        ));
    }
    let tenant = state.store.fetch_tenant(tenant_id).await?;
    let address = state
        .provisioner
        .suggest_address(&q.first_name, &q.last_name, &tenant.domain)
        .await?;
    Ok(Json(SuggestedAddress { address }))
}

/// POST `/tenants/{tenant_id}/mailboxes` — create one mailbox.
///
/// Unlike the bulk path, an owner may receive several mailboxes here.
pub async fn create_mailbox(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(item): Json<ProvisioningItem>,
) -> Result<impl IntoResponse, AppError> {
    validate_item(&item).map_err(AppError::bad_request)?;
    let tenant = active_tenant(&state, tenant_id).await?;

    let mailbox = state
        .provisioner
        .create_mailbox(tenant.id, &tenant.domain, &item)
        .await?;
    Ok((StatusCode::CREATED, Json(mailbox)))
}

/// POST `/tenants/{tenant_id}/mailboxes/bulk` — provision a batch.
///
/// 201 when every item succeeded, 207 when some failed, 403 when the
/// batch does not fit the tenant's quota (nothing is created then).
pub async fn provision_mailboxes(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<BulkProvisionReq>,
) -> Result<impl IntoResponse, AppError> {
    if payload.items.is_empty() {
        return Err(AppError::bad_request("items must not be empty"));
    }
    for (index, item) in payload.items.iter().enumerate() {
        validate_item(item)
            .map_err(|reason| AppError::bad_request(format!("item {}: {}", index, reason)))?;
    }

    let tenant = active_tenant(&state, tenant_id).await?;
    if let Some(domain) = payload.domain.as_deref() {
        if !domain.trim().eq_ignore_ascii_case(&tenant.domain) {
            return Err(AppError::bad_request(format!(
                "domain `{}` does not belong to tenant {}",
                domain, tenant.id
            )));
        }
    }

    let result = state
        .provisioner
        .provision_batch(tenant.id, &tenant.domain, payload.items)
        .await?;

    let status = if result.has_failures() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(result)))
}

/// PATCH `/mailboxes/{mailbox_id}/status`
pub async fn set_mailbox_status(
    State(state): State<AppState>,
    Path(mailbox_id): Path<Uuid>,
    Json(payload): Json<MailboxStatusReq>,
) -> Result<Json<Mailbox>, AppError> {
    Ok(Json(
        state
            .store
            .set_mailbox_status(mailbox_id, payload.status)
            .await?,
    ))
}

/// PUT `/mailboxes/{mailbox_id}/forwarding` — replace all forwarding rules.
pub async fn set_forwarding_rules(
    State(state): State<AppState>,
    Path(mailbox_id): Path<Uuid>,
    Json(payload): Json<ForwardingReq>,
) -> Result<Json<Mailbox>, AppError> {
    Ok(Json(
        state
            .store
            .set_forwarding_rules(mailbox_id, payload.rules)
            .await?,
    ))
}

async fn active_tenant(state: &AppState, tenant_id: Uuid) -> Result<Tenant, AppError> {
    let tenant = state.store.fetch_tenant(tenant_id).await?;
    if tenant.status == TenantStatus::Suspended {
        return Err(ProvisioningError::TenantSuspended(tenant.id).into());
    }
    Ok(tenant)
}

fn validate_item(item: &ProvisioningItem) -> Result<(), String> {
    if !is_valid_name_part(&item.first_name) {
        return Err(format!("invalid first name `{}`", item.first_name));
    }
    if !is_valid_name_part(&item.last_name) {
        return Err(format!("invalid last name `{}`", item.last_name));
    }
    if item.owner_id.trim().is_empty() {
        return Err("owner id must not be empty".into());
    }
    Ok(())
}
