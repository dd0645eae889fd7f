//! HTTP handlers for tenant registration and quota status.

use crate::{
    errors::AppError,
    models::tenant::{PlanTier, Tenant, TenantStatus},
    services::{quota::check_capacity, sqlite_store::NewTenant},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for `POST /tenants`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantReq {
    pub name: String,
    pub domain: String,
    pub plan: PlanTier,
    /// Overrides the plan tier's mailbox limit.
    pub max_mailboxes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TenantStatusReq {
    pub status: TenantStatus,
}

#[derive(Debug, Serialize)]
pub struct QuotaStatus {
    pub limit: i64,
    pub current: i64,
    pub remaining: i64,
}

/// POST `/tenants` — register a tenant and its domain.
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(payload): Json<CreateTenantReq>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = state
        .store
        .create_tenant(NewTenant {
            name: payload.name,
            domain: payload.domain,
            plan: payload.plan,
            max_mailboxes: payload.max_mailboxes,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

/// GET `/tenants/{tenant_id}`
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Tenant>, AppError> {
    Ok(Json(state.store.fetch_tenant(tenant_id).await?))
}

/// PATCH `/tenants/{tenant_id}/status` — suspend or reactivate a tenant.
pub async fn set_tenant_status(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<TenantStatusReq>,
) -> Result<Json<Tenant>, AppError> {
    let tenant = state
        .store
        .set_tenant_status(tenant_id, payload.status)
        .await?;
    tracing::info!("tenant {} is now {:?}", tenant.id, tenant.status);
    Ok(Json(tenant))
}

/// GET `/tenants/{tenant_id}/quota` — current usage against the mailbox limit.
pub async fn get_quota(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<QuotaStatus>, AppError> {
    let check = check_capacity(&state.store, tenant_id, 0).await?;
    Ok(Json(QuotaStatus {
        limit: check.limit,
        current: check.current_count,
        remaining: check.remaining,
    }))
}
