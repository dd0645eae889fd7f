use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::fmt;

use crate::services::{mailbox_store::StoreError, provisioning_service::ProvisioningError};

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    /// Extra structured context rendered under `details`.
    pub details: Option<Value>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "status": self.status.as_u16()
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::TenantNotFound(_) | StoreError::MailboxNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            StoreError::DuplicateAddress(_) | StoreError::DomainTaken(_) => StatusCode::CONFLICT,
            StoreError::QuotaExhausted(_) => StatusCode::FORBIDDEN,
            StoreError::InvalidDomain { .. } | StoreError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            StoreError::Sqlx(inner) => {
                tracing::error!("database error: {}", inner);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError::new(status, err.to_string())
    }
}

impl From<ProvisioningError> for AppError {
    fn from(err: ProvisioningError) -> Self {
        match err {
            ProvisioningError::QuotaExceeded { requested, check } => AppError::new(
                StatusCode::FORBIDDEN,
                "mailbox quota exceeded",
            )
            .with_details(json!({
                "requested": requested,
                "remaining": check.remaining,
                "current": check.current_count,
                "limit": check.limit,
            })),
            ProvisioningError::TenantSuspended(_) => {
                AppError::new(StatusCode::FORBIDDEN, err.to_string())
            }
            ProvisioningError::OwnerAlreadyHasMailbox(_) => {
                AppError::new(StatusCode::CONFLICT, err.to_string())
            }
            ProvisioningError::GenerationExhausted { .. } => {
                AppError::new(StatusCode::CONFLICT, err.to_string())
            }
            ProvisioningError::InvalidRequest(_) => AppError::bad_request(err.to_string()),
            ProvisioningError::Store(inner) => inner.into(),
        }
    }
}
