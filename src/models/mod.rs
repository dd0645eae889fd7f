//! Core data models for the mailbox provisioning service.
//!
//! These entities represent tenants, their mailboxes and the transient
//! shapes of a bulk provisioning call. Persistent ones map to database
//! tables via `sqlx::FromRow` and serialize as JSON via `serde`.

pub mod mailbox;
pub mod provisioning;
pub mod tenant;
