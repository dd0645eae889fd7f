pub mod address;
pub mod availability;
pub mod mailbox_store;
pub mod provisioning_service;
pub mod quota;
pub mod sqlite_store;
