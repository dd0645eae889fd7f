pub mod health_handlers;
pub mod mailbox_handlers;
pub mod tenant_handlers;
