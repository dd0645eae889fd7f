//! Transient request/result shapes of a bulk provisioning call.
//! None of these are persisted.

use serde::{Deserialize, Serialize};

use crate::models::mailbox::Mailbox;

/// One requested mailbox within a batch.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningItem {
    pub first_name: String,
    pub last_name: String,
    pub owner_id: String,
}

/// Why a single batch item did not produce a mailbox.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub owner_id: String,
    pub error: String,
}

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Outcome of a batch that passed the quota gate.
///
/// Successes already recorded are never rolled back when later items fail.
#[derive(Serialize, Clone, Debug, Default)]
pub struct ProvisioningResult {
    pub created: Vec<Mailbox>,
    pub errors: Vec<ItemFailure>,
    pub summary: BatchSummary,
}

impl ProvisioningResult {
    pub fn with_capacity(total: usize) -> Self {
        Self {
            created: Vec::with_capacity(total),
            errors: Vec::new(),
            summary: BatchSummary {
                total,
                ..BatchSummary::default()
            },
        }
    }

    pub fn record_success(&mut self, mailbox: Mailbox) {
        self.created.push(mailbox);
        self.summary.successful += 1;
    }

    pub fn record_failure(&mut self, owner_id: impl Into<String>, error: impl Into<String>) {
        self.errors.push(ItemFailure {
            owner_id: owner_id.into(),
            error: error.into(),
        });
        self.summary.failed += 1;
    }

    /// True when at least one item failed, i.e. the outcome is mixed or empty.
    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
    }
}
