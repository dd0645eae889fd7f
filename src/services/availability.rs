//! Finds the first free address for a name pair by probing the store.

use tracing::debug;

use crate::services::{
    address::generate_candidate,
    mailbox_store::MailboxStore,
    provisioning_service::ProvisioningError,
};

/// Return the first candidate address not present in the store.
///
/// Probes attempts `0..max_attempts` in order, one lookup each.
pub async fn find_available_address(
    store: &dyn MailboxStore,
    first_name: &str,
    last_name: &str,
    domain: &str,
    max_attempts: u32,
) -> Result<String, ProvisioningError> {
    let (_, address) =
        find_available_from(store, first_name, last_name, domain, 0, max_attempts).await?;
    Ok(address)
}

/// Like `find_available_address`, but resumes at `start` and also returns
/// the attempt number of the free candidate.
///
/// The lookup is only a fast path: the address can still be taken before
/// it is inserted, in which case callers resume at `attempt + 1`.
pub async fn find_available_from(
    store: &dyn MailboxStore,
    first_name: &str,
    last_name: &str,
    domain: &str,
    start: u32,
    max_attempts: u32,
) -> Result<(u32, String), ProvisioningError> {
    for attempt in start..max_attempts {
        let candidate = generate_candidate(first_name, last_name, domain, attempt);
        if store.find_mailbox_by_address(&candidate).await?.is_none() {
            return Ok((attempt, candidate));
        }
        debug!("address {} taken, trying next suffix", candidate);
    }

    Err(ProvisioningError::GenerationExhausted {
        first_name: first_name.to_lowercase(),
        last_name: last_name.to_lowercase(),
        attempts: max_attempts,
    })
}
