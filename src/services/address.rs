//! Candidate address generation.

/// Build the candidate mailbox address for `attempt`.
///
/// Attempt 0 yields `first.last@domain`; later attempts append the attempt
/// number directly to the last name (`first.last3@domain`). Names are
/// lowercased, nothing else is validated here.
pub fn generate_candidate(first_name: &str, last_name: &str, domain: &str, attempt: u32) -> String {
    let first = first_name.to_lowercase();
    let last = last_name.to_lowercase();
    if attempt == 0 {
        format!("{}.{}@{}", first, last, domain)
    } else {
        format!("{}.{}{}@{}", first, last, attempt, domain)
    }
}

/// Check that a name part only uses characters valid in a local-part.
///
/// Allows ASCII letters, digits, `.`, `-` and `_`.
pub fn is_valid_name_part(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}
