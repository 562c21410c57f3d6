use crate::error::KvError;
use crate::storage::types::Entry;

/// Namespace whose POSTs are rewritten to embed the client address.
pub const IP_SCOPE_PREFIX: &str = "ip/";

/// What the store should do with a write to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    /// The key does not exist yet; insertion is still subject to capacity.
    Insert,
    /// Overwrite the existing entry. `claim` means the supplied secret becomes
    /// the entry's permanent owner secret.
    Update { claim: bool },
    /// The key is owned and the supplied secret does not match.
    Deny,
}

pub fn authorize_write(existing: Option<&Entry>, supplied_secret: Option<&str>) -> WriteDecision {
    let Some(entry) = existing else {
        return WriteDecision::Insert;
    };

    match entry.owner_secret.as_deref() {
        None => WriteDecision::Update {
            claim: supplied_secret.is_some(),
        },
        Some(owner) if Some(owner) == supplied_secret => WriteDecision::Update { claim: false },
        Some(_) => WriteDecision::Deny,
    }
}

/// Treats an empty secret header the same as no header at all.
pub fn normalize_secret(secret: Option<&str>) -> Option<&str> {
    secret.filter(|s| !s.is_empty())
}

pub fn validate_key(key: &str, max_key_size: usize) -> Result<(), KvError> {
    if key.is_empty() {
        return Err(KvError::EmptyKey);
    }
    if key.len() > max_key_size {
        return Err(KvError::KeyTooLong);
    }
    Ok(())
}

/// `len(secret) <= max` and `len(body) <= max - len(secret)`.
pub fn check_sizes(
    body_len: usize,
    secret: Option<&str>,
    max_value_size: usize,
) -> Result<(), KvError> {
    let allowed = allowed_value_size(secret, max_value_size)?;
    if body_len > allowed {
        return Err(too_large(secret));
    }
    Ok(())
}

/// Bytes left for the value once the secret is counted against
/// `max_value_size`. Fails when the secret alone is over the limit.
pub fn allowed_value_size(secret: Option<&str>, max_value_size: usize) -> Result<usize, KvError> {
    max_value_size
        .checked_sub(secret.map_or(0, str::len))
        .ok_or_else(|| too_large(secret))
}

pub fn too_large(secret: Option<&str>) -> KvError {
    KvError::TooLarge {
        secret_supplied: secret.is_some(),
    }
}

/// `ip/<rest>` becomes `ip/<client_ip>/<rest>`. Keys outside the namespace,
/// and the bare `ip/` prefix itself, are returned unchanged.
pub fn rewrite_ip_scoped_key(raw_key: &str, client_ip: &str) -> String {
    match raw_key.strip_prefix(IP_SCOPE_PREFIX) {
        Some(rest) if !rest.is_empty() => format!("{}{}/{}", IP_SCOPE_PREFIX, client_ip, rest),
        _ => raw_key.to_string(),
    }
}

pub fn is_ip_scoped(key: &str) -> bool {
    key.starts_with(IP_SCOPE_PREFIX)
}
