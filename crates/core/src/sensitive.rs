//! Sensitive-key filtering for anything that leaves the process.

use crate::error::Details;

/// Key fragments that mark a value as unsafe for external serialization.
pub const SENSITIVE_PATTERNS: [&str; 9] = [
    "password",
    "token",
    "secret",
    "key",
    "credential",
    "authorization",
    "session",
    "cookie",
    "private",
];

/// Case-insensitive substring match against [`SENSITIVE_PATTERNS`].
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| key.contains(p))
}

/// Copy of `details` without sensitive entries. Order is preserved.
pub fn filter_details(details: &Details) -> Details {
    details
        .iter()
        .filter(|(k, _)| !is_sensitive_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
