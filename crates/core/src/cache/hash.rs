//! Cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a preview of `url` fetched as `user_agent`.
///
/// The user agent is part of the key because sites vary their `<head>` by
/// client.
pub fn compute_cache_key(url: &str, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(user_agent.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `hash` has the shape of a key produced by [`compute_cache_key`].
pub fn is_valid_key(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
