//! Cache key hashing.

use sha2::{Digest, Sha256};

/// Hash a lookup key into the fixed-width identifier the SQLite store uses
/// as its primary key.
pub fn compute_cache_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"dblookup\n");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        assert_eq!(compute_cache_key("SELECT 1"), compute_cache_key("SELECT 1"));
    }

    #[test]
    fn test_hash_distinguishes_keys() {
        assert_ne!(compute_cache_key("SELECT 1"), compute_cache_key("SELECT 2"));
        assert_ne!(compute_cache_key(""), compute_cache_key(" "));
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("SELECT * FROM users");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
