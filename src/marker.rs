//! Correlation markers for locating a sideloaded attachment.
//!
//! The marker is written into the attachment's title at import time and
//! searched for right afterwards. Uniqueness is probabilistic.

use rand::Rng;
use sha2::{Digest, Sha256};

const MARKER_PREFIX: &str = "attachment-hash";

/// Generate a fresh marker for an image import.
pub fn correlation_marker(url: &str, description: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let salt: u32 = rand::thread_rng().gen_range(1..=999);
    marker_from_parts(url, description, now, salt)
}

fn marker_from_parts(url: &str, description: &str, timestamp: i64, salt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(MARKER_PREFIX.as_bytes());
    hasher.update(url.as_bytes());
    hasher.update(description.as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(salt.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_is_hex_sha256() {
        let m = correlation_marker("https://example.com/a.jpg", "desc");
        assert_eq!(m.len(), 64);
        assert!(m.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_marker_deterministic_for_same_parts() {
        let a = marker_from_parts("u", "d", 100, 7);
        let b = marker_from_parts("u", "d", 100, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_marker_changes_with_salt() {
        let a = marker_from_parts("u", "d", 100, 7);
        let b = marker_from_parts("u", "d", 100, 8);
        assert_ne!(a, b);
    }
}
