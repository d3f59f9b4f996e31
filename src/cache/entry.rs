//! Cache Entry Module
//!
//! Defines the structure for individual L1 entries with TTL support and
//! access bookkeeping used by eviction.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A single L1 entry: serialized value plus metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized value bytes (never compressed in L1)
    pub value: Vec<u8>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Number of reads plus the initial write
    pub access_count: u64,
    /// Store-wide sequence number of the most recent access
    pub last_access: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry.
    ///
    /// # Arguments
    /// * `value` - The serialized value to store
    /// * `ttl_seconds` - TTL in seconds, 0 means the entry never expires
    /// * `sequence` - Access sequence number assigned by the store
    pub fn new(value: Vec<u8>, ttl_seconds: u64, sequence: u64) -> Self {
        let now = current_timestamp_ms();
        let expires_at = (ttl_seconds > 0).then(|| now.saturating_add(ttl_seconds.saturating_mul(1000)));

        Self {
            value,
            created_at: now,
            expires_at,
            access_count: 1,
            last_access: sequence,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub(crate) fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Touch ==
    /// Records a read.
    pub fn touch(&mut self, sequence: u64) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_access = sequence;
    }

    // == Time To Live ==
    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()) / 1000)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new(b"test_value".to_vec(), 0, 1);

        assert_eq!(entry.value, b"test_value");
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
        assert_eq!(entry.access_count, 1);
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = CacheEntry::new(b"v".to_vec(), 60, 1);

        assert!(entry.expires_at.is_some());
        assert!(!entry.is_expired());
        let remaining = entry.ttl_remaining().unwrap();
        assert!((59..=60).contains(&remaining));
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(b"v".to_vec(), 1, 1);
        assert!(!entry.is_expired());

        sleep(Duration::from_millis(1100));

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Some(0));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new(b"v".to_vec(), u64::MAX / 100, 1);
        assert_eq!(entry.expires_at, Some(u64::MAX));
        assert!(!entry.is_expired());

        let entry = CacheEntry::new(b"v".to_vec(), u64::MAX, 1);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_touch_counts_accesses() {
        let mut entry = CacheEntry::new(b"v".to_vec(), 60, 1);
        entry.touch(7);
        entry.touch(9);

        assert_eq!(entry.access_count, 3);
        assert_eq!(entry.last_access, 9);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = CacheEntry {
            value: Vec::new(),
            created_at: now,
            expires_at: Some(now),
            access_count: 1,
            last_access: 0,
        };

        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
        assert!(!entry.is_expired_at(now - 1));
    }
}
