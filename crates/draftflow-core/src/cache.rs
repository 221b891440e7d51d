//! Time-bounded cache of metadata records.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use moka::sync::Cache;

use crate::branch_name::ContentKey;
use crate::metadata::MetadataRecord;

/// Default lifetime of a cached record.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

const MAX_ENTRIES: u64 = 1_000;

/// A cached record and when it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: ContentKey,
    pub expires_at: DateTime<Utc>,
    pub record: MetadataRecord,
}

/// Cache of metadata records keyed by content key.
///
/// Entries are a hint only; a miss always falls back to the host. Records
/// are replaced wholesale, never merged.
#[derive(Clone)]
pub struct MetadataCache {
    entries: Cache<ContentKey, CacheEntry>,
    ttl: Duration,
}

impl MetadataCache {
    /// Create a cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
            ttl,
        }
    }

    /// Get the record for `key` if it has not expired.
    #[must_use]
    pub fn get(&self, key: &ContentKey) -> Option<MetadataRecord> {
        let entry = self.entries.get(key)?;
        if entry.expires_at > Utc::now() {
            Some(entry.record)
        } else {
            self.entries.invalidate(key);
            None
        }
    }

    /// Insert or refresh the record for `key`.
    pub fn insert(&self, key: &ContentKey, record: MetadataRecord) {
        let expires_at = TimeDelta::from_std(self.ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.entries.insert(
            key.clone(),
            CacheEntry {
                key: key.clone(),
                expires_at,
                record,
            },
        );
    }

    /// Drop the record for `key`.
    pub fn invalidate(&self, key: &ContentKey) {
        self.entries.invalidate(key);
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
