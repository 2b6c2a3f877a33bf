//! In-memory cache store for normalized schema snapshots.
//!
//! Holds one [`CacheEntry`] per configured source behind a `std::sync::RwLock`
//! so the manager and read handlers can share a single instance. The store
//! does no I/O and knows nothing about schema dialects; expiry is a fixed
//! 12-hour TTL checked against entry capture time.

use std::sync::RwLock;

use crate::models::CacheEntry;

/// Entry age beyond which a cached snapshot is considered stale, in
/// milliseconds (12 hours).
pub const CACHE_TTL_MS: i64 = 12 * 60 * 60 * 1000;

/// Shared in-memory store of cached schema snapshots.
pub struct SchemaCache {
    entries: RwLock<Vec<CacheEntry>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Current time in epoch milliseconds; entry timestamps use the same
    /// clock.
    pub fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Stores an entry, replacing any existing entry for the same source
    /// name. Repeated refreshes therefore never accumulate duplicates.
    pub fn put(&self, entry: CacheEntry) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|e| e.source.name != entry.source.name);
        entries.push(entry);
    }

    /// All entries, insertion order.
    pub fn all_entries(&self) -> Vec<CacheEntry> {
        self.entries.read().unwrap().clone()
    }

    /// The entry whose source name matches, if any.
    pub fn entry_for_source(&self, name: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .find(|e| e.source.name == name)
            .cloned()
    }

    /// Whether an entry has outlived the TTL.
    pub fn is_expired(&self, entry: &CacheEntry) -> bool {
        Self::now_ms() - entry.timestamp > CACHE_TTL_MS
    }

    /// Scans entries (optionally restricted to one source) for resources
    /// with the given name, returning a filtered view of each matching
    /// entry. The same resource name may match under several sources.
    pub fn find_resources_by_name(
        &self,
        resource_name: &str,
        source_name: Option<&str>,
    ) -> Vec<CacheEntry> {
        let entries = self.entries.read().unwrap();

        entries
            .iter()
            .filter(|e| source_name.map_or(true, |s| e.source.name == s))
            .filter_map(|e| {
                let matched: Vec<_> = e
                    .resources
                    .iter()
                    .filter(|r| r.name == resource_name)
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    None
                } else {
                    Some(CacheEntry {
                        name: e.name.clone(),
                        source: e.source.clone(),
                        resources: matched,
                        timestamp: e.timestamp,
                    })
                }
            })
            .collect()
    }

    /// Empties the store. Administrative operation, used by tests and the
    /// `clear` command.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}
