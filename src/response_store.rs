use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const DEFAULT_TTL_SECS: u64 = 300;
pub const DEFAULT_MAX_ITEMS: usize = 100;
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

static DOWNLOAD_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn generate_id() -> String {
    let counter = DOWNLOAD_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut raw = [0u8; 16];
    raw[..8].copy_from_slice(&now_ms().to_be_bytes());
    raw[8..].copy_from_slice(&counter.to_be_bytes());
    URL_SAFE_NO_PAD.encode(raw)
}

/// Full response body kept for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

struct Entry {
    id: String,
    expires_at: Instant,
    download: Download,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory store of raw response bodies, bounded by age and count.
pub struct ResponseStore {
    ttl: Duration,
    max_items: usize,
    entries: Mutex<VecDeque<Entry>>,
}

impl ResponseStore {
    pub fn new(ttl: Duration, max_items: usize) -> Self {
        Self {
            ttl,
            max_items: max_items.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        entries.retain(|entry| !entry.is_expired(now));
        entries
    }

    /// Keep `bytes` and return the id to fetch them with. When the store is
    /// full the oldest third is dropped first.
    pub fn put(&self, bytes: Vec<u8>, content_type: &str) -> String {
        let mut entries = self.entries();
        if entries.len() >= self.max_items {
            let evict = (entries.len() / 3).max(1);
            entries.drain(..evict);
            tracing::debug!(evicted = evict, "download store full");
        }

        let id = generate_id();
        let content_type = if content_type.trim().is_empty() {
            FALLBACK_CONTENT_TYPE.to_string()
        } else {
            content_type.to_string()
        };
        entries.push_back(Entry {
            id: id.clone(),
            expires_at: Instant::now() + self.ttl,
            download: Download { bytes, content_type },
        });
        id
    }

    pub fn get(&self, id: &str) -> Option<Download> {
        self.entries()
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.download.clone())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS), DEFAULT_MAX_ITEMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let store = ResponseStore::default();
        let id = store.put(b"hello".to_vec(), "text/plain");
        let download = store.get(&id).unwrap();
        assert_eq!(download.bytes, b"hello");
        assert_eq!(download.content_type, "text/plain");
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn ids_are_url_safe_and_unique() {
        let store = ResponseStore::default();
        let a = store.put(Vec::new(), "");
        let b = store.put(Vec::new(), "");
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(store.get(&a).unwrap().content_type, "application/octet-stream");
    }

    #[test]
    fn expired_entries_are_dropped() {
        let store = ResponseStore::new(Duration::ZERO, 10);
        let id = store.put(b"x".to_vec(), "text/plain");
        assert_eq!(store.get(&id), None);
        assert!(store.is_empty());
    }

    #[test]
    fn full_store_evicts_oldest_third() {
        let store = ResponseStore::new(Duration::from_secs(60), 6);
        let ids: Vec<String> = (0..6).map(|i| store.put(vec![i], "application/octet-stream")).collect();

        let newest = store.put(vec![6], "application/octet-stream");
        assert_eq!(store.len(), 5);
        assert_eq!(store.get(&ids[0]), None);
        assert_eq!(store.get(&ids[1]), None);
        assert!(store.get(&ids[2]).is_some());
        assert!(store.get(&newest).is_some());
    }
}
