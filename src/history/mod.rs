//! # Request History
//!
//! Snapshots of the request document, optionally with the response that came
//! back, kept in two collections: a capped History (most recent first) and an
//! uncapped Favorites list the user curates. Timestamps identify entries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::http::request::RequestDocument;
use crate::http::response::ResponseSummary;
use crate::storage::{self, Storage, FAVORITES_KEY, HISTORY_KEY};

/// Maximum number of history entries to retain.
pub const MAX_HISTORY_ENTRIES: usize = 80;
/// Maximum number of search results returned.
pub const MAX_SEARCH_RESULTS: usize = 50;
/// Response body characters kept in a snapshot.
pub const SNAPSHOT_BODY_CHARS: usize = 50_000;

static LAST_TIMESTAMP_MS: AtomicI64 = AtomicI64::new(0);

/// Current time at millisecond precision, strictly increasing within the
/// process so timestamps stay usable as keys.
fn next_timestamp() -> DateTime<Utc> {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_TIMESTAMP_MS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or(now);
    DateTime::from_timestamp_millis(now.max(previous + 1)).unwrap_or_else(Utc::now)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    History,
    Favorites,
}

impl Collection {
    fn storage_key(self) -> &'static str {
        match self {
            Collection::History => HISTORY_KEY,
            Collection::Favorites => FAVORITES_KEY,
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::History => write!(f, "history"),
            Collection::Favorites => write!(f, "favorites"),
        }
    }
}

/// A request document frozen at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub request: RequestDocument,
    #[serde(default)]
    pub response: Option<ResponseSummary>,
}

impl Snapshot {
    /// Capture `document`, keeping at most `body_chars` characters of the
    /// response body.
    pub fn capture(document: &RequestDocument, response: Option<&ResponseSummary>, body_chars: usize) -> Self {
        let mut request = document.clone();
        request.url = request.url.trim().to_string();
        Self {
            ts: next_timestamp(),
            request,
            response: response.map(|response| response.capped(body_chars)),
        }
    }

    /// Document to load back into the editor. Empty text blocks are rebuilt
    /// from the stored rows.
    pub fn restore(&self) -> RequestDocument {
        let mut document = self.request.clone();
        if document.query_text().is_empty() {
            let pairs = document.query_pairs().to_vec();
            document.set_query_pairs(pairs);
        }
        if document.header_text().is_empty() {
            let pairs = document.header_pairs().to_vec();
            document.set_header_pairs(pairs);
        }
        document
    }

    pub fn timestamp(&self) -> String {
        format_timestamp(&self.ts)
    }

    fn haystack(&self) -> String {
        format!("{} {} {}", self.request.method, self.request.url, self.timestamp()).to_lowercase()
    }

    /// One-line description used in listings.
    pub fn summary(&self) -> String {
        let response = match &self.response {
            Some(response) if response.status_code > 0 => {
                format!("{} {}ms", response.status_code, response.elapsed_ms)
            }
            _ => "no response".to_string(),
        };
        format!(
            "{} {} {} body={} q={} h={} {}",
            self.timestamp(),
            self.request.method,
            self.request.url,
            self.request.body_mode,
            self.request.query_pairs().len(),
            self.request.header_pairs().len(),
            response
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub collection: Collection,
    pub snapshot: Snapshot,
}

impl SearchHit {
    pub fn is_favorite(&self) -> bool {
        self.collection == Collection::Favorites
    }
}

/// History and Favorites, persisted through `Storage`.
#[derive(Clone)]
pub struct SnapshotStore {
    storage: Arc<dyn Storage>,
    history_limit: usize,
    search_limit: usize,
}

impl SnapshotStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_limits(storage, MAX_HISTORY_ENTRIES, MAX_SEARCH_RESULTS)
    }

    pub fn with_limits(storage: Arc<dyn Storage>, history_limit: usize, search_limit: usize) -> Self {
        Self {
            storage,
            history_limit,
            search_limit,
        }
    }

    /// Entries of `collection`, most recent first.
    pub fn list(&self, collection: Collection) -> Result<Vec<Snapshot>> {
        storage::load_json(self.storage.as_ref(), collection.storage_key())
    }

    fn save(&self, collection: Collection, snapshots: &[Snapshot]) -> Result<()> {
        storage::save_json(self.storage.as_ref(), collection.storage_key(), snapshots)
    }

    /// Add `snapshot` to the front of `collection`. History drops whatever
    /// falls past its limit.
    pub fn record(&self, collection: Collection, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.list(collection)?;
        snapshots.insert(0, snapshot);

        if collection == Collection::History && snapshots.len() > self.history_limit {
            let evicted = snapshots.len() - self.history_limit;
            snapshots.truncate(self.history_limit);
            tracing::debug!(evicted, "evicted oldest history entries");
        }

        self.save(collection, &snapshots)?;
        tracing::debug!(%collection, count = snapshots.len(), "recorded snapshot");
        Ok(())
    }

    pub fn remove(&self, collection: Collection, ts: &DateTime<Utc>) -> Result<bool> {
        let mut snapshots = self.list(collection)?;
        let before = snapshots.len();
        snapshots.retain(|snapshot| snapshot.ts != *ts);
        if snapshots.len() == before {
            return Ok(false);
        }
        self.save(collection, &snapshots)?;
        Ok(true)
    }

    pub fn clear(&self, collection: Collection) -> Result<()> {
        self.save(collection, &[])?;
        tracing::info!(%collection, "cleared snapshots");
        Ok(())
    }

    /// Look `ts` up in Favorites, then History.
    pub fn find(&self, ts: &DateTime<Utc>) -> Result<Option<SearchHit>> {
        for collection in [Collection::Favorites, Collection::History] {
            if let Some(snapshot) = self.list(collection)?.into_iter().find(|snapshot| snapshot.ts == *ts) {
                return Ok(Some(SearchHit { collection, snapshot }));
            }
        }
        Ok(None)
    }

    /// Case-insensitive substring search over method, URL and timestamp of
    /// both collections, newest first. A blank query lists everything.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let query = query.trim().to_lowercase();

        let mut hits: Vec<SearchHit> = Vec::new();
        for collection in [Collection::Favorites, Collection::History] {
            hits.extend(
                self.list(collection)?
                    .into_iter()
                    .map(|snapshot| SearchHit { collection, snapshot }),
            );
        }

        hits.retain(|hit| query.is_empty() || hit.snapshot.haystack().contains(&query));
        hits.sort_by(|a, b| b.snapshot.ts.cmp(&a.snapshot.ts));
        hits.truncate(self.search_limit);
        Ok(hits)
    }
}
