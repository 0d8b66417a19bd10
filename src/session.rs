use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::Config;
use crate::curl;
use crate::error::{Error, Result};
use crate::history::{Collection, Snapshot, SnapshotStore};
use crate::http::{Executor, InFlight, RequestDocument, ResponseSummary};
use crate::presets::{apply_presets, ApplyOutcome, PresetStore, ValuePrompt};
use crate::response_store::ResponseStore;
use crate::storage::{self, Storage, DRAFT_KEY};

/// The request being edited, plus everything it is checked against and
/// recorded into.
pub struct Session {
    config: Config,
    storage: Arc<dyn Storage>,
    presets: PresetStore,
    snapshots: SnapshotStore,
    downloads: ResponseStore,
    in_flight: InFlight,
    document: RequestDocument,
}

impl Session {
    /// Open the configured backend and restore the saved draft.
    pub fn open(config: Config) -> Result<Self> {
        let storage = config.open_storage()?;
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: Config, storage: Arc<dyn Storage>) -> Result<Self> {
        let draft: Option<RequestDocument> = storage::load_json(storage.as_ref(), DRAFT_KEY)?;
        let document = match draft {
            Some(document) => document,
            None => fresh_document(&config),
        };

        Ok(Self {
            presets: PresetStore::new(storage.clone()),
            snapshots: SnapshotStore::with_limits(storage.clone(), config.history_limit, config.search_limit),
            downloads: ResponseStore::new(config.download_ttl(), config.download_max_items),
            in_flight: InFlight::new(),
            document,
            storage,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn presets(&self) -> &PresetStore {
        &self.presets
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn downloads(&self) -> &ResponseStore {
        &self.downloads
    }

    pub fn document(&self) -> &RequestDocument {
        &self.document
    }

    /// Edit the document in place. Call `save_draft` to persist the edit.
    pub fn document_mut(&mut self) -> &mut RequestDocument {
        &mut self.document
    }

    pub fn save_draft(&self) -> Result<()> {
        storage::save_json(self.storage.as_ref(), DRAFT_KEY, &self.document)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.document = fresh_document(&self.config);
        self.save_draft()
    }

    /// Replace the document with the parsed cURL command, then run the auto
    /// presets when `auto` is set. A command that does not parse leaves the
    /// document as it was.
    pub fn import_curl<P>(&mut self, text: &str, prompt: &mut P, auto: bool) -> Result<Option<ApplyOutcome>>
    where
        P: ValuePrompt + ?Sized,
    {
        let document = curl::parse_curl(text).inspect_err(|err| {
            tracing::warn!("{err}");
        })?;
        tracing::info!(method = %document.method, url = %document.url, "imported cURL command");
        self.document = document;

        let outcome = if auto {
            Some(self.apply_presets(prompt, true)?)
        } else {
            None
        };
        self.save_draft()?;
        Ok(outcome)
    }

    /// Run the stored presets against the document and keep the result.
    pub fn apply_presets<P>(&mut self, prompt: &mut P, only_auto: bool) -> Result<ApplyOutcome>
    where
        P: ValuePrompt + ?Sized,
    {
        let presets = self.presets.list()?;
        let outcome = apply_presets(&presets, &self.document, prompt, only_auto);
        if !outcome.is_no_match() {
            self.document = outcome.document.clone();
            self.save_draft()?;
        }
        Ok(outcome)
    }

    /// Run the single stored preset `name` against the document, whether or
    /// not it is marked auto. Returns `None` when no preset has that name.
    pub fn apply_preset<P>(&mut self, name: &str, prompt: &mut P) -> Result<Option<ApplyOutcome>>
    where
        P: ValuePrompt + ?Sized,
    {
        let Some(preset) = self.presets.get(name)? else {
            return Ok(None);
        };
        let outcome = apply_presets(std::slice::from_ref(&preset), &self.document, prompt, false);
        if !outcome.is_no_match() {
            self.document = outcome.document.clone();
            self.save_draft()?;
        }
        Ok(Some(outcome))
    }

    pub fn export_curl(&self) -> String {
        curl::export_curl(&self.document)
    }

    /// Send the document through `executor`. Starting a send cancels any send
    /// still running. Only successful exchanges are recorded in history; the
    /// raw body is kept in the download store under `download_id`. An exchange
    /// that completes after its send was canceled or superseded is discarded.
    pub async fn send(&self, executor: &dyn Executor) -> Result<ResponseSummary> {
        let request = self.document.clone();
        let (ticket, cancel_rx) = self.in_flight.begin();
        let result = executor.execute(&request, cancel_rx).await;
        let current = self.in_flight.finish(ticket);

        let exchange = match result {
            Ok(_) if !current => {
                tracing::info!(ticket, "send cancelled after the exchange completed");
                return Err(Error::Canceled);
            }
            Ok(exchange) => exchange,
            Err(Error::Canceled) => {
                tracing::info!(ticket, "send cancelled");
                return Err(Error::Canceled);
            }
            Err(err) => {
                tracing::warn!(url = %request.url, "send failed: {err}");
                return Err(err);
            }
        };

        let mut summary = exchange.summary;
        summary.download_id = Some(self.downloads.put(exchange.raw_body, &summary.content_type));

        let snapshot = Snapshot::capture(&request, Some(&summary), self.config.snapshot_body_chars);
        self.snapshots.record(Collection::History, snapshot)?;
        Ok(summary)
    }

    /// Cancel the outstanding send, if any.
    pub fn cancel(&self) -> bool {
        self.in_flight.cancel()
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.is_busy()
    }

    /// Capture the document without a response into `collection`.
    pub fn save_snapshot(&self, collection: Collection) -> Result<Snapshot> {
        let snapshot = Snapshot::capture(&self.document, None, self.config.snapshot_body_chars);
        self.snapshots.record(collection, snapshot.clone())?;
        Ok(snapshot)
    }

    /// Load the snapshot taken at `ts` into the editor. Returns the collection
    /// it was found in.
    pub fn load_snapshot(&mut self, ts: &DateTime<Utc>) -> Result<Option<Collection>> {
        let Some(hit) = self.snapshots.find(ts)? else {
            return Ok(None);
        };
        self.document = hit.snapshot.restore();
        self.save_draft()?;
        Ok(Some(hit.collection))
    }
}

fn fresh_document(config: &Config) -> RequestDocument {
    let mut document = RequestDocument::default();
    document.options.timeout_secs = config.default_timeout_secs;
    document
}
