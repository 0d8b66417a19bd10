//! Error types shared across the crate.
//!
//! Only store-boundary validation and the external collaborators (importer,
//! executor, storage backends) raise errors. Skipped or canceled preset rules
//! are reported through `ApplyOutcome` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A preset was rejected before touching the rule store.
    #[error("Invalid preset: {0}")]
    Validation(String),

    /// The cURL importer could not make sense of the command.
    #[error("Failed to import cURL command: {0}")]
    Import(String),

    /// The executor reported a failure; the message is passed through verbatim.
    #[error("{0}")]
    Request(String),

    /// A newer send (or an explicit cancel) superseded this one.
    #[error("Request cancelled")]
    Canceled,

    #[error("{0}")]
    Storage(String),

    /// Command-line input that could not be used (bad timestamp, unreadable
    /// input file).
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Failed to serialize data: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
