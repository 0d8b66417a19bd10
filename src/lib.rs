//! Request authoring core: a request document kept in sync across rows and
//! text, cURL import and export, scoped presets that rewrite requests, and a
//! history/favorites snapshot store.

pub mod cli;
pub mod config;
pub mod curl;
pub mod error;
pub mod history;
pub mod http;
pub mod jsonpath;
pub mod kv;
pub mod presets;
pub mod response_store;
pub mod session;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use session::Session;
