//! # cURL interop
//!
//! Turns a DevTools "Copy as cURL (bash)" command into a request document and
//! renders a request document back into a pasteable cURL command.

pub mod export;
pub mod import;

pub use export::export_curl;
pub use import::parse_curl;
