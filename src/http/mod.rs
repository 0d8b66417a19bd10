pub mod cancel;
pub mod client;
pub mod method;
pub mod request;
pub mod response;

pub use cancel::InFlight;
pub use client::{Exchange, Executor, HttpExecutor};
pub use method::HttpMethod;
pub use request::{BodyMode, RequestDocument, TransportOptions};
pub use response::ResponseSummary;
