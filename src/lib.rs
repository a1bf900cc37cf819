//! Request inspection gate.
//!
//! Screens every inbound HTTP request for injection patterns, tracks
//! suspicious activity per source over a sliding window and temporarily
//! blocks sources that cross the threshold. Every decision is written to
//! the security log.

pub mod config;
pub mod detection;
pub mod http;
pub mod inspection;
pub mod lifecycle;
pub mod observability;
pub mod tracking;

pub use config::IdsConfig;
pub use http::HttpServer;
pub use inspection::{RequestDescriptor, RequestInspector};
pub use lifecycle::Shutdown;
