//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, ConnectInfo)
//!     → trace + request ID layers
//!     → middleware/inspection.rs (descriptor → inspector)
//!     → timeout → handler
//!     → Send to client
//! ```

pub mod middleware;
pub mod server;

pub use server::HttpServer;
