//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! inspection pipeline produces:
//!     → security_log.rs (one structured record per security event)
//!         → console (tracing, target "security")
//!         → rotating.rs (JSON lines, best-effort)
//!     → metrics.rs (counters)
//!
//! everything else:
//!     → logging.rs (tracing subscriber, env filter)
//! ```
//!
//! # Design Decisions
//! - A broken log file never fails a request
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod rotating;
pub mod security_log;

pub use security_log::{
    ConsoleSink, EventFields, EventKind, FileSink, Level, LogRecord, LogSink, MemorySink,
    SecurityLog,
};
