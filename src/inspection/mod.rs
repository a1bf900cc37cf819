//! Request inspection subsystem.
//!
//! # Data Flow
//! ```text
//! RequestDescriptor + continuation
//!     → inspector.rs: block check ──blocked──▶ 429 (retry_in_seconds)
//!     → inspector.rs: pattern evaluation
//!         clean ──────────────▶ continuation → request log
//!         suspicious → activity count
//!             below threshold ─▶ continuation → request log
//!             at threshold ────▶ block → 429
//!     → continuation failure ─▶ 500
//! ```

pub mod descriptor;
pub mod error;
pub mod inspector;
pub mod response;

pub use descriptor::{Params, RequestDescriptor};
pub use error::DownstreamError;
pub use inspector::{Inspection, InspectionOutcome, InspectionPolicy, RequestInspector};
pub use response::{ErrorBody, Rejection, ResponseStatus, ValidationRejection, Verdict};
