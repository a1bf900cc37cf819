//! Per-source state: suspicious activity and temporary blocks.
//!
//! # Data Flow
//! ```text
//! suspicious request
//!     → activity.rs (append timestamp, prune window, count)
//!     → blocklist.rs (set expiry once the count reaches the threshold)
//!
//! any request
//!     → blocklist.rs (lookup, evict if expired)
//! ```
//!
//! # Design Decisions
//! - Lazy eviction on access; an optional housekeeping pass purges idle sources
//! - In-memory only, state is lost on restart
//! - Block expiry does not clear activity history; it ages out on its own

pub mod activity;
pub mod blocklist;
pub mod housekeeping;

pub use activity::{ActivityRecord, ActivityTracker};
pub use blocklist::{BlockRegistry, BlockStatus};
pub use housekeeping::Housekeeper;
