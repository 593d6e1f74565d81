//! Service layer module
//!
//! Selection routing, stream sessions, the fan-out orchestrator, usage and
//! cost accounting, the connectivity check and the response board

pub mod board;
pub mod connectivity;
pub mod orchestrator;
pub mod router;
pub mod session;
pub mod usage;

pub use board::{BoardEntry, ResponseBoard};
pub use connectivity::test_model;
pub use orchestrator::{DispatchHandle, DispatchSummary, Orchestrator, SendController};
pub use router::{resolve_targets, SessionTarget};
pub use session::{SessionOutcome, SessionState, StreamSession};
pub use usage::{compute_cost, format_cost, normalize_usage, CostBreakdown};
