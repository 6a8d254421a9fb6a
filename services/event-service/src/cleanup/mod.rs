//! Cascading cleanup of records owned by a deleted account.

mod workflow;

pub use workflow::{cleanup_owner, CleanupOutcome, CleanupStage};
