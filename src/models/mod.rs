//! Data models for docvault.

mod outcome;
mod queue;
mod version;

pub use outcome::ReplicationOutcome;
pub use queue::{QueueEntry, QueueStatus};
pub use version::VersionRecord;
