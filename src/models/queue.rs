//! Archive queue entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Archival status of a queued document.
///
/// Transitions only `New -> {Success, Failed, Restricted}`. A failed entry may
/// be re-processed; resetting a terminal entry back to `New` is an explicit
/// re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    New,
    Success,
    Failed,
    Restricted,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Restricted => "restricted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "new" => Some(Self::New),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "restricted" => Some(Self::Restricted),
            _ => None,
        }
    }

    /// Whether processing may (re)start from this status.
    pub fn is_processable(&self) -> bool {
        matches!(self, Self::New | Self::Failed)
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document scheduled for archival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub source_path: String,
    /// Batch/job grouping key.
    pub rule_id: String,
    pub status: QueueStatus,
    /// Last error text; empty on success.
    pub log: String,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(source_path: &str, rule_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_path: source_path.to_string(),
            rule_id: rule_id.to_string(),
            status: QueueStatus::New,
            log: String::new(),
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
