//! Per-document batch results.

use serde::{Deserialize, Serialize};

/// Result of processing one document identifier in a batch. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationOutcome {
    pub queue_id: Option<String>,
    pub source_path: String,
    /// HTTP-style status code: 200 archived, 201 already archived, 404, 405, ...
    pub return_code: u16,
    pub message: String,
    pub error: Option<String>,
}

impl ReplicationOutcome {
    pub fn success(queue_id: Option<String>, source_path: &str, code: u16, message: &str) -> Self {
        Self {
            queue_id,
            source_path: source_path.to_string(),
            return_code: code,
            message: message.to_string(),
            error: None,
        }
    }

    pub fn failure(queue_id: Option<String>, source_path: &str, code: u16, error: &str) -> Self {
        Self {
            queue_id,
            source_path: source_path.to_string(),
            return_code: code,
            message: String::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.return_code)
    }
}
