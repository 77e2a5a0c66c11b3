//! HTTP request handlers for the web server.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::archive::ArchiveOptions;
use crate::models::ReplicationOutcome;

/// Body of `POST /archive`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRequestBody {
    pub country: String,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub replicate_all_versions: Option<bool>,
    #[serde(default)]
    pub delete_source_after: Option<bool>,
}

impl ArchiveRequestBody {
    fn options(&self, defaults: ArchiveOptions) -> ArchiveOptions {
        ArchiveOptions {
            replicate_all_versions: self
                .replicate_all_versions
                .unwrap_or(defaults.replicate_all_versions),
            delete_source_after: self
                .delete_source_after
                .unwrap_or(defaults.delete_source_after),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveResponseBody {
    pub outcomes: Vec<ReplicationOutcome>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Liveness check.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Archive a batch of documents and report one outcome per identifier.
pub async fn archive_batch(
    State(state): State<AppState>,
    Json(body): Json<ArchiveRequestBody>,
) -> Response {
    let options = body.options(state.defaults);
    tracing::info!(
        "Archive request: {} documents for {}",
        body.document_ids.len(),
        body.country
    );

    match state
        .dispatcher
        .process_batch(&body.document_ids, &body.country, options, &state.shutdown)
        .await
    {
        Ok(outcomes) => (StatusCode::OK, Json(ArchiveResponseBody { outcomes })).into_response(),
        Err(e) => {
            tracing::warn!("Rejected archive batch: {}", e);
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
            (
                status,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
