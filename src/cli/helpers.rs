//! Shared helper functions for CLI commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::archive::ArchiveOrchestrator;
use crate::config::Settings;
use crate::dispatch::BatchDispatcher;
use crate::http_client::{ReqwestTransport, ResilientClient};
use crate::object_store::FilesystemObjectStore;
use crate::rate_limit::RateLimiter;
use crate::replication::ReplicationEngine;
use crate::source::RestDocumentSource;

/// Wire the full pipeline from settings.
///
/// Requires `source.base_url` (or `DOCVAULT_SOURCE_URL`) to be set.
pub fn build_dispatcher(settings: &Settings) -> anyhow::Result<Arc<BatchDispatcher>> {
    let base_url = settings.source_base_url.as_deref().context(
        "No document source configured. Set source.base_url or DOCVAULT_SOURCE_URL",
    )?;

    let transport = ReqwestTransport::new(Duration::from_secs(settings.source_timeout_secs))?;
    let client = ResilientClient::new(
        Arc::new(transport),
        RateLimiter::with_config(settings.rate_limit.clone()),
    )
    .with_retry_policy(settings.retry.clone());
    let source = RestDocumentSource::new(client, base_url).with_token(settings.source_token.clone());

    let ctx = settings.create_db_context();
    let queue = Arc::new(ctx.queue());
    let engine = ReplicationEngine::new(
        Arc::new(source),
        Arc::new(FilesystemObjectStore::new(settings.object_store_dir.clone())),
        Arc::new(ctx.archive()),
    );
    let orchestrator = Arc::new(ArchiveOrchestrator::new(engine, queue.clone()));

    Ok(Arc::new(BatchDispatcher::new(
        orchestrator,
        queue,
        settings.dispatch.clone(),
    )))
}

/// Cancel `token` when Ctrl-C is pressed.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight work");
            token.cancel();
        }
    });
}

/// Truncate a string to at most `max_len` characters.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer string", 10), "a longe...");
    }

    #[test]
    fn test_build_requires_source_url() {
        let settings = Settings::with_data_dir(std::path::PathBuf::from("/tmp/docvault-test"));
        let err = build_dispatcher(&settings)
            .err()
            .expect("expected build_dispatcher to fail");
        assert!(err.to_string().contains("DOCVAULT_SOURCE_URL"));
    }
}
