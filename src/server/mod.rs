//! HTTP batch entry point.
//!
//! An external scheduler posts batches of document identifiers; every
//! request gets one outcome per identifier back.

mod handlers;
mod routes;

pub use handlers::{ArchiveRequestBody, ArchiveResponseBody, ErrorBody};
pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::archive::ArchiveOptions;
use crate::dispatch::BatchDispatcher;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<BatchDispatcher>,
    /// Switches applied when a request leaves them out.
    pub defaults: ArchiveOptions,
    /// Cancelled on shutdown; in-flight batches observe it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(dispatcher: Arc<BatchDispatcher>, defaults: ArchiveOptions) -> Self {
        Self {
            dispatcher,
            defaults,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Start the web server and run until `shutdown` is cancelled.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
