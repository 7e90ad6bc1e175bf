pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;

#[cfg(test)]
mod test_helpers;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use taskdeck_db::Database;
use tokio::net::TcpListener;

use config::Config;
use metrics::Metrics;
use routes::{AppState, InnerAppState};

/// Shared state with a fresh metrics registry.
pub fn app_state(db: Arc<dyn Database>, config: Config) -> AppState {
    Arc::new(InnerAppState {
        db,
        metrics: Arc::new(Metrics::new()),
        config: Arc::new(config),
    })
}

/// Serve until `shutdown` resolves, then let in-flight requests finish.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = routes::build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
