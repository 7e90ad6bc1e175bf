use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use taskdeck_server::config::{Config, Storage, APP_NAME, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.default_log_filter())),
        )
        .init();

    info!("{APP_NAME} v{VERSION} starting");
    match config.storage {
        Storage::Sqlite => info!("database: {}", config.database_path.display()),
        Storage::Memory => info!("database: in-memory, nothing is persisted"),
    }

    let db = taskdeck_db::open_database(&config.db_config())
        .with_context(|| format!("open database {}", config.database_path.display()))?;

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("listening on http://{addr}");

    let state = taskdeck_server::app_state(db, config);
    taskdeck_server::serve(listener, state, shutdown_signal()).await?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("ctrl-c received, draining connections"),
        () = terminate => info!("SIGTERM received, draining connections"),
    }
}
