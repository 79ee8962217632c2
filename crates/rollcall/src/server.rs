//! HTTP service lifecycle.

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{build_router, AppState};
use crate::registry::Registry;

/// Open the registry and serve HTTP until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the registry cannot be opened, the address cannot be
/// bound, or the server fails.
pub async fn serve(config: &Config) -> Result<()> {
    info!("Opening {} store", config.storage.backend);
    let registry = Registry::open(config)?;
    let app = build_router(AppState::new(registry, config));

    let address = config.bind_address();
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::internal(format!("server error: {e}")))?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
