//! covercat - serves a catalog of georeferenced raster coverages over HTTP
//!
//! This is the main entry point for the covercat application.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info};

use covercat::handlers::heartbeat::mark_start;
use covercat::handlers::router;
use covercat::state::AppState;
use covercat::{
    init_tracing, log_error, log_operation_end, log_operation_start, Config, CovercatError, Result,
};

fn main() -> Result<()> {
    mark_start();

    // Load configuration
    let config = Config::load()?;
    init_tracing(&config.log_level);
    info!("Starting covercat v{}", env!("CARGO_PKG_VERSION"));

    // Validate configuration
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(workers) = config.server.workers {
        runtime.worker_threads(workers.max(1));
    }
    let runtime = runtime.build().map_err(|e| CovercatError::Server {
        message: format!("Failed to start the runtime: {}", e),
    })?;
    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<()> {
    let start = Instant::now();
    log_operation_start("open_catalog", None);
    let app_state = AppState::open(config.clone()).map_err(|e| {
        error!("Failed to open catalog: {}", e);
        e
    })?;

    // An empty catalog still serves, it just has nothing to show
    let validation = app_state.validate();
    if let Err(e) = &validation {
        log_error(e, "catalog check");
    }
    log_operation_end("open_catalog", start, validation.is_ok());
    info!(
        mime_types = ?app_state.context.decoders().mime_types(),
        "Registered decoders"
    );

    // Wrap in Arc for sharing
    let state = Arc::new(app_state);

    // Build the router
    let app = router(state);

    // Create the server address
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| CovercatError::Config {
                message: format!("Invalid host address: {}", e),
            })?,
        config.server.port,
    ));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CovercatError::Server {
            message: format!("Failed to bind to address: {}", e),
        })?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CovercatError::Server {
            message: format!("Server error: {}", e),
        })?;

    info!("Server has been gracefully shut down");
    Ok(())
}

/// Wait for a shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
