//! Gateway binary: load configuration, assemble the server, serve until a
//! shutdown signal arrives. Shutdown is terminal.

use std::sync::Arc;

use tokio::net::TcpListener;

use gauntlet::config::validation::validate_config;
use gauntlet::lifecycle::shutdown::wait_for_signal;
use gauntlet::observability::{logging, metrics};
use gauntlet::{GatewayConfig, GatewayServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    let config = GatewayConfig::from_env();
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        return Err("configuration validation failed".into());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        strategy = %config.backend.load_balance_strategy,
        backends = config.backend.urls.len(),
        "Starting API gateway"
    );

    let shutdown = Arc::new(Shutdown::new());
    let server = GatewayServer::new(config.clone());

    // Metrics listener on its own port so scrapes never compete with
    // proxy traffic.
    if config.metrics.enabled {
        let router = metrics::metrics_router(server.metrics(), &config.metrics.path);
        let addr = format!("{}:{}", config.server.host, config.metrics.port);
        let path = config.metrics.path.clone();
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            match TcpListener::bind(&addr).await {
                Ok(listener) => {
                    tracing::info!(address = %addr, path = %path, "Metrics server started");
                    let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
                        let _ = stop.recv().await;
                    });
                    if let Err(e) = serve.await {
                        tracing::error!(error = %e, "Metrics server error");
                    }
                }
                Err(e) => {
                    tracing::error!(address = %addr, error = %e, "Failed to bind metrics server");
                }
            }
        });
    }

    // Signal handler: one Ctrl+C / SIGTERM drains everything.
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            wait_for_signal().await;
            shutdown.trigger();
        });
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    server.run(listener, &shutdown).await?;

    tracing::info!("Server stopped");
    Ok(())
}
