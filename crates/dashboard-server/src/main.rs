mod config;
mod logging;
mod wiring;

use std::error::Error;

use streaming::StreamingEngine;
use tokio::{net::TcpListener, signal};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = config::Config::from_env()?;
    logging::init_tracing(config.log_json);

    let state = wiring::build_state(&config)?;
    let engine = state.engine().clone();
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(
        addr = %config.listen_addr,
        provider = %config.provider_url,
        poll_interval_secs = config.poll_interval.as_secs(),
        "dashboard server listening"
    );

    axum::serve(listener, wiring::build_app(state))
        .with_graceful_shutdown(shutdown_signal(engine))
        .await?;

    info!("dashboard server stopped");
    Ok(())
}

/// Resolves on Ctrl+C after cancelling every polling task.
async fn shutdown_signal(engine: StreamingEngine) {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }

    info!("received Ctrl+C, shutting down");
    engine.shutdown();
}
