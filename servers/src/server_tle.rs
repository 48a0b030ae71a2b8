use anyhow::Result;
use lib_tlestream::retrieve::HttpSource;
use lib_tlestream::TleEngine;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

mod tle_logic;
use tle_logic::{config, downstream, logger, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), &config.log_level())?;

    let engine_config = config.to_engine_config();
    log::info!(
        "Starting TLE server: catalog every {}s from {}, records every {}s from {}, datastore {}",
        engine_config.catalog_poll_interval.as_secs(),
        engine_config.catalog_url,
        engine_config.record_poll_interval.as_secs(),
        engine_config.record_url_template,
        engine_config.datastore_dir.display()
    );

    let source = HttpSource::new(engine_config.clone())?;
    let engine = Arc::new(TleEngine::open(engine_config, source)?);
    let shutdown = CancellationToken::new();

    let poll_tasks = engine.spawn(shutdown.clone());

    let downstream_handle = tokio::spawn(downstream::run(
        config.bind_addr(),
        AppState::new(Arc::clone(&engine), shutdown.clone()),
        shutdown.clone(),
    ));

    // Wait for a shutdown signal, or for the server to give up on its own.
    tokio::select! {
        _ = shutdown_signal() => {}
        _ = shutdown.cancelled() => {}
    }

    // Send shutdown signal to all components
    shutdown.cancel();

    // Wait for components to shut down
    poll_tasks.join().await;
    downstream_handle.await??;

    log::info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Ctrl-C received, initiating shutdown.");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
                log::info!("SIGTERM received, initiating shutdown.");
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
