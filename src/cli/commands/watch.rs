//! Watch command - the long-running service.

use std::sync::Arc;

use anyhow::Context;

use crate::config::Settings;
use crate::logging;
use crate::scoring::ScoringPipeline;
use crate::service::ScoringService;

/// Run the service until a termination signal arrives.
pub async fn run_watch(mut settings: Settings) -> anyhow::Result<()> {
    settings.prepare_directories()?;

    let log_handle = logging::init_with_config(&settings.logging, &settings.paths.logs_dir)
        .context("Failed to initialize logging")?;
    crate::log_event!("service", "logging", "{}", log_handle.log_path().display());
    crate::debug_event!(
        "service",
        "directories",
        "input={} output={} models={}",
        settings.paths.input_dir.display(),
        settings.paths.output_dir.display(),
        settings.paths.models_dir.display()
    );

    let pipeline = Arc::new(ScoringPipeline::from_settings(&settings));
    ScoringService::new(settings, pipeline)
        .run(shutdown_signal())
        .await
        .context("Watcher failed")?;

    drop(log_handle);
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[service] cannot listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("[service] cannot listen for SIGTERM: {e}");
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
