//! Long-running watch mode

use crate::app::App;
use crate::orchestration::RunPhase;
use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

/// Resume unfinished runs, then ingest batches until Ctrl-C
pub async fn run_watch_command(app: &App, settle: Duration) -> Result<()> {
    for run in app.runtime.list().await? {
        if matches!(run.phase, RunPhase::Completed | RunPhase::Failed) {
            continue;
        }
        match app.runtime.resume(&run.instance_id).await {
            Ok(_) => info!("Resumed unfinished instance {}", run.instance_id),
            Err(e) => warn!("Could not resume {}: {}", run.instance_id, e),
        }
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    println!(
        "Watching '{}' for batches (Ctrl-C to stop)",
        app.config.storage.input_container
    );
    app.trigger.watch(settle, shutdown).await?;
    Ok(())
}
