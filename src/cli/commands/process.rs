//! One-shot grading of a single batch

use crate::app::App;
use crate::cli::commands::status::finish_with;
use crate::ingest::TriggerOutcome;
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::info;

/// Grade an artifact already in the input container and wait for the run
pub async fn run_process_command(app: &App, artifact: &str) -> Result<()> {
    let outcome = app.trigger.handle_artifact(artifact).await?;
    match outcome {
        TriggerOutcome::Started {
            instance_id,
            students,
        } => {
            println!("Started {instance_id} for {artifact} ({students} student(s))");
            let status = app.runtime.wait_for_completion(&instance_id).await?;
            finish_with(&status)
        }
        TriggerOutcome::Duplicate => {
            println!("{artifact} was already processed");
            Ok(())
        }
    }
}

/// Upload a local file into the input container, then grade it
pub async fn run_submit_command(app: &App, file: &Path, name: Option<String>) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Cannot derive an artifact name from {}", file.display()))?,
    };

    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let container = &app.config.storage.input_container;
    app.blobs
        .put(container, &name, &content)
        .await
        .with_context(|| format!("Failed to upload {name} to '{container}'"))?;
    info!("Uploaded {} ({} bytes) as {}", file.display(), content.len(), name);

    run_process_command(app, &name).await
}
