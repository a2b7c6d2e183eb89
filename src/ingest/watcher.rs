//! Input container watcher
//!
//! Watches the directory behind the input container and hands each new or
//! rewritten artifact to the trigger once it has been quiet for the settle
//! interval, so half-written uploads are not ingested.

use super::trigger::{IngestionTrigger, TriggerOutcome};
use super::IngestError;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default quiet period before an artifact is ingested
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

impl IngestionTrigger {
    /// Handle every artifact already in the input container
    pub async fn scan_existing(&self) -> Result<usize, IngestError> {
        let container = self.input_container().to_string();
        let artifacts = self
            .store()
            .list(&container)
            .await
            .map_err(|source| IngestError::Storage {
                artifact: container.clone(),
                source,
            })?;

        let mut started = 0;
        for artifact in artifacts {
            match self.handle_artifact(&artifact.name).await {
                Ok(TriggerOutcome::Started { .. }) => started += 1,
                Ok(TriggerOutcome::Duplicate) => {}
                // Already logged by the trigger
                Err(_) => {}
            }
        }
        info!("Initial scan of '{}' started {} orchestration(s)", container, started);
        Ok(started)
    }

    /// Watch the input container until `shutdown` resolves
    ///
    /// Only backends with a local directory can be watched.
    pub async fn watch<F>(&self, settle: Duration, shutdown: F) -> Result<(), IngestError>
    where
        F: Future<Output = ()>,
    {
        let dir = self
            .store()
            .container_path(self.input_container())
            .ok_or_else(|| {
                IngestError::Unsupported(
                    "the configured storage backend has no local directory".to_string(),
                )
            })?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| IngestError::Unsupported(format!("{}: {}", dir.display(), e)))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching for batches in {}", dir.display());

        self.scan_existing().await?;

        let mut pending: HashMap<String, Instant> = HashMap::new();
        let tick = (settle / 2).max(Duration::from_millis(10));
        let mut ticker = tokio::time::interval(tick);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopping watcher for {}", dir.display());
                    break;
                }
                event = rx.recv() => match event {
                    Some(Ok(event)) => {
                        if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                            for path in &event.paths {
                                if let Some(name) = artifact_name(path) {
                                    debug!("Change detected for {}", name);
                                    pending.insert(name, Instant::now());
                                }
                            }
                        }
                    }
                    Some(Err(e)) => error!("Watch error: {}", e),
                    None => {
                        warn!("Watcher channel closed");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    let ready: Vec<String> = pending
                        .iter()
                        .filter(|(_, seen)| seen.elapsed() >= settle)
                        .map(|(name, _)| name.clone())
                        .collect();
                    for name in ready {
                        pending.remove(&name);
                        if let Err(e) = self.handle_artifact(&name).await {
                            debug!("Artifact {} not ingested: {}", name, e);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Artifact name for a path in the watched directory; skips hidden and temp files
fn artifact_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.') || name.ends_with('~') || !path.is_file() {
        return None;
    }
    Some(name.to_string())
}
