use std::future::Future;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Supervised home for fire-and-forget work, chiefly cache writes.
///
/// Tasks spawned here outlive the request that scheduled them: a caller
/// disconnecting mid-load never cancels an in-flight save. The tracker
/// itself has process-wide lifetime (it lives inside the orchestrator),
/// logs every completion or failure, and is only ever awaited by tests
/// and shutdown paths.
pub struct BackgroundTasks {
    tasks: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub async fn spawn<F>(&self, label: &str, task: F)
    where
        F: Future<Output = Result<(), String>> + Send + 'static,
    {
        let label = label.to_owned();
        let mut set = self.tasks.lock().await;

        // Reap whatever already finished so the set stays small.
        while let Some(result) = set.try_join_next() {
            if let Err(e) = result {
                tracing::warn!(error = %e, "background task panicked");
            }
        }

        set.spawn(async move {
            match task.await {
                Ok(()) => tracing::debug!(task = %label, "background task finished"),
                Err(e) => tracing::warn!(task = %label, error = %e, "background task failed"),
            }
        });
    }

    /// Drain every task in flight. Never called on the request path.
    pub async fn wait_idle(&self) {
        let mut set = self.tasks.lock().await;
        while let Some(result) = set.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "background task panicked");
            }
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
