//! Background runs. Triggers enqueue a [`RunRequest`] and get an event id
//! back immediately; the run itself proceeds on its own task.

use crate::agent::run::{self, RunRequest, Services};
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
#[error("dispatcher is shutting down")]
pub struct ShuttingDown;

#[derive(Clone)]
pub struct Dispatcher {
    services: Services,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            tracker: TaskTracker::new(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Fails once [`shutdown`](Self::shutdown) has been called.
    pub fn ensure_accepting(&self) -> Result<(), ShuttingDown> {
        if self.tracker.is_closed() {
            Err(ShuttingDown)
        } else {
            Ok(())
        }
    }

    /// Start a run in the background and return its event id.
    pub fn enqueue(&self, request: RunRequest) -> Result<Uuid, ShuttingDown> {
        self.ensure_accepting()?;
        let event_id = Uuid::new_v4();
        let services = self.services.clone();
        let span = tracing::info_span!(
            "job",
            %event_id,
            event = request.tier.event_name(),
            project_id = %request.project_id
        );

        tracing::info!(
            %event_id,
            tier = %request.tier,
            project_id = %request.project_id,
            "Triggering code agent"
        );

        self.tracker.spawn(
            async move {
                match run::dispatch(&services, &request).await {
                    Ok(artifact) => tracing::info!(
                        outcome = artifact.outcome.as_str(),
                        files = artifact.files.len(),
                        "Run finished"
                    ),
                    Err(e) => tracing::error!("Run failed: {e}"),
                }
            }
            .instrument(span),
        );

        Ok(event_id)
    }

    /// Runs still executing.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Refuse new runs and wait for in-flight ones to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        if !self.tracker.is_empty() {
            tracing::info!(runs = self.tracker.len(), "Waiting for in-flight runs");
        }
        self.tracker.wait().await;
    }
}
