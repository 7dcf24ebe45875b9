//! Run entry points: `run_free_tier`, `run_premium_tier`, and [`dispatch`]
//! which picks one by tier.

use super::finalizer::Finalizer;
use super::network::{Network, RunContext};
use super::tier::{FreeTier, PremiumTier, Tier, TierProfile};
use super::RunError;
use crate::config::Config;
use crate::observability::Metrics;
use crate::providers::{ChatMessage, Provider};
use crate::sandbox::{SandboxGateway, SandboxHandle};
use crate::store::messages::{self, MessageRole, MessageType};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

/// Long-lived collaborators shared by every run.
#[derive(Clone)]
pub struct Services {
    pub provider: Arc<dyn Provider>,
    pub sandbox: SandboxGateway,
    pub store: Store,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
}

/// A request to build or refine a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(rename = "projectId")]
    pub project_id: String,
    /// The user's instruction.
    pub value: String,
    #[serde(default)]
    pub tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Error,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// What a run hands back to its trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunArtifact {
    pub url: Option<String>,
    pub title: String,
    pub files: HashMap<String, String>,
    pub summary: Option<String>,
    pub outcome: RunOutcome,
}

pub async fn dispatch(services: &Services, request: &RunRequest) -> Result<RunArtifact, RunError> {
    match request.tier {
        Tier::Free => run_free_tier(services, request).await,
        Tier::Premium => run_premium_tier(services, request).await,
    }
}

pub async fn run_free_tier(services: &Services, request: &RunRequest) -> Result<RunArtifact, RunError> {
    execute::<FreeTier>(services, &request.project_id, &request.value).await
}

pub async fn run_premium_tier(
    services: &Services,
    request: &RunRequest,
) -> Result<RunArtifact, RunError> {
    execute::<PremiumTier>(services, &request.project_id, &request.value).await
}

async fn execute<T: TierProfile>(
    services: &Services,
    project_id: &str,
    instruction: &str,
) -> Result<RunArtifact, RunError> {
    let span = tracing::info_span!("run", tier = %T::TIER, project_id);
    let result = run_inner::<T>(services, project_id, instruction)
        .instrument(span)
        .await;

    let outcome = match &result {
        Ok(artifact) => artifact.outcome.as_str(),
        Err(e) => e.outcome_label(),
    };
    services.metrics.record_run(T::TIER.as_str(), outcome);
    result
}

async fn run_inner<T: TierProfile>(
    services: &Services,
    project_id: &str,
    instruction: &str,
) -> Result<RunArtifact, RunError> {
    let config = &services.config;
    let handle = services
        .sandbox
        .acquire(T::template(&config.sandbox), config.sandbox.sandbox_timeout_ms)
        .await
        .map_err(RunError::Provisioning)?;

    write_scaffold::<T>(&services.sandbox, &handle).await?;

    let conversation = build_conversation::<T>(services, project_id, instruction)?;
    let network = Network::<T>::new(&config.agent);
    let ctx = RunContext {
        provider: services.provider.as_ref(),
        gateway: &services.sandbox,
        handle: &handle,
        metrics: &services.metrics,
    };

    let finalizer = Finalizer {
        provider: services.provider.as_ref(),
        store: &services.store,
        gateway: &services.sandbox,
        config: &config.agent,
    };

    match network.run(ctx, conversation).await {
        Ok(outcome) => finalizer.finalize::<T>(project_id, &handle, outcome).await,
        Err(e) => {
            tracing::error!("Run aborted: {e}");
            if let Err(persist) = finalizer.persist_error(project_id) {
                tracing::error!("Failed to save error message: {persist}");
            }
            Err(e)
        }
    }
}

/// Write the tier's starter files. Runs before any agent turn, so a failure
/// counts as provisioning.
async fn write_scaffold<T: TierProfile>(
    gateway: &SandboxGateway,
    handle: &SandboxHandle,
) -> Result<(), RunError> {
    let scaffold = T::scaffold();
    if scaffold.is_empty() {
        return Ok(());
    }
    let sandbox = gateway.resolve(handle).await.map_err(RunError::Provisioning)?;
    for (path, content) in scaffold {
        sandbox
            .write_file(path, content)
            .await
            .map_err(RunError::Provisioning)?;
    }
    tracing::debug!(sandbox_id = %handle.id, files = scaffold.len(), "Scaffold written");
    Ok(())
}

/// Prior project messages (for tiers that replay history) followed by the
/// instruction.
fn build_conversation<T: TierProfile>(
    services: &Services,
    project_id: &str,
    instruction: &str,
) -> Result<Vec<ChatMessage>, RunError> {
    let mut conversation = Vec::new();

    if T::USES_HISTORY {
        let limit = services.config.agent.history_limit;
        let mut history = services
            .store
            .with(|c| messages::recent_history(c, project_id, limit))
            .map_err(RunError::Store)?;

        // The trigger usually stores the instruction before enqueueing.
        if history
            .last()
            .is_some_and(|m| m.role == MessageRole::User && m.content == instruction)
        {
            history.pop();
        }

        conversation.extend(
            history
                .into_iter()
                .filter(|m| m.kind == MessageType::Result)
                .map(|m| match m.role {
                    MessageRole::User => ChatMessage::user(m.content),
                    MessageRole::Assistant => ChatMessage::assistant(m.content),
                }),
        );
    }

    conversation.push(ChatMessage::user(instruction));
    Ok(conversation)
}
