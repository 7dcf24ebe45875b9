//! Turns a finished network into a persisted assistant message.

use super::code_agent::extract_summary_body;
use super::network::NetworkOutcome;
use super::prompt::{RESPONSE_PROMPT, TITLE_PROMPT};
use super::run::{RunArtifact, RunOutcome};
use super::tier::TierProfile;
use super::RunError;
use crate::config::AgentConfig;
use crate::providers::Provider;
use crate::sandbox::{SandboxGateway, SandboxHandle};
use crate::store::messages::{self, MessageType, NewFragment};
use crate::store::Store;
use std::collections::HashMap;

/// The only text a user ever sees for a failed run.
pub const ERROR_MESSAGE: &str = "Something went wrong. Please try again.";
pub const TITLE_FALLBACK: &str = "Fragment";
pub const RESPONSE_FALLBACK: &str = "Here you go";

pub struct Finalizer<'a> {
    pub provider: &'a dyn Provider,
    pub store: &'a Store,
    pub gateway: &'a SandboxGateway,
    pub config: &'a AgentConfig,
}

impl Finalizer<'_> {
    /// Classify the outcome and persist exactly one assistant message.
    pub async fn finalize<T: TierProfile>(
        &self,
        project_id: &str,
        handle: &SandboxHandle,
        outcome: NetworkOutcome,
    ) -> Result<RunArtifact, RunError> {
        let state = outcome.state;
        let summary = state.summary().map(str::to_string);

        let Some(summary_text) = summary.clone().filter(|_| !state.files.is_empty()) else {
            tracing::warn!(
                project_id,
                exit = outcome.exit.as_str(),
                has_summary = summary.is_some(),
                files = state.files.len(),
                "Run finished without a usable result"
            );
            self.persist_error(project_id)?;
            return Ok(RunArtifact {
                url: None,
                title: TITLE_FALLBACK.to_string(),
                files: HashMap::new(),
                summary,
                outcome: RunOutcome::Error,
            });
        };

        let url = match self.gateway.resolve(handle).await {
            Ok(sandbox) => sandbox.host_for(T::WEB_PORT).await,
            Err(e) => {
                tracing::warn!(sandbox_id = %handle.id, "Cannot resolve sandbox for URL: {e}");
                None
            }
        };

        let (title, response) = if T::GENERATES_TITLE {
            tokio::join!(
                self.generate(TITLE_PROMPT, &summary_text, TITLE_FALLBACK),
                self.generate(RESPONSE_PROMPT, &summary_text, RESPONSE_FALLBACK),
            )
        } else {
            (
                TITLE_FALLBACK.to_string(),
                extract_summary_body(&summary_text).unwrap_or_else(|| RESPONSE_FALLBACK.to_string()),
            )
        };

        let files = state.files;
        let fragment = NewFragment {
            sandbox_url: url.clone().unwrap_or_default(),
            title: title.clone(),
            files: files.clone(),
        };
        self.store
            .with(|c| {
                messages::create_assistant_message(
                    c,
                    project_id,
                    &response,
                    MessageType::Result,
                    Some(fragment),
                )
            })
            .map_err(RunError::Store)?;

        tracing::info!(project_id, title = %title, files = files.len(), "Run result saved");

        Ok(RunArtifact {
            url,
            title,
            files,
            summary,
            outcome: RunOutcome::Success,
        })
    }

    /// Persist the fixed error message with no fragment.
    pub fn persist_error(&self, project_id: &str) -> Result<(), RunError> {
        self.store
            .with(|c| {
                messages::create_assistant_message(c, project_id, ERROR_MESSAGE, MessageType::Error, None)
            })
            .map(|_| ())
            .map_err(RunError::Store)
    }

    /// One stateless model call over the summary. Anything but usable text
    /// falls back to `fallback`.
    async fn generate(&self, system_prompt: &str, summary: &str, fallback: &str) -> String {
        let response = self
            .provider
            .chat_once(
                system_prompt,
                summary,
                &self.config.summary_model,
                self.config.temperature,
            )
            .await;

        match response {
            Ok(r) => r
                .text_content()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| fallback.to_string()),
            Err(e) => {
                tracing::warn!("Summary generation failed, using fallback: {e}");
                fallback.to_string()
            }
        }
    }
}
