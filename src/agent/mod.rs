//! The code agent and the loop that drives it.
//!
//! A run is: acquire a sandbox, hand the agent a [`state::RunState`], turn the
//! [`network::Network`] until the [`router`] halts it (or a cap is hit), then
//! let the [`finalizer`] persist the outcome.

pub mod code_agent;
pub mod finalizer;
pub mod network;
pub mod prompt;
pub mod router;
pub mod run;
pub mod state;
pub mod tier;

use crate::providers::ProviderError;
use crate::sandbox::SandboxError;
use crate::tools::ToolError;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Raised before the first agent turn; nothing has been persisted.
    #[error("sandbox provisioning failed: {0}")]
    Provisioning(#[source] SandboxError),
    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl RunError {
    /// Label used for the `outcome` metric dimension.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Provisioning(_) => "provisioning_failed",
            Self::Provider(_) => "provider_failed",
            Self::Tool(_) => "tool_failed",
            Self::Store(_) => "store_failed",
        }
    }
}
