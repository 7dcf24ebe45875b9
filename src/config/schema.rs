//! Configuration schema for Fragments.
//!
//! Every section is `#[serde(default)]` so a partial (or missing) config file
//! yields a usable configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub sandbox: SandboxConfig,
    pub agent: AgentConfig,
    pub store: StoreConfig,
    pub gateway: GatewayConfig,
    pub usage: UsageConfig,
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Overridden by `OPENAI_API_KEY` when set.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

/// Which sandbox provider backs the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SandboxBackend {
    #[default]
    E2b,
    Docker,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SandboxConfig {
    pub backend: SandboxBackend,
    /// Overridden by `E2B_API_KEY` when set.
    pub e2b_api_key: Option<String>,
    pub e2b_api_base: String,
    /// Template used for premium runs (Next.js toolchain preinstalled).
    pub premium_template: String,
    /// Template used for free runs (plain static site).
    pub free_template: String,
    /// Container image for the docker backend.
    pub docker_image: String,
    /// Lifetime requested for a freshly created sandbox.
    pub sandbox_timeout_ms: u64,
    /// Upper bound for a single shell command inside the sandbox.
    pub command_timeout_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: SandboxBackend::E2b,
            e2b_api_key: None,
            e2b_api_base: crate::sandbox::e2b::E2B_API_BASE.to_string(),
            premium_template: "fragments-nextjs".to_string(),
            free_template: "fragments-static".to_string(),
            docker_image: "node:20-bookworm".to_string(),
            sandbox_timeout_ms: 1_800_000,
            command_timeout_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AgentConfig {
    pub premium_model: String,
    pub free_model: String,
    /// Model used for the title and response generators after a premium run.
    pub summary_model: String,
    pub temperature: f64,
    pub premium_max_iterations: usize,
    pub free_max_iterations: usize,
    /// Number of prior project messages replayed to premium runs.
    pub history_limit: usize,
    /// Wall-clock budget for one run; `0` disables the deadline.
    pub run_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            premium_model: "gpt-4.1".to_string(),
            free_model: "gpt-4.1-mini".to_string(),
            summary_model: "gpt-4o".to_string(),
            temperature: 0.1,
            premium_max_iterations: 15,
            free_max_iterations: 8,
            history_limit: 5,
            run_timeout_secs: 1_200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path; `~` is expanded. Overridden by `FRAGMENTS_DB_PATH`.
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "~/.fragments/fragments.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4100,
            body_limit_bytes: 256 * 1024,
            request_timeout_secs: 30,
        }
    }
}

/// Credit window applied before premium runs are enqueued.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct UsageConfig {
    pub free_points: u32,
    pub duration_secs: u64,
    pub generation_cost: u32,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            free_points: 2,
            duration_secs: 30 * 24 * 60 * 60,
            generation_cost: 1,
        }
    }
}
