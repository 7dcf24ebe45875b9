//! Execution policies. Each tier is a static profile picked when a run is
//! constructed; nothing branches on the tier inside the loop.

use super::prompt::{FREE_SYSTEM_PROMPT, PREMIUM_SYSTEM_PROMPT};
use crate::config::{AgentConfig, SandboxConfig};
use crate::tools::site::{BASE_SCAFFOLD, SITE_PORT};
use crate::tools::ToolRegistry;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    /// Job name a run of this tier is enqueued under.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Free => "free-tier-code-agent/run",
            Self::Premium => "code-agent/run",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Free => "Free tier",
            Self::Premium => "Premium tier",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a tier decides about a run.
pub trait TierProfile: Send + Sync + 'static {
    const TIER: Tier;
    /// Port the generated app is served on.
    const WEB_PORT: u16;
    /// Whether a successful run gets model-generated title and response.
    const GENERATES_TITLE: bool;
    /// Whether prior project messages are replayed into the conversation.
    const USES_HISTORY: bool;

    fn system_prompt() -> &'static str;
    fn model(config: &AgentConfig) -> &str;
    fn max_iterations(config: &AgentConfig) -> usize;
    fn template(config: &SandboxConfig) -> &str;
    fn tools() -> ToolRegistry;
    /// Files written into the sandbox before the first turn.
    fn scaffold() -> &'static [(&'static str, &'static str)];
}

pub struct FreeTier;

impl TierProfile for FreeTier {
    const TIER: Tier = Tier::Free;
    const WEB_PORT: u16 = SITE_PORT;
    const GENERATES_TITLE: bool = false;
    const USES_HISTORY: bool = false;

    fn system_prompt() -> &'static str {
        FREE_SYSTEM_PROMPT
    }

    fn model(config: &AgentConfig) -> &str {
        &config.free_model
    }

    fn max_iterations(config: &AgentConfig) -> usize {
        config.free_max_iterations
    }

    fn template(config: &SandboxConfig) -> &str {
        &config.free_template
    }

    fn tools() -> ToolRegistry {
        ToolRegistry::free()
    }

    fn scaffold() -> &'static [(&'static str, &'static str)] {
        &BASE_SCAFFOLD
    }
}

pub struct PremiumTier;

impl TierProfile for PremiumTier {
    const TIER: Tier = Tier::Premium;
    const WEB_PORT: u16 = 3000;
    const GENERATES_TITLE: bool = true;
    const USES_HISTORY: bool = true;

    fn system_prompt() -> &'static str {
        PREMIUM_SYSTEM_PROMPT
    }

    fn model(config: &AgentConfig) -> &str {
        &config.premium_model
    }

    fn max_iterations(config: &AgentConfig) -> usize {
        config.premium_max_iterations
    }

    fn template(config: &SandboxConfig) -> &str {
        &config.premium_template
    }

    fn tools() -> ToolRegistry {
        ToolRegistry::premium()
    }

    fn scaffold() -> &'static [(&'static str, &'static str)] {
        &[]
    }
}
