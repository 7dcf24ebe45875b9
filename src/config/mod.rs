//! Configuration loading.
//!
//! The config file is TOML, looked up at `$FRAGMENTS_CONFIG` or the platform
//! config directory. Secrets may also come from the environment.

pub mod schema;

pub use schema::{
    AgentConfig, Config, GatewayConfig, ProviderConfig, SandboxBackend, SandboxConfig,
    StoreConfig, UsageConfig,
};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Default location of the config file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("FRAGMENTS_CONFIG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(shellexpand::tilde(&path).into_owned()));
        }
    }
    directories::ProjectDirs::from("dev", "fragments", "fragments")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load the config from `path` (or the default location), then apply
    /// environment overrides. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = path.map(Path::to_path_buf).or_else(default_config_path);

        let mut config = match resolved {
            Some(ref p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file {}", p.display()))?;
                Self::from_toml(&raw)
                    .with_context(|| format!("Failed to parse config file {}", p.display()))?
            }
            _ => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_env("OPENAI_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(key) = non_empty_env("E2B_API_KEY") {
            self.sandbox.e2b_api_key = Some(key);
        }
        if let Some(path) = non_empty_env("FRAGMENTS_DB_PATH") {
            self.store.db_path = path;
        }
    }

    /// Database path with `~` and environment variables expanded.
    pub fn db_path(&self) -> PathBuf {
        let expanded = shellexpand::full(&self.store.db_path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| self.store.db_path.clone());
        PathBuf::from(expanded)
    }

    /// Mask API keys before the config is printed.
    pub fn redact_secrets(&mut self) {
        for key in [&mut self.provider.api_key, &mut self.sandbox.e2b_api_key] {
            if key.is_some() {
                *key = Some("***".to_string());
            }
        }
    }

    /// JSON Schema of the full configuration, for `fragments config schema`.
    pub fn json_schema() -> serde_json::Value {
        schemars::schema_for!(Config).to_value()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
