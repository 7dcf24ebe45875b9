//! Fragments: turns a natural-language build request into a running web app.
//!
//! A run acquires an isolated sandbox, drives a tool-using LLM agent through a
//! router-checked loop until it emits a task summary (or runs out of
//! iterations), then persists the outcome together with the generated files
//! and the sandbox preview URL.

pub mod agent;
pub mod config;
pub mod gateway;
pub mod jobs;
pub mod observability;
pub mod providers;
pub mod sandbox;
pub mod store;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent::run::{RunArtifact, RunRequest, Services};
pub use agent::tier::Tier;
pub use config::Config;
