//! Sandbox abstraction layer.
//!
//! Defines the [`SandboxClient`] trait that sandbox providers implement and
//! the [`SandboxGateway`] every run talks to. Two providers exist:
//!
//! - [`e2b::E2bSandboxClient`]: E2B cloud MicroVM (requires `E2B_API_KEY`)
//! - [`docker::DockerSandboxClient`]: local Docker container
//!
//! Clients are stateless with respect to which sandbox is active: every call
//! names its sandbox id, so one client can serve many concurrent runs. The
//! run owns its [`SandboxHandle`] and resolves it before each operation.

pub mod docker;
pub mod e2b;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Working directory inside every sandbox; relative paths resolve against it.
pub const SANDBOX_WORKDIR: &str = "/home/user";

/// Identity of one provisioned sandbox. Stable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxHandle {
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to create sandbox: {0}")]
    Provisioning(String),
    #[error("sandbox {id} is unavailable: {reason}")]
    Unavailable { id: String, reason: String },
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("command timed out after {0}ms")]
    Timeout(u64),
    #[error("{0}")]
    Provider(String),
}

/// Append-only stdout/stderr buffers filled while a command runs.
///
/// Owned by the caller so whatever arrived before a failure survives it.
#[derive(Debug, Default, Clone)]
pub struct OutputBuffers {
    pub stdout: String,
    pub stderr: String,
}

impl OutputBuffers {
    pub fn push_stdout(&mut self, chunk: &str) {
        self.stdout.push_str(chunk);
    }

    pub fn push_stderr(&mut self, chunk: &str) {
        self.stderr.push_str(chunk);
    }
}

/// Result of a sandbox command as seen by the rest of the system.
///
/// `error` is set when the command could not complete (transport failure,
/// timeout); `exit_code` is `None` in that case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i64>,
    pub error: Option<String>,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }

    /// Reason the command failed, if it did.
    pub fn failure_reason(&self) -> Option<String> {
        if let Some(err) = &self.error {
            return Some(err.clone());
        }
        match self.exit_code {
            Some(0) => None,
            Some(code) => Some(format!("exit code {code}")),
            None => Some("no exit status".to_string()),
        }
    }
}

/// Provider-agnostic sandbox interface.
#[async_trait]
pub trait SandboxClient: Send + Sync {
    /// Provider name for logs.
    fn provider(&self) -> &str;

    /// Provision a fresh sandbox from `template`. Returns its id.
    async fn create_sandbox(&self, template: &str, timeout_ms: u64) -> Result<String, SandboxError>;

    /// Verify that `sandbox_id` is alive and reachable.
    async fn connect(&self, sandbox_id: &str) -> Result<(), SandboxError>;

    /// Run a shell command, appending output to `buffers` as it arrives.
    /// Returns the exit code.
    async fn run_command(
        &self,
        sandbox_id: &str,
        command: &str,
        workdir: &str,
        timeout_ms: u64,
        buffers: &mut OutputBuffers,
    ) -> Result<i64, SandboxError>;

    /// Overwrite `path` with `content`, creating parent directories.
    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> Result<(), SandboxError>;

    /// Read `path` as UTF-8. Missing files yield [`SandboxError::FileNotFound`].
    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<String, SandboxError>;

    /// Externally reachable URL for a service bound to `port`.
    async fn get_host(&self, sandbox_id: &str, port: u16) -> Result<String, SandboxError>;
}

/// Entry point used by runs: provisions sandboxes and re-attaches to them.
#[derive(Clone)]
pub struct SandboxGateway {
    client: Arc<dyn SandboxClient>,
    command_timeout_ms: u64,
}

impl SandboxGateway {
    pub fn new(client: Arc<dyn SandboxClient>, command_timeout_ms: u64) -> Self {
        Self {
            client,
            command_timeout_ms,
        }
    }

    /// Create a fresh sandbox. Failure is fatal to the run; no retry here.
    pub async fn acquire(&self, template: &str, timeout_ms: u64) -> Result<SandboxHandle, SandboxError> {
        let id = self
            .client
            .create_sandbox(template, timeout_ms)
            .await
            .map_err(|e| match e {
                SandboxError::Provisioning(_) => e,
                other => SandboxError::Provisioning(other.to_string()),
            })?;
        tracing::info!(
            sandbox_id = %id,
            provider = self.client.provider(),
            template,
            "Sandbox acquired"
        );
        Ok(SandboxHandle { id })
    }

    /// Re-attach to a previously acquired sandbox.
    pub async fn resolve(&self, handle: &SandboxHandle) -> Result<Sandbox, SandboxError> {
        self.client.connect(&handle.id).await?;
        Ok(Sandbox {
            client: Arc::clone(&self.client),
            id: handle.id.clone(),
            command_timeout_ms: self.command_timeout_ms,
        })
    }
}

/// A live connection to one sandbox.
pub struct Sandbox {
    client: Arc<dyn SandboxClient>,
    id: String,
    command_timeout_ms: u64,
}

impl Sandbox {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        self.client
            .write_file(&self.id, &resolve_path(path), content)
            .await
    }

    pub async fn read_file(&self, path: &str) -> Result<String, SandboxError> {
        self.client.read_file(&self.id, &resolve_path(path)).await
    }

    /// Run `command` in the sandbox working directory.
    ///
    /// Never fails: provider errors and timeouts are folded into
    /// [`CommandOutput::error`] alongside whatever output had been produced.
    pub async fn run_command(&self, command: &str) -> CommandOutput {
        let mut buffers = OutputBuffers::default();
        let result = self
            .client
            .run_command(
                &self.id,
                command,
                SANDBOX_WORKDIR,
                self.command_timeout_ms,
                &mut buffers,
            )
            .await;

        match result {
            Ok(exit_code) => CommandOutput {
                stdout: buffers.stdout,
                stderr: buffers.stderr,
                exit_code: Some(exit_code),
                error: None,
            },
            Err(e) => {
                tracing::warn!(sandbox_id = %self.id, "Sandbox command failed: {e}");
                CommandOutput {
                    stdout: buffers.stdout,
                    stderr: buffers.stderr,
                    exit_code: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Public URL for `port`, or `None` when it cannot be resolved yet.
    pub async fn host_for(&self, port: u16) -> Option<String> {
        match self.client.get_host(&self.id, port).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(sandbox_id = %self.id, port, "Sandbox URL unavailable: {e}");
                None
            }
        }
    }
}

/// Absolute path inside the sandbox for a possibly relative `path`.
pub fn resolve_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!(
            "{SANDBOX_WORKDIR}/{}",
            path.trim_start_matches("./")
        )
    }
}
