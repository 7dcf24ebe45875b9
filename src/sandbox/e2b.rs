//! E2B sandbox provider: HTTP client for the E2B REST API.

use super::{OutputBuffers, SandboxClient, SandboxError};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const E2B_API_BASE: &str = "https://api.e2b.dev";

#[derive(Deserialize)]
struct CreatedSandbox {
    #[serde(rename = "sandboxID", alias = "sandbox_id", default)]
    sandbox_id: String,
}

#[derive(Deserialize)]
struct CommandResult {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(rename = "exitCode", alias = "exit_code", default)]
    exit_code: i64,
}

#[derive(Deserialize)]
struct HostInfo {
    #[serde(alias = "host")]
    url: String,
}

/// Non-2xx reply, with the body kept for the error message.
struct ApiFailure {
    status: StatusCode,
    body: String,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E2B API returned {}: {}", self.status, self.body)
    }
}

pub struct E2bSandboxClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl E2bSandboxClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build E2B HTTP client: {e}"))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self, tail: &str) -> String {
        format!("{}/v0/sandboxes{tail}", self.base_url)
    }

    fn get(&self, tail: &str) -> RequestBuilder {
        self.http.get(self.endpoint(tail)).bearer_auth(&self.api_key)
    }

    fn post(&self, tail: &str) -> RequestBuilder {
        self.http.post(self.endpoint(tail)).bearer_auth(&self.api_key)
    }
}

/// Split a response into its body text or an [`ApiFailure`].
async fn read_body(resp: reqwest::Response) -> Result<String, ApiFailure> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    if status.is_success() {
        Ok(body)
    } else {
        Err(ApiFailure { status, body })
    }
}

fn provider_err(action: &str, e: impl std::fmt::Display) -> SandboxError {
    SandboxError::Provider(format!("E2B {action}: {e}"))
}

fn with_scheme(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[async_trait]
impl SandboxClient for E2bSandboxClient {
    fn provider(&self) -> &str {
        "e2b"
    }

    async fn create_sandbox(&self, template: &str, timeout_ms: u64) -> Result<String, SandboxError> {
        if self.api_key.is_empty() {
            return Err(SandboxError::Provisioning("E2B_API_KEY is not set".to_string()));
        }

        let resp = self
            .post("")
            .json(&serde_json::json!({
                "templateID": template,
                "timeout": timeout_ms / 1000,
            }))
            .send()
            .await
            .map_err(|e| SandboxError::Provisioning(format!("E2B create request failed: {e}")))?;
        let body = read_body(resp)
            .await
            .map_err(|f| SandboxError::Provisioning(f.to_string()))?;

        let created: CreatedSandbox = serde_json::from_str(&body).map_err(|e| {
            SandboxError::Provisioning(format!("unexpected E2B create reply ({e}): {body}"))
        })?;
        if created.sandbox_id.is_empty() {
            return Err(SandboxError::Provisioning(format!(
                "E2B create reply had no sandbox id: {body}"
            )));
        }

        tracing::info!(sandbox_id = %created.sandbox_id, %template, "E2B sandbox created");
        Ok(created.sandbox_id)
    }

    async fn connect(&self, sandbox_id: &str) -> Result<(), SandboxError> {
        let unavailable = |reason: String| SandboxError::Unavailable {
            id: sandbox_id.to_string(),
            reason,
        };

        let resp = self
            .get(&format!("/{sandbox_id}"))
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        read_body(resp)
            .await
            .map(drop)
            .map_err(|f| unavailable(f.to_string()))
    }

    /// The commands endpoint replies with the whole output at once, so a
    /// command that hits `timeout_ms` leaves `buffers` empty.
    async fn run_command(
        &self,
        sandbox_id: &str,
        command: &str,
        workdir: &str,
        timeout_ms: u64,
        buffers: &mut OutputBuffers,
    ) -> Result<i64, SandboxError> {
        let limit = Duration::from_millis(timeout_ms);
        let request = self
            .post(&format!("/{sandbox_id}/commands"))
            .timeout(limit)
            .json(&serde_json::json!({
                "cmd": command,
                "workdir": workdir,
                "timeout": timeout_ms / 1000,
            }))
            .send();

        let resp = match tokio::time::timeout(limit, request).await {
            Err(_) => return Err(SandboxError::Timeout(timeout_ms)),
            Ok(Err(e)) if e.is_timeout() => return Err(SandboxError::Timeout(timeout_ms)),
            Ok(Err(e)) => return Err(provider_err("run_command", e)),
            Ok(Ok(resp)) => resp,
        };
        let body = read_body(resp)
            .await
            .map_err(|f| provider_err("run_command", f))?;

        let result: CommandResult = serde_json::from_str(&body)
            .map_err(|e| provider_err("run_command", format!("unexpected reply ({e}): {body}")))?;
        buffers.push_stdout(&result.stdout);
        buffers.push_stderr(&result.stderr);
        Ok(result.exit_code)
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> Result<(), SandboxError> {
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let part = reqwest::multipart::Part::bytes(content.as_bytes().to_vec())
            .file_name(file_name)
            .mime_str("text/plain")
            .map_err(|e| provider_err("write_file", e))?;
        let form = reqwest::multipart::Form::new()
            .text("path", path.to_string())
            .part("file", part);

        let resp = self
            .post(&format!("/{sandbox_id}/files"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| provider_err("write_file", e))?;
        read_body(resp)
            .await
            .map(drop)
            .map_err(|f| provider_err("write_file", f))
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<String, SandboxError> {
        let resp = self
            .get(&format!("/{sandbox_id}/files"))
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| provider_err("read_file", e))?;

        match read_body(resp).await {
            Ok(body) => Ok(body),
            Err(f) if f.status == StatusCode::NOT_FOUND => {
                Err(SandboxError::FileNotFound(path.to_string()))
            }
            Err(f) => Err(provider_err("read_file", f)),
        }
    }

    async fn get_host(&self, sandbox_id: &str, port: u16) -> Result<String, SandboxError> {
        let resp = self
            .get(&format!("/{sandbox_id}/hosts/{port}"))
            .send()
            .await
            .map_err(|e| provider_err("get_host", e))?;
        let body = read_body(resp)
            .await
            .map_err(|f| provider_err("get_host", format!("{f} (is a server listening on {port}?)")))?;

        // Either a JSON object or the bare host string.
        let host = serde_json::from_str::<HostInfo>(&body)
            .map(|info| info.url)
            .unwrap_or_else(|_| body.trim().trim_matches('"').to_string());
        if host.is_empty() {
            return Err(provider_err("get_host", format!("no host for port {port}")));
        }
        Ok(with_scheme(&host))
    }
}
