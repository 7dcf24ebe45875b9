//! Docker sandbox provider: one local container per sandbox.
//!
//! Containers are created through [`bollard`] and kept alive with
//! `sleep infinity`; commands and file transfers go through `docker exec`.
//! Web ports 3000 (premium apps) and 8000 (free static server) are published
//! on random loopback ports, so hosts resolve to `http://localhost:{host_port}`.

use super::{OutputBuffers, SandboxClient, SandboxError, SANDBOX_WORKDIR};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogOutput, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, HostConfig, PortBinding};
use bollard::Docker;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const PUBLISHED_PORTS: [u16; 2] = [3000, 8000];

const SANDBOX_LABEL: &str = "dev.fragments.sandbox";

/// Budget for the internal exec calls behind file reads and writes.
const FILE_OP_TIMEOUT_MS: u64 = 30_000;

fn port_key(port: u16) -> String {
    format!("{port}/tcp")
}

/// Single-quote `raw` for `sh -c`, escaping embedded quotes.
fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

fn write_script(path: &str, content: &str) -> String {
    let parent = Path::new(path)
        .parent()
        .and_then(Path::to_str)
        .filter(|p| !p.is_empty())
        .unwrap_or("/");
    format!(
        "mkdir -p {} && printf '%s' {} | base64 -d > {}",
        shell_quote(parent),
        shell_quote(&BASE64.encode(content)),
        shell_quote(path)
    )
}

fn read_script(path: &str) -> String {
    format!("base64 -w0 {}", shell_quote(path))
}

fn host_port(inspect: &ContainerInspectResponse, port: u16) -> Option<u16> {
    inspect
        .network_settings
        .as_ref()?
        .ports
        .as_ref()?
        .get(&port_key(port))?
        .as_ref()?
        .iter()
        .find_map(|binding| binding.host_port.as_deref()?.parse().ok())
}

pub struct DockerSandboxClient {
    docker: Docker,
    image: String,
}

impl DockerSandboxClient {
    pub fn new(image: &str) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_defaults()
            .map_err(|e| anyhow::anyhow!("Failed to connect to Docker: {e}"))?;
        Ok(Self {
            docker,
            image: image.to_string(),
        })
    }

    /// Pull the image if needed. Per-layer errors (already present and the
    /// like) are only logged; a truly missing image fails at create time.
    async fn pull_image(&self) {
        let mut progress = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: self.image.as_str(),
                ..Default::default()
            }),
            None,
            None,
        );
        while let Some(item) = progress.next().await {
            if let Err(e) = item {
                tracing::debug!(image = %self.image, "Image pull: {e}");
            }
        }
    }

    async fn start_container(&self) -> Result<String, SandboxError> {
        let keys: Vec<String> = PUBLISHED_PORTS.iter().copied().map(port_key).collect();
        let port_bindings = keys
            .iter()
            .map(|key| {
                let binding = PortBinding {
                    host_ip: Some("127.0.0.1".to_string()),
                    host_port: Some("0".to_string()),
                };
                (key.clone(), Some(vec![binding]))
            })
            .collect();
        let exposed_ports = keys.iter().map(|k| (k.as_str(), HashMap::new())).collect();

        let config = ContainerConfig {
            image: Some(self.image.as_str()),
            cmd: Some(vec!["sleep", "infinity"]),
            working_dir: Some(SANDBOX_WORKDIR),
            labels: Some(HashMap::from([(SANDBOX_LABEL, "true")])),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let id = self
            .docker
            .create_container(None::<CreateContainerOptions<&str>>, config)
            .await
            .map_err(|e| SandboxError::Provisioning(format!("container create failed: {e}")))?
            .id;
        self.docker
            .start_container(&id, None::<StartContainerOptions<&str>>)
            .await
            .map_err(|e| SandboxError::Provisioning(format!("container start failed: {e}")))?;
        Ok(id)
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerInspectResponse, SandboxError> {
        self.docker
            .inspect_container(container_id, None)
            .await
            .map_err(|e| SandboxError::Unavailable {
                id: container_id.to_string(),
                reason: e.to_string(),
            })
    }

    /// Run `sh -c command`, streaming output into `buffers`. Returns the exit
    /// code; on timeout the buffers keep whatever arrived first.
    async fn exec(
        &self,
        container_id: &str,
        command: &str,
        workdir: &str,
        timeout_ms: u64,
        buffers: &mut OutputBuffers,
    ) -> Result<i64, SandboxError> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(vec!["sh", "-c", command]),
                    working_dir: Some(workdir),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SandboxError::Provider(format!("exec create failed: {e}")))?;

        let stream = async {
            let started = self
                .docker
                .start_exec(&exec.id, None)
                .await
                .map_err(|e| SandboxError::Provider(format!("exec start failed: {e}")))?;
            let StartExecResults::Attached { mut output, .. } = started else {
                return Ok(());
            };
            while let Some(chunk) = output.next().await {
                match chunk.map_err(|e| SandboxError::Provider(format!("exec stream: {e}")))? {
                    LogOutput::StdOut { message } => {
                        buffers.push_stdout(&String::from_utf8_lossy(&message))
                    }
                    LogOutput::StdErr { message } => {
                        buffers.push_stderr(&String::from_utf8_lossy(&message))
                    }
                    _ => {}
                }
            }
            Ok::<_, SandboxError>(())
        };

        tokio::time::timeout(Duration::from_millis(timeout_ms), stream)
            .await
            .map_err(|_| SandboxError::Timeout(timeout_ms))??;

        let status = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| SandboxError::Provider(format!("exec inspect failed: {e}")))?;
        Ok(status.exit_code.unwrap_or(0))
    }
}

#[async_trait]
impl SandboxClient for DockerSandboxClient {
    fn provider(&self) -> &str {
        "docker"
    }

    async fn create_sandbox(&self, _template: &str, _timeout_ms: u64) -> Result<String, SandboxError> {
        self.pull_image().await;
        let id = self.start_container().await?;

        let mut buffers = OutputBuffers::default();
        let prepare = format!("mkdir -p {}", shell_quote(SANDBOX_WORKDIR));
        match self.exec(&id, &prepare, "/", FILE_OP_TIMEOUT_MS, &mut buffers).await {
            Ok(0) => {
                tracing::info!(container = %id, image = %self.image, "Docker sandbox started");
                Ok(id)
            }
            Ok(code) => Err(SandboxError::Provisioning(format!(
                "workdir setup exited {code}: {}",
                buffers.stderr.trim()
            ))),
            Err(e) => Err(SandboxError::Provisioning(e.to_string())),
        }
    }

    async fn connect(&self, sandbox_id: &str) -> Result<(), SandboxError> {
        let inspect = self.inspect(sandbox_id).await?;
        if inspect.state.and_then(|s| s.running).unwrap_or(false) {
            Ok(())
        } else {
            Err(SandboxError::Unavailable {
                id: sandbox_id.to_string(),
                reason: "container is not running".to_string(),
            })
        }
    }

    async fn run_command(
        &self,
        sandbox_id: &str,
        command: &str,
        workdir: &str,
        timeout_ms: u64,
        buffers: &mut OutputBuffers,
    ) -> Result<i64, SandboxError> {
        self.exec(sandbox_id, command, workdir, timeout_ms, buffers).await
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> Result<(), SandboxError> {
        let mut buffers = OutputBuffers::default();
        let code = self
            .exec(sandbox_id, &write_script(path, content), "/", FILE_OP_TIMEOUT_MS, &mut buffers)
            .await?;
        if code != 0 {
            return Err(SandboxError::Provider(format!(
                "writing {path} exited {code}: {}",
                buffers.stderr.trim()
            )));
        }
        Ok(())
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<String, SandboxError> {
        let mut buffers = OutputBuffers::default();
        let code = self
            .exec(sandbox_id, &read_script(path), "/", FILE_OP_TIMEOUT_MS, &mut buffers)
            .await?;
        if code != 0 {
            return Err(SandboxError::FileNotFound(path.to_string()));
        }

        let bytes = BASE64
            .decode(buffers.stdout.trim())
            .map_err(|e| SandboxError::Provider(format!("{path}: bad base64 from sandbox: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| SandboxError::Provider(format!("{path} is not UTF-8: {e}")))
    }

    async fn get_host(&self, sandbox_id: &str, port: u16) -> Result<String, SandboxError> {
        let inspect = self.inspect(sandbox_id).await?;
        let published = host_port(&inspect, port)
            .ok_or_else(|| SandboxError::Provider(format!("port {port} is not published")))?;
        Ok(format!("http://localhost:{published}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::NetworkSettings;

    #[test]
    fn quoting_survives_embedded_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn write_script_creates_parent_and_decodes() {
        let script = write_script("/home/user/app/page.tsx", "hi");
        assert!(script.starts_with("mkdir -p '/home/user/app' && "));
        assert!(script.contains(&format!("'{}'", BASE64.encode("hi"))));
        assert!(script.ends_with("base64 -d > '/home/user/app/page.tsx'"));
    }

    #[test]
    fn write_script_for_bare_name_uses_root() {
        assert!(write_script("index.html", "").starts_with("mkdir -p '/' && "));
    }

    #[test]
    fn host_port_reads_first_binding() {
        let inspect = ContainerInspectResponse {
            network_settings: Some(NetworkSettings {
                ports: Some(HashMap::from([
                    (
                        port_key(8000),
                        Some(vec![PortBinding {
                            host_ip: Some("127.0.0.1".into()),
                            host_port: Some("49153".into()),
                        }]),
                    ),
                    (port_key(3000), None),
                ])),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(host_port(&inspect, 8000), Some(49153));
        assert_eq!(host_port(&inspect, 3000), None);
        assert_eq!(host_port(&inspect, 5173), None);
    }
}
