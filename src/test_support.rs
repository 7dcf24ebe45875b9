//! In-memory doubles for the sandbox and the model provider.

use crate::agent::run::Services;
use crate::config::Config;
use crate::observability::Metrics;
use crate::providers::{ChatMessage, ChatRequest, ChatResponse, Provider, ProviderError, Role, ToolCall};
use crate::sandbox::{OutputBuffers, SandboxClient, SandboxError, SandboxGateway, SandboxHandle};
use crate::store::Store;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

// ── MockSandbox ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockState {
    sandboxes: Vec<String>,
    /// Shared file tree, keyed by absolute path.
    files: HashMap<String, String>,
    scripted: HashMap<String, (String, String, i64)>,
    next_command_failure: Option<(String, String)>,
    next_command_timeout: Option<String>,
    /// (sandbox id, port) per running server process.
    servers: Vec<(String, u16)>,
    commands: Vec<String>,
    fail_provisioning: bool,
    fail_connect: bool,
    fail_writes: bool,
    fail_hosts: bool,
    fail_primary_server: bool,
    fail_all_servers: bool,
}

/// Sandbox provider that keeps everything in memory and emulates the few
/// shell commands the tools rely on (server start/kill and the HTTP probe).
#[derive(Default)]
pub struct MockSandbox {
    state: Mutex<MockState>,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_provisioning(&self) {
        self.state.lock().fail_provisioning = true;
    }

    pub fn fail_connect(&self) {
        self.state.lock().fail_connect = true;
    }

    pub fn fail_writes(&self) {
        self.state.lock().fail_writes = true;
    }

    pub fn fail_hosts(&self) {
        self.state.lock().fail_hosts = true;
    }

    /// The primary server mechanism starts but never binds.
    pub fn fail_primary_server(&self) {
        self.state.lock().fail_primary_server = true;
    }

    pub fn fail_all_servers(&self) {
        self.state.lock().fail_all_servers = true;
    }

    /// The next command streams `stdout` and then fails with `error`.
    pub fn fail_next_command(&self, stdout: &str, error: &str) {
        self.state.lock().next_command_failure = Some((stdout.to_string(), error.to_string()));
    }

    /// The next command streams `stdout` and then runs out of time.
    pub fn time_out_next_command(&self, stdout: &str) {
        self.state.lock().next_command_timeout = Some(stdout.to_string());
    }

    /// Fixed output for an exact command string.
    pub fn script_command(&self, command: &str, stdout: &str, stderr: &str, exit_code: i64) {
        self.state.lock().scripted.insert(
            command.to_string(),
            (stdout.to_string(), stderr.to_string(), exit_code),
        );
    }

    pub fn seed_files(&self, files: impl IntoIterator<Item = (String, String)>) {
        self.state.lock().files.extend(files);
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state.lock().files.get(path).cloned()
    }

    pub fn sandbox_count(&self) -> usize {
        self.state.lock().sandboxes.len()
    }

    pub fn live_servers(&self, sandbox_id: &str, port: u16) -> usize {
        self.state
            .lock()
            .servers
            .iter()
            .filter(|(id, p)| id == sandbox_id && *p == port)
            .count()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    fn ensure_live(state: &MockState, sandbox_id: &str) -> Result<(), SandboxError> {
        if state.fail_connect || !state.sandboxes.iter().any(|s| s == sandbox_id) {
            return Err(SandboxError::Unavailable {
                id: sandbox_id.to_string(),
                reason: "not found".to_string(),
            });
        }
        Ok(())
    }
}

/// First `-p <port>` / `http.server <port>` / `localhost:<port>` in a command.
fn port_in(command: &str) -> u16 {
    let patterns = ["http.server ", "-p ", "localhost:"];
    patterns
        .iter()
        .filter_map(|p| command.split(p).nth(1))
        .filter_map(|rest| {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .next()
        .unwrap_or(crate::tools::site::SITE_PORT)
}

#[async_trait]
impl SandboxClient for MockSandbox {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn create_sandbox(&self, _template: &str, _timeout_ms: u64) -> Result<String, SandboxError> {
        let mut state = self.state.lock();
        if state.fail_provisioning {
            return Err(SandboxError::Provider("quota exceeded".to_string()));
        }
        let id = format!("sbx-{}", state.sandboxes.len() + 1);
        state.sandboxes.push(id.clone());
        Ok(id)
    }

    async fn connect(&self, sandbox_id: &str) -> Result<(), SandboxError> {
        Self::ensure_live(&self.state.lock(), sandbox_id)
    }

    async fn run_command(
        &self,
        sandbox_id: &str,
        command: &str,
        _workdir: &str,
        timeout_ms: u64,
        buffers: &mut OutputBuffers,
    ) -> Result<i64, SandboxError> {
        let mut state = self.state.lock();
        Self::ensure_live(&state, sandbox_id)?;
        state.commands.push(command.to_string());

        if let Some(stdout) = state.next_command_timeout.take() {
            buffers.push_stdout(&stdout);
            return Err(SandboxError::Timeout(timeout_ms));
        }

        if let Some((stdout, error)) = state.next_command_failure.take() {
            buffers.push_stdout(&stdout);
            return Err(SandboxError::Provider(error));
        }

        if let Some((stdout, stderr, code)) = state.scripted.get(command) {
            buffers.push_stdout(stdout);
            buffers.push_stderr(stderr);
            return Ok(*code);
        }

        let port = port_in(command);
        if command.contains("fuser -k") {
            state.servers.retain(|(id, p)| !(id == sandbox_id && *p == port));
            return Ok(0);
        }
        if command.contains("curl") {
            let up = state
                .servers
                .iter()
                .any(|(id, p)| id == sandbox_id && *p == port);
            buffers.push_stdout(if up { "200\n" } else { "000\n" });
            return Ok(if up { 0 } else { 1 });
        }
        let binds = if command.contains("python3 -m http.server") {
            !state.fail_primary_server && !state.fail_all_servers
        } else if command.contains("http-server") {
            !state.fail_all_servers
        } else {
            false
        };
        if binds {
            state.servers.push((sandbox_id.to_string(), port));
        }
        Ok(0)
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> Result<(), SandboxError> {
        let mut state = self.state.lock();
        Self::ensure_live(&state, sandbox_id)?;
        if state.fail_writes {
            return Err(SandboxError::Provider("disk full".to_string()));
        }
        state.files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<String, SandboxError> {
        let state = self.state.lock();
        Self::ensure_live(&state, sandbox_id)?;
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| SandboxError::FileNotFound(path.to_string()))
    }

    async fn get_host(&self, sandbox_id: &str, port: u16) -> Result<String, SandboxError> {
        let state = self.state.lock();
        Self::ensure_live(&state, sandbox_id)?;
        if state.fail_hosts {
            return Err(SandboxError::Provider("no host".to_string()));
        }
        Ok(format!("https://{port}-{sandbox_id}.sandbox.test"))
    }
}

/// A mock with one acquired sandbox, the gateway over it, and its handle.
pub async fn sandbox_fixture() -> (Arc<MockSandbox>, SandboxGateway, SandboxHandle) {
    let mock = Arc::new(MockSandbox::new());
    let gateway = SandboxGateway::new(mock.clone(), 5_000);
    let handle = gateway
        .acquire("test-template", 60_000)
        .await
        .expect("mock sandbox");
    (mock, gateway, handle)
}

// ── ScriptedProvider ────────────────────────────────────────────────────────────

/// What a [`ScriptedProvider`] was asked.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub temperature: f64,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<String>,
}

/// Provider that replays canned responses in order.
///
/// Requests whose system prompt matches a [`reply_to_system`] entry get that
/// reply instead of the next scripted one, so concurrent single-turn calls
/// stay deterministic.
///
/// [`reply_to_system`]: ScriptedProvider::reply_to_system
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    by_system: Vec<(String, ChatResponse)>,
    repeat: Option<ChatResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: impl IntoIterator<Item = ChatResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Ok).collect()),
            by_system: Vec::new(),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `response`.
    pub fn repeating(response: ChatResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new([])
        }
    }

    pub fn reply_to_system(mut self, system_prompt: &str, response: ChatResponse) -> Self {
        self.by_system.push((system_prompt.to_string(), response));
        self
    }

    pub fn push_error(&self, error: ProviderError) {
        self.script.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().push(RecordedRequest {
            model: request.model.to_string(),
            temperature: request.temperature,
            messages: request.messages.to_vec(),
            tools: request.tools.iter().map(|t| t.name.clone()).collect(),
        });

        let system = request
            .messages
            .first()
            .filter(|m| m.role == Role::System)
            .and_then(|m| m.content.as_deref());
        if let Some((_, reply)) = self
            .by_system
            .iter()
            .find(|(prompt, _)| Some(prompt.as_str()) == system)
        {
            return Ok(reply.clone());
        }

        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        self.repeat.clone().ok_or_else(|| ProviderError::Api {
            status: 500,
            message: "script exhausted".to_string(),
        })
    }
}

/// A response requesting one tool call.
pub fn tool_call(id: &str, name: &str, arguments: &str) -> ChatResponse {
    ChatResponse {
        content: None,
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }],
    }
}

/// Services over the given doubles, an in-memory store and default config.
pub fn services(provider: Arc<ScriptedProvider>, sandbox: Arc<MockSandbox>) -> Services {
    let config = Config::default();
    Services {
        provider,
        sandbox: SandboxGateway::new(sandbox, config.sandbox.command_timeout_ms),
        store: Store::open_in_memory().expect("in-memory store"),
        metrics: Arc::new(Metrics::new().expect("metrics registry")),
        config: Arc::new(config),
    }
}
