//! The run loop: one agent, re-invoked until the router halts it.

use super::code_agent::{Agent, AgentTurnResult};
use super::router::{route, Route};
use super::state::RunState;
use super::tier::TierProfile;
use super::RunError;
use crate::config::AgentConfig;
use crate::observability::Metrics;
use crate::providers::{ChatMessage, Provider};
use crate::sandbox::{SandboxGateway, SandboxHandle};
use crate::tools::ToolContext;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The router saw a summary.
    Halted,
    /// The tier's iteration cap was reached first.
    IterationLimit,
    /// The run wall-clock budget ran out before a turn.
    Deadline,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Halted => "halted",
            Self::IterationLimit => "iteration_limit",
            Self::Deadline => "deadline",
        }
    }
}

#[derive(Debug)]
pub struct NetworkOutcome {
    pub state: RunState,
    pub transcript: Vec<ChatMessage>,
    pub iterations: usize,
    pub exit: ExitReason,
}

/// Collaborators a network borrows for one run.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub provider: &'a dyn Provider,
    pub gateway: &'a SandboxGateway,
    pub handle: &'a SandboxHandle,
    pub metrics: &'a Metrics,
}

pub struct Network<T: TierProfile> {
    agent: Agent,
    max_iterations: usize,
    /// `None` when the deadline is disabled.
    run_timeout: Option<Duration>,
    _tier: PhantomData<T>,
}

impl<T: TierProfile> Network<T> {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            agent: Agent {
                name: "code-agent".to_string(),
                system_prompt: T::system_prompt().to_string(),
                model: T::model(config).to_string(),
                temperature: config.temperature,
                tools: T::tools(),
            },
            max_iterations: T::max_iterations(config),
            run_timeout: (config.run_timeout_secs > 0)
                .then(|| Duration::from_secs(config.run_timeout_secs)),
            _tier: PhantomData,
        }
    }

    /// Drive the agent over `conversation` until halt, cap or deadline.
    ///
    /// Turns run strictly one after another and the tool calls of a turn are
    /// dispatched in order. Provider errors and fatal tool errors abort the
    /// loop without consulting the router.
    pub async fn run(
        &self,
        ctx: RunContext<'_>,
        conversation: Vec<ChatMessage>,
    ) -> Result<NetworkOutcome, RunError> {
        let tier = T::TIER.as_str();
        let started = Instant::now();
        let mut state = RunState::default();
        let mut transcript = conversation;
        let mut iterations = 0;

        tracing::info!(
            agent = %self.agent.name,
            tier,
            model = %self.agent.model,
            max_iterations = self.max_iterations,
            "Starting agent network"
        );

        let exit = loop {
            if iterations >= self.max_iterations {
                tracing::warn!(tier, iterations, "Iteration limit reached without a task summary");
                break ExitReason::IterationLimit;
            }
            if self.run_timeout.is_some_and(|t| started.elapsed() >= t) {
                tracing::warn!(tier, iterations, "Run deadline reached");
                break ExitReason::Deadline;
            }

            iterations += 1;
            ctx.metrics.record_turn(tier);
            let result = self.agent.turn(ctx.provider, &transcript).await?;
            self.agent.on_response(&result, &mut state);

            match result {
                AgentTurnResult::Message(text) => {
                    tracing::debug!(iteration = iterations, "Agent replied without tool calls");
                    transcript.push(ChatMessage::assistant(text));
                }
                AgentTurnResult::ToolCalls { text, calls } => {
                    tracing::debug!(iteration = iterations, calls = calls.len(), "Agent requested tools");
                    transcript.push(ChatMessage::assistant_tool_calls(text, calls.clone()));
                    for call in &calls {
                        let mut tool_ctx = ToolContext {
                            gateway: ctx.gateway,
                            handle: ctx.handle,
                            state: &mut state,
                        };
                        let invocation = self.agent.tools.dispatch(call, &mut tool_ctx).await?;
                        ctx.metrics
                            .record_tool_call(&invocation.name, invocation.result.success);
                        transcript.push(ChatMessage::tool_result(
                            call.id.as_str(),
                            invocation.result.render(),
                        ));
                    }
                }
            }

            if route(&state) == Route::Halt {
                break ExitReason::Halted;
            }
        };

        ctx.metrics.record_iterations(tier, iterations);
        tracing::info!(
            tier,
            iterations,
            exit = exit.as_str(),
            files = state.files.len(),
            "Agent network finished"
        );

        Ok(NetworkOutcome {
            state,
            transcript,
            iterations,
            exit,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_limits(mut self, max_iterations: usize, run_timeout: Duration) -> Self {
        self.max_iterations = max_iterations;
        self.run_timeout = Some(run_timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tier::{FreeTier, PremiumTier};
    use crate::providers::{ChatResponse, ProviderError, Role};
    use crate::test_support::{sandbox_fixture, tool_call, ScriptedProvider};
    use crate::tools::ToolError;

    #[tokio::test]
    async fn halts_after_summary_turn() {
        let (_mock, gateway, handle) = sandbox_fixture().await;
        let metrics = Metrics::new().unwrap();
        let provider = ScriptedProvider::new([
            tool_call("c1", "createOrUpdateFiles", r#"{"files":[{"path":"app/page.tsx","content":"hi"}]}"#),
            ChatResponse::text("<task_summary>Built a page.</task_summary>"),
        ]);
        let network = Network::<PremiumTier>::new(&AgentConfig::default());
        let ctx = RunContext {
            provider: &provider,
            gateway: &gateway,
            handle: &handle,
            metrics: &metrics,
        };

        let outcome = network
            .run(ctx, vec![ChatMessage::user("build a page")])
            .await
            .unwrap();

        assert_eq!(outcome.exit, ExitReason::Halted);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.state.files["app/page.tsx"], "hi");
        assert!(outcome.state.is_complete());

        // user, assistant(tool call), tool result, assistant(summary)
        let roles: Vec<Role> = outcome.transcript.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(outcome.transcript[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(
            outcome.transcript[2].content.as_deref(),
            Some("Files created/updated successfully")
        );
    }

    #[tokio::test]
    async fn stops_at_iteration_cap_without_summary() {
        let (_mock, gateway, handle) = sandbox_fixture().await;
        let metrics = Metrics::new().unwrap();
        let provider = ScriptedProvider::repeating(ChatResponse::text("thinking..."));
        let network = Network::<PremiumTier>::new(&AgentConfig::default());
        let ctx = RunContext {
            provider: &provider,
            gateway: &gateway,
            handle: &handle,
            metrics: &metrics,
        };

        let outcome = network.run(ctx, vec![ChatMessage::user("x")]).await.unwrap();
        assert_eq!(outcome.exit, ExitReason::IterationLimit);
        assert_eq!(outcome.iterations, 15);
        assert_eq!(provider.requests().len(), 15);
        assert!(!outcome.state.is_complete());
    }

    #[tokio::test]
    async fn deadline_stops_before_first_turn() {
        let (_mock, gateway, handle) = sandbox_fixture().await;
        let metrics = Metrics::new().unwrap();
        let provider = ScriptedProvider::repeating(ChatResponse::text("x"));
        let network = Network::<FreeTier>::new(&AgentConfig::default()).with_limits(8, Duration::ZERO);
        let ctx = RunContext {
            provider: &provider,
            gateway: &gateway,
            handle: &handle,
            metrics: &metrics,
        };

        let outcome = network.run(ctx, vec![ChatMessage::user("x")]).await.unwrap();
        assert_eq!(outcome.exit, ExitReason::Deadline);
        assert_eq!(outcome.iterations, 0);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn zero_run_timeout_disables_deadline() {
        let (_mock, gateway, handle) = sandbox_fixture().await;
        let metrics = Metrics::new().unwrap();
        let provider =
            ScriptedProvider::repeating(ChatResponse::text("<task_summary>done</task_summary>"));
        let config = AgentConfig {
            run_timeout_secs: 0,
            ..AgentConfig::default()
        };
        let network = Network::<FreeTier>::new(&config);
        let ctx = RunContext {
            provider: &provider,
            gateway: &gateway,
            handle: &handle,
            metrics: &metrics,
        };

        let outcome = network.run(ctx, vec![ChatMessage::user("x")]).await.unwrap();
        assert_eq!(outcome.exit, ExitReason::Halted);
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.state.is_complete());
    }

    #[tokio::test]
    async fn tool_calls_in_one_turn_run_in_order() {
        let (_mock, gateway, handle) = sandbox_fixture().await;
        let metrics = Metrics::new().unwrap();
        let provider = ScriptedProvider::new([
            ChatResponse {
                content: None,
                tool_calls: vec![
                    crate::providers::ToolCall {
                        id: "a".into(),
                        name: "createOrUpdateFiles".into(),
                        arguments: r#"{"files":[{"path":"x.ts","content":"1"}]}"#.into(),
                    },
                    crate::providers::ToolCall {
                        id: "b".into(),
                        name: "createOrUpdateFiles".into(),
                        arguments: r#"{"files":[{"path":"x.ts","content":"2"}]}"#.into(),
                    },
                ],
            },
            ChatResponse::text("<task_summary>ok</task_summary>"),
        ]);
        let network = Network::<PremiumTier>::new(&AgentConfig::default());
        let ctx = RunContext {
            provider: &provider,
            gateway: &gateway,
            handle: &handle,
            metrics: &metrics,
        };

        let outcome = network.run(ctx, vec![ChatMessage::user("x")]).await.unwrap();
        assert_eq!(outcome.state.files["x.ts"], "2");
        let ids: Vec<&str> = outcome
            .transcript
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn fatal_tool_error_aborts_loop() {
        let (mock, gateway, handle) = sandbox_fixture().await;
        mock.fail_writes();
        let metrics = Metrics::new().unwrap();
        let provider = ScriptedProvider::repeating(tool_call(
            "c1",
            "createOrUpdateFiles",
            r#"{"files":[{"path":"a.ts","content":"x"}]}"#,
        ));
        let network = Network::<PremiumTier>::new(&AgentConfig::default());
        let ctx = RunContext {
            provider: &provider,
            gateway: &gateway,
            handle: &handle,
            metrics: &metrics,
        };

        let err = network.run(ctx, vec![ChatMessage::user("x")]).await.unwrap_err();
        assert!(matches!(err, RunError::Tool(ToolError::Fatal { .. })));
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn provider_error_aborts_loop() {
        let (_mock, gateway, handle) = sandbox_fixture().await;
        let metrics = Metrics::new().unwrap();
        let provider = ScriptedProvider::new([]);
        provider.push_error(ProviderError::RateLimited);
        let network = Network::<FreeTier>::new(&AgentConfig::default());
        let ctx = RunContext {
            provider: &provider,
            gateway: &gateway,
            handle: &handle,
            metrics: &metrics,
        };

        let err = network.run(ctx, vec![ChatMessage::user("x")]).await.unwrap_err();
        assert!(matches!(err, RunError::Provider(ProviderError::RateLimited)));
    }
}
