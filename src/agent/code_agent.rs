//! The code agent: one system prompt, one model, one fixed tool set.

use super::state::RunState;
use crate::providers::{ChatMessage, ChatRequest, Provider, ProviderError, ToolCall};
use crate::tools::ToolRegistry;
use regex::Regex;
use std::sync::LazyLock;

pub const SUMMARY_OPEN: &str = "<task_summary>";
pub const SUMMARY_CLOSE: &str = "</task_summary>";

static SUMMARY_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<task_summary>\s*(.*?)\s*(?:</task_summary>|$)").expect("summary regex is valid")
});

/// What the model asked for in one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentTurnResult {
    /// Tool calls to dispatch, with any text the model sent alongside.
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
    /// A plain reply with no tool calls.
    Message(String),
}

impl AgentTurnResult {
    /// Latest assistant text in this turn, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::ToolCalls { text, .. } => text.as_deref(),
            Self::Message(text) => Some(text.as_str()),
        }
    }
}

pub struct Agent {
    pub name: String,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f64,
    pub tools: ToolRegistry,
}

impl Agent {
    /// One provider call over the system prompt and `conversation`.
    pub async fn turn(
        &self,
        provider: &dyn Provider,
        conversation: &[ChatMessage],
    ) -> Result<AgentTurnResult, ProviderError> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.as_str()));
        messages.extend_from_slice(conversation);
        let specs = self.tools.specs();

        let response = provider
            .chat(ChatRequest {
                model: &self.model,
                temperature: self.temperature,
                messages: &messages,
                tools: &specs,
            })
            .await?;

        let text = response.text_content().filter(|t| !t.trim().is_empty());
        if response.tool_calls.is_empty() {
            Ok(AgentTurnResult::Message(text.unwrap_or_default()))
        } else {
            Ok(AgentTurnResult::ToolCalls {
                text,
                calls: response.tool_calls,
            })
        }
    }

    /// Lifecycle hook run after every model response. Records the reply as
    /// the run summary when it carries the completion marker.
    pub fn on_response(&self, result: &AgentTurnResult, state: &mut RunState) -> bool {
        let Some(text) = result.text() else {
            return false;
        };
        if !text.contains(SUMMARY_OPEN) {
            return false;
        }
        let recorded = state.record_summary(text);
        if recorded {
            tracing::info!(agent = %self.name, "Task summary detected");
        }
        recorded
    }
}

/// Text between the summary markers, trimmed. A missing close tag takes
/// everything after the open tag.
pub fn extract_summary_body(text: &str) -> Option<String> {
    SUMMARY_BODY
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|body| !body.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatResponse;
    use crate::test_support::ScriptedProvider;

    fn agent() -> Agent {
        Agent {
            name: "code-agent".into(),
            system_prompt: "be helpful".into(),
            model: "gpt-4.1".into(),
            temperature: 0.1,
            tools: ToolRegistry::premium(),
        }
    }

    #[test]
    fn extracts_summary_body() {
        let text = "All set.\n<task_summary>\nBuilt a todo app.\n</task_summary>";
        assert_eq!(extract_summary_body(text).as_deref(), Some("Built a todo app."));
        assert_eq!(
            extract_summary_body("<task_summary>unterminated").as_deref(),
            Some("unterminated")
        );
        assert_eq!(extract_summary_body("no marker"), None);
        assert_eq!(extract_summary_body("<task_summary></task_summary>"), None);
    }

    #[test]
    fn hook_records_only_marked_text() {
        let agent = agent();
        let mut state = RunState::default();

        let plain = AgentTurnResult::Message("still working".into());
        assert!(!agent.on_response(&plain, &mut state));
        assert!(!state.is_complete());

        let done = AgentTurnResult::Message("<task_summary>done</task_summary>".into());
        assert!(agent.on_response(&done, &mut state));
        assert_eq!(state.summary(), Some("<task_summary>done</task_summary>"));

        let again = AgentTurnResult::Message("<task_summary>again</task_summary>".into());
        assert!(!agent.on_response(&again, &mut state));
        assert_eq!(state.summary(), Some("<task_summary>done</task_summary>"));
    }

    #[tokio::test]
    async fn turn_sends_system_prompt_and_tools() {
        let provider = ScriptedProvider::new([ChatResponse::text("hello")]);
        let agent = agent();

        let result = agent
            .turn(&provider, &[ChatMessage::user("build a page")])
            .await
            .unwrap();

        assert_eq!(result, AgentTurnResult::Message("hello".into()));
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.model, "gpt-4.1");
        assert_eq!(req.messages[0], ChatMessage::system("be helpful"));
        assert_eq!(req.messages[1], ChatMessage::user("build a page"));
        assert_eq!(req.tools, ["terminal", "createOrUpdateFiles", "readFiles"]);
    }

    #[tokio::test]
    async fn turn_returns_tool_calls() {
        let call = ToolCall {
            id: "c1".into(),
            name: "terminal".into(),
            arguments: r#"{"command":"ls"}"#.into(),
        };
        let provider = ScriptedProvider::new([ChatResponse {
            content: None,
            tool_calls: vec![call.clone()],
        }]);

        let result = agent().turn(&provider, &[ChatMessage::user("x")]).await.unwrap();
        assert_eq!(
            result,
            AgentTurnResult::ToolCalls {
                text: None,
                calls: vec![call]
            }
        );
        assert_eq!(result.text(), None);
    }
}
