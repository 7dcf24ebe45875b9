//! `terminal` tool: execute a shell command in the sandbox.

use super::TOOL_TERMINAL;
use crate::tools::traits::{parse_args, schema_for, Tool, ToolContext, ToolError, ToolResult};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

pub struct TerminalTool;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TerminalArgs {
    /// Shell command to run, e.g. `npm install lucide-react --yes`.
    pub command: String,
}

#[async_trait]
impl Tool for TerminalTool {
    fn name(&self) -> &str {
        TOOL_TERMINAL
    }

    fn description(&self) -> &str {
        "Execute shell commands in the sandbox environment. \
         Use this to run npm install, build commands, or any terminal operations needed for the project."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        schema_for::<TerminalArgs>()
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolResult, ToolError> {
        let args: TerminalArgs = match parse_args(TOOL_TERMINAL, args) {
            Ok(a) => a,
            Err(result) => return Ok(result),
        };

        if args.command.trim().is_empty() {
            return Ok(ToolResult::failure("command cannot be empty"));
        }

        tracing::debug!(command = %args.command, "Terminal tool called");

        let sandbox = match ctx.sandbox().await {
            Ok(s) => s,
            Err(e) => return Ok(ToolResult::failure(format!("Command failed: {e}"))),
        };

        let output = sandbox.run_command(&args.command).await;

        match output.failure_reason() {
            None => Ok(ToolResult::ok(output.stdout)),
            Some(reason) => Ok(ToolResult {
                success: false,
                output: format!("stdout: {}\nstderr: {}", output.stdout, output.stderr),
                error: Some(format!("Command failed: {reason}")),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::RunState;
    use crate::test_support::sandbox_fixture;
    use serde_json::json;

    #[tokio::test]
    async fn returns_stdout_on_success() {
        let (mock, gateway, handle) = sandbox_fixture().await;
        mock.script_command("ls", "package.json\n", "", 0);
        let mut state = RunState::default();
        let mut ctx = ToolContext {
            gateway: &gateway,
            handle: &handle,
            state: &mut state,
        };

        let result = TerminalTool
            .execute(json!({"command": "ls"}), &mut ctx)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "package.json\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_returned_as_text() {
        let (mock, gateway, handle) = sandbox_fixture().await;
        mock.script_command("npm run build", "compiling", "Type error", 1);
        let mut state = RunState::default();
        let mut ctx = ToolContext {
            gateway: &gateway,
            handle: &handle,
            state: &mut state,
        };

        let result = TerminalTool
            .execute(json!({"command": "npm run build"}), &mut ctx)
            .await
            .unwrap();
        assert!(!result.success);
        let text = result.render();
        assert!(text.contains("Command failed: exit code 1"));
        assert!(text.contains("stdout: compiling"));
        assert!(text.contains("stderr: Type error"));
    }

    #[tokio::test]
    async fn transport_error_keeps_partial_output() {
        let (mock, gateway, handle) = sandbox_fixture().await;
        mock.fail_next_command("added 12 packages", "timed out");
        let mut state = RunState::default();
        let mut ctx = ToolContext {
            gateway: &gateway,
            handle: &handle,
            state: &mut state,
        };

        let result = TerminalTool
            .execute(json!({"command": "npm install"}), &mut ctx)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.render().contains("added 12 packages"));
    }

    #[tokio::test]
    async fn timeout_returns_partial_output_as_text() {
        let (mock, gateway, handle) = sandbox_fixture().await;
        mock.time_out_next_command("Compiled 40/120 modules");
        let mut state = RunState::default();
        let mut ctx = ToolContext {
            gateway: &gateway,
            handle: &handle,
            state: &mut state,
        };

        let result = TerminalTool
            .execute(json!({"command": "npm run dev"}), &mut ctx)
            .await
            .expect("a timeout is reported to the model, not raised");
        assert!(!result.success);
        let text = result.render();
        assert!(text.contains("command timed out after 5000ms"), "{text}");
        assert!(text.contains("stdout: Compiled 40/120 modules"), "{text}");
    }

    #[tokio::test]
    async fn unreachable_sandbox_is_not_fatal() {
        let (mock, gateway, handle) = sandbox_fixture().await;
        mock.fail_connect();
        let mut state = RunState::default();
        let mut ctx = ToolContext {
            gateway: &gateway,
            handle: &handle,
            state: &mut state,
        };

        let result = TerminalTool
            .execute(json!({"command": "ls"}), &mut ctx)
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn rejects_missing_command() {
        let (_mock, gateway, handle) = sandbox_fixture().await;
        let mut state = RunState::default();
        let mut ctx = ToolContext {
            gateway: &gateway,
            handle: &handle,
            state: &mut state,
        };

        let result = TerminalTool.execute(json!({}), &mut ctx).await.unwrap();
        assert!(!result.success);
        assert!(result.render().contains("Invalid arguments for terminal"));
    }
}
