//! Tools the code agent can call.
//!
//! Two fixed tool sets exist, one per tier:
//!
//! - premium: `terminal`, `createOrUpdateFiles`, `readFiles` ([`sandbox`])
//! - free: `readCurrentFiles`, `updateFiles`, `startWebServer` ([`site`])
//!
//! Every tool resolves the run's sandbox through [`ToolContext`] and may
//! mutate the run state it carries.

pub mod sandbox;
pub mod site;
pub mod traits;

pub use traits::{parse_args, schema_for, Tool, ToolContext, ToolError, ToolResult, ToolSpec};

use crate::providers::ToolCall;

/// Log record of one executed tool call.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: ToolResult,
}

/// An ordered, fixed set of tools bound to one agent.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Tools for premium runs: shell access plus multi-file write/read.
    pub fn premium() -> Self {
        Self::new(vec![
            Box::new(sandbox::TerminalTool),
            Box::new(sandbox::CreateOrUpdateFilesTool),
            Box::new(sandbox::ReadFilesTool),
        ])
    }

    /// Tools for free runs: the three static-site files and a web server.
    pub fn free() -> Self {
        Self::new(vec![
            Box::new(site::ReadCurrentFilesTool),
            Box::new(site::UpdateFilesTool),
            Box::new(site::StartWebServerTool),
        ])
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Execute one model-requested call.
    ///
    /// Malformed JSON and unknown tool names come back as failed results so
    /// the model can correct itself; only [`ToolError`] aborts the run.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolInvocation, ToolError> {
        let raw = call.arguments.trim();
        let parsed = if raw.is_empty() {
            Ok(serde_json::json!({}))
        } else {
            serde_json::from_str::<serde_json::Value>(raw)
        };

        let (arguments, result) = match parsed {
            Err(e) => (
                serde_json::Value::Null,
                ToolResult::failure(format!("Arguments for {} are not valid JSON: {e}", call.name)),
            ),
            Ok(arguments) => {
                let result = match self.get(&call.name) {
                    Some(tool) => tool.execute(arguments.clone(), ctx).await?,
                    None => ToolResult::failure(format!(
                        "Unknown tool: {}. Available tools: {}",
                        call.name,
                        self.names().join(", ")
                    )),
                };
                (arguments, result)
            }
        };

        if result.success {
            tracing::info!(tool = %call.name, "Tool call succeeded");
        } else {
            tracing::warn!(
                tool = %call.name,
                error = result.error.as_deref().unwrap_or_default(),
                "Tool call failed"
            );
        }

        Ok(ToolInvocation {
            name: call.name.clone(),
            arguments,
            result,
        })
    }
}
