use crate::agent::state::RunState;
use crate::sandbox::{Sandbox, SandboxError, SandboxGateway, SandboxHandle};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Outcome of one tool call, rendered back to the model as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Text handed to the model as the tool message.
    pub fn render(&self) -> String {
        match (&self.error, self.output.is_empty()) {
            (None, _) => self.output.clone(),
            (Some(err), true) => format!("Error: {err}"),
            (Some(err), false) => format!("Error: {err}\n{}", self.output),
        }
    }
}

/// Name, description and JSON schema advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Errors that escape the tool-call boundary and abort the run.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{tool} failed: {source}")]
    Fatal {
        tool: String,
        #[source]
        source: SandboxError,
    },
}

/// Per-call view of the run: its sandbox handle and mutable state.
pub struct ToolContext<'a> {
    pub gateway: &'a SandboxGateway,
    pub handle: &'a SandboxHandle,
    pub state: &'a mut RunState,
}

impl ToolContext<'_> {
    /// Re-attach to the run's sandbox. Tools never provision a new one.
    pub async fn sandbox(&self) -> Result<Sandbox, SandboxError> {
        self.gateway.resolve(self.handle).await
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Consumed by the model for tool selection only.
    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolResult, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// JSON schema for a typed argument struct.
pub fn schema_for<T: JsonSchema>() -> serde_json::Value {
    let mut schema = schemars::schema_for!(T).to_value();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}

/// Validate raw arguments against the typed contract. On mismatch the
/// returned [`ToolResult`] explains the problem to the model.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: serde_json::Value) -> Result<T, ToolResult> {
    // Models send `null` or nothing for argument-less tools.
    let args = if args.is_null() {
        serde_json::json!({})
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| ToolResult::failure(format!("Invalid arguments for {tool}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    #[serde(deny_unknown_fields)]
    struct Args {
        command: String,
    }

    #[test]
    fn schema_lists_required_fields() {
        let schema = schema_for::<Args>();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["command"]["type"], "string");
        assert_eq!(schema["required"], json!(["command"]));
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn parse_args_rejects_wrong_shape() {
        let err = parse_args::<Args>("terminal", json!({"command": 5})).unwrap_err();
        assert!(!err.success);
        assert!(err.render().contains("Invalid arguments for terminal"));

        let ok = parse_args::<Args>("terminal", json!({"command": "ls"})).unwrap();
        assert_eq!(ok.command, "ls");
    }

    #[test]
    fn render_includes_output_after_error() {
        let mut result = ToolResult::failure("exit code 1");
        result.output = "stderr: boom".to_string();
        assert_eq!(result.render(), "Error: exit code 1\nstderr: boom");
        assert_eq!(ToolResult::ok("done").render(), "done");
    }
}
