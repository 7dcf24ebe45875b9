//! Premium file tools: `createOrUpdateFiles` and `readFiles`.

use super::{TOOL_CREATE_OR_UPDATE_FILES, TOOL_READ_FILES};
use crate::tools::traits::{parse_args, schema_for, Tool, ToolContext, ToolError, ToolResult};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── createOrUpdateFiles ──────────────────────────────────────────────────────────

pub struct CreateOrUpdateFilesTool;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct FileEntry {
    /// Path relative to the project root, e.g. `app/page.tsx`.
    pub path: String,
    /// Full file content.
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateOrUpdateFilesArgs {
    pub files: Vec<FileEntry>,
}

#[async_trait]
impl Tool for CreateOrUpdateFilesTool {
    fn name(&self) -> &str {
        TOOL_CREATE_OR_UPDATE_FILES
    }

    fn description(&self) -> &str {
        "Create new files or update existing files in the sandbox. \
         Use this tool whenever you need to write code, create components, or modify any files in the project."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        schema_for::<CreateOrUpdateFilesArgs>()
    }

    /// Write failures are fatal: a half-written project is not recoverable
    /// from inside the conversation.
    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolResult, ToolError> {
        let args: CreateOrUpdateFilesArgs = match parse_args(TOOL_CREATE_OR_UPDATE_FILES, args) {
            Ok(a) => a,
            Err(result) => return Ok(result),
        };

        let paths: Vec<&str> = args.files.iter().map(|f| f.path.as_str()).collect();
        tracing::debug!(?paths, "createOrUpdateFiles called");

        let fatal = |source| ToolError::Fatal {
            tool: TOOL_CREATE_OR_UPDATE_FILES.to_string(),
            source,
        };

        let sandbox = ctx.sandbox().await.map_err(fatal)?;

        for file in args.files {
            sandbox
                .write_file(&file.path, &file.content)
                .await
                .map_err(fatal)?;
            ctx.state.merge_file(file.path, file.content);
        }

        Ok(ToolResult::ok("Files created/updated successfully"))
    }
}

// ── readFiles ────────────────────────────────────────────────────────────────────

pub struct ReadFilesTool;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFilesArgs {
    /// Paths to read, relative to the project root.
    pub files: Vec<String>,
}

#[async_trait]
impl Tool for ReadFilesTool {
    fn name(&self) -> &str {
        TOOL_READ_FILES
    }

    fn description(&self) -> &str {
        "Read the contents of existing files in the sandbox. \
         Use this to examine current code, check file structure, or understand the existing implementation."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        schema_for::<ReadFilesArgs>()
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolResult, ToolError> {
        let args: ReadFilesArgs = match parse_args(TOOL_READ_FILES, args) {
            Ok(a) => a,
            Err(result) => return Ok(result),
        };

        let sandbox = ctx.sandbox().await.map_err(|source| ToolError::Fatal {
            tool: TOOL_READ_FILES.to_string(),
            source,
        })?;

        let mut contents = Vec::with_capacity(args.files.len());
        for path in args.files {
            match sandbox.read_file(&path).await {
                Ok(content) => contents.push(FileEntry { path, content }),
                Err(e) => return Ok(ToolResult::failure(format!("File read failed: {e}"))),
            }
        }

        match serde_json::to_string(&contents) {
            Ok(json) => Ok(ToolResult::ok(json)),
            Err(e) => Ok(ToolResult::failure(format!("Failed to encode file contents: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::RunState;
    use crate::test_support::sandbox_fixture;
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn writes_accumulate_as_left_fold() {
        let (mock, gateway, handle) = sandbox_fixture().await;
        let mut state = RunState::default();
        let mut ctx = ToolContext {
            gateway: &gateway,
            handle: &handle,
            state: &mut state,
        };

        let calls = [
            json!({"files": [
                {"path": "app/page.tsx", "content": "v1"},
                {"path": "app/layout.tsx", "content": "layout"}
            ]}),
            json!({"files": [{"path": "app/page.tsx", "content": "v2"}]}),
            json!({"files": [{"path": "lib/utils.ts", "content": "utils"}]}),
        ];
        for args in calls {
            let result = CreateOrUpdateFilesTool.execute(args, &mut ctx).await.unwrap();
            assert!(result.success);
        }

        let expected: HashMap<String, String> = [
            ("app/page.tsx", "v2"),
            ("app/layout.tsx", "layout"),
            ("lib/utils.ts", "utils"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(state.files, expected);
        assert_eq!(mock.file("/home/user/app/page.tsx").as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn write_failure_is_fatal() {
        let (mock, gateway, handle) = sandbox_fixture().await;
        mock.fail_writes();
        let mut state = RunState::default();
        let mut ctx = ToolContext {
            gateway: &gateway,
            handle: &handle,
            state: &mut state,
        };

        let err = CreateOrUpdateFilesTool
            .execute(json!({"files": [{"path": "a.ts", "content": "x"}]}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Fatal { ref tool, .. } if tool == "createOrUpdateFiles"));
        assert!(state.files.is_empty());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (_mock, gateway, handle) = sandbox_fixture().await;
        let mut state = RunState::default();
        let mut ctx = ToolContext {
            gateway: &gateway,
            handle: &handle,
            state: &mut state,
        };
        let content = "export default function Page() {\n  return <h1>Hi \"there\"</h1>;\n}\n";

        CreateOrUpdateFilesTool
            .execute(json!({"files": [{"path": "app/page.tsx", "content": content}]}), &mut ctx)
            .await
            .unwrap();
        let result = ReadFilesTool
            .execute(json!({"files": ["app/page.tsx"]}), &mut ctx)
            .await
            .unwrap();

        assert!(result.success);
        let entries: Vec<FileEntry> = serde_json::from_str(&result.output).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "app/page.tsx");
        assert_eq!(entries[0].content, content);
    }

    #[tokio::test]
    async fn missing_file_read_is_returned_as_text() {
        let (_mock, gateway, handle) = sandbox_fixture().await;
        let mut state = RunState::default();
        let mut ctx = ToolContext {
            gateway: &gateway,
            handle: &handle,
            state: &mut state,
        };

        let result = ReadFilesTool
            .execute(json!({"files": ["nope.ts"]}), &mut ctx)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.render().contains("file not found"));
    }
}
