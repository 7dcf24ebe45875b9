//! `readCurrentFiles` and `updateFiles`: whole-file access to the static site.

use super::{CSS_PATH, HTML_PATH, JS_PATH, TOOL_READ_CURRENT_FILES, TOOL_UPDATE_FILES};
use crate::tools::traits::{parse_args, schema_for, Tool, ToolContext, ToolError, ToolResult};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The three site files, keyed the way the model sees them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SiteFiles {
    /// Complete content of index.html.
    pub html: String,
    /// Complete content of style.css.
    pub css: String,
    /// Complete content of script.js.
    pub js: String,
}

// ── readCurrentFiles ────────────────────────────────────────────────────────────

pub struct ReadCurrentFilesTool;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArgs {}

#[async_trait]
impl Tool for ReadCurrentFilesTool {
    fn name(&self) -> &str {
        TOOL_READ_CURRENT_FILES
    }

    fn description(&self) -> &str {
        "Read the current content of index.html, style.css and script.js. \
         Always call this before making changes."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        schema_for::<NoArgs>()
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolResult, ToolError> {
        if let Err(result) = parse_args::<NoArgs>(TOOL_READ_CURRENT_FILES, args) {
            return Ok(result);
        }

        let sandbox = match ctx.sandbox().await {
            Ok(s) => s,
            Err(e) => return Ok(ToolResult::failure(format!("Failed to read files: {e}"))),
        };

        let mut contents = Vec::with_capacity(3);
        for path in [HTML_PATH, CSS_PATH, JS_PATH] {
            match sandbox.read_file(path).await {
                Ok(content) => contents.push(content),
                Err(e) => return Ok(ToolResult::failure(format!("Failed to read {path}: {e}"))),
            }
        }

        let mut contents = contents.into_iter();
        let files = SiteFiles {
            html: contents.next().unwrap_or_default(),
            css: contents.next().unwrap_or_default(),
            js: contents.next().unwrap_or_default(),
        };

        match serde_json::to_string_pretty(&files) {
            Ok(json) => Ok(ToolResult::ok(json)),
            Err(e) => Ok(ToolResult::failure(format!("Failed to encode files: {e}"))),
        }
    }
}

// ── updateFiles ─────────────────────────────────────────────────────────────────

pub struct UpdateFilesTool;

#[async_trait]
impl Tool for UpdateFilesTool {
    fn name(&self) -> &str {
        TOOL_UPDATE_FILES
    }

    fn description(&self) -> &str {
        "Overwrite index.html, style.css and script.js with their complete updated content. \
         Always pass all three files, including the ones you did not change."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        schema_for::<SiteFiles>()
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolResult, ToolError> {
        let files: SiteFiles = match parse_args(TOOL_UPDATE_FILES, args) {
            Ok(f) => f,
            Err(result) => return Ok(result),
        };

        let sandbox = match ctx.sandbox().await {
            Ok(s) => s,
            Err(e) => return Ok(ToolResult::failure(format!("Failed to update files: {e}"))),
        };

        let SiteFiles { html, css, js } = files;
        for (path, content) in [(HTML_PATH, html), (CSS_PATH, css), (JS_PATH, js)] {
            if let Err(e) = sandbox.write_file(path, &content).await {
                return Ok(ToolResult::failure(format!("Failed to write {path}: {e}")));
            }
            ctx.state.merge_file(path.to_string(), content);
        }

        Ok(ToolResult::ok(format!(
            "Updated {HTML_PATH}, {CSS_PATH} and {JS_PATH}"
        )))
    }
}
