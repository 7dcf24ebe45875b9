//! `startWebServer`: serve the static site on [`SITE_PORT`].
//!
//! Each call kills whatever is bound to the port and then walks an ordered
//! list of server mechanisms, probing after every start. The call fails only
//! when every mechanism has been tried.

use super::files::NoArgs;
use super::{SITE_PORT, TOOL_START_WEB_SERVER};
use crate::sandbox::Sandbox;
use crate::tools::traits::{parse_args, schema_for, Tool, ToolContext, ToolError, ToolResult};
use async_trait::async_trait;

pub struct StartWebServerTool;

/// One way of serving the site directory.
struct ServerMechanism {
    label: &'static str,
    start: String,
}

fn mechanisms() -> [ServerMechanism; 2] {
    [
        ServerMechanism {
            label: "python http.server",
            start: format!(
                "nohup python3 -m http.server {SITE_PORT} --bind 0.0.0.0 > /tmp/server.log 2>&1 &"
            ),
        },
        ServerMechanism {
            label: "npx http-server",
            start: format!(
                "nohup npx --yes http-server -p {SITE_PORT} -a 0.0.0.0 -c-1 > /tmp/server.log 2>&1 &"
            ),
        },
    ]
}

fn kill_command() -> String {
    format!(
        "fuser -k {SITE_PORT}/tcp > /dev/null 2>&1; \
         pkill -f 'http.server {SITE_PORT}' > /dev/null 2>&1; \
         pkill -f 'http-server -p {SITE_PORT}' > /dev/null 2>&1; true"
    )
}

/// Polls the port for up to ten seconds and echoes the last HTTP status.
fn probe_command() -> String {
    format!(
        "for i in 1 2 3 4 5 6 7 8 9 10; do \
         code=$(curl -s -o /dev/null -w '%{{http_code}}' http://localhost:{SITE_PORT}/); \
         case \"$code\" in 2*|3*) echo \"$code\"; exit 0;; esac; sleep 1; \
         done; echo \"$code\"; exit 1"
    )
}

fn is_serving(status: &str) -> bool {
    matches!(status.trim().parse::<u16>(), Ok(code) if (200..400).contains(&code))
}

async fn stop_existing(sandbox: &Sandbox) {
    let out = sandbox.run_command(&kill_command()).await;
    if let Some(reason) = out.failure_reason() {
        tracing::debug!(sandbox_id = sandbox.id(), "Stopping previous server: {reason}");
    }
}

#[async_trait]
impl Tool for StartWebServerTool {
    fn name(&self) -> &str {
        TOOL_START_WEB_SERVER
    }

    fn description(&self) -> &str {
        "Start (or restart) the web server that serves index.html, style.css and script.js. \
         Call this after updating the files so the preview reflects your changes."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        schema_for::<NoArgs>()
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolResult, ToolError> {
        if let Err(result) = parse_args::<NoArgs>(TOOL_START_WEB_SERVER, args) {
            return Ok(result);
        }

        let sandbox = match ctx.sandbox().await {
            Ok(s) => s,
            Err(e) => return Ok(ToolResult::failure(format!("Failed to start web server: {e}"))),
        };

        let mut attempts = Vec::new();
        for mechanism in mechanisms() {
            stop_existing(&sandbox).await;

            let started = sandbox.run_command(&mechanism.start).await;
            if let Some(reason) = started.failure_reason() {
                attempts.push(format!("{}: {reason}", mechanism.label));
                continue;
            }

            let probe = sandbox.run_command(&probe_command()).await;
            if is_serving(&probe.stdout) {
                tracing::info!(
                    sandbox_id = sandbox.id(),
                    mechanism = mechanism.label,
                    port = SITE_PORT,
                    "Web server started"
                );
                return Ok(ToolResult::ok(format!(
                    "Web server running on port {SITE_PORT} ({})",
                    mechanism.label
                )));
            }

            let status = probe.stdout.trim();
            attempts.push(format!(
                "{}: not responding on port {SITE_PORT} (status {})",
                mechanism.label,
                if status.is_empty() { "none" } else { status }
            ));
        }

        // Leave nothing half-started behind.
        stop_existing(&sandbox).await;

        Ok(ToolResult {
            success: false,
            output: attempts.join("\n"),
            error: Some("Failed to start web server".to_string()),
        })
    }
}
