//! Route handlers.

use super::AppState;
use crate::agent::run::{RunRequest, Services};
use crate::agent::tier::Tier;
use crate::jobs::ShuttingDown;
use crate::store::usage::{self, UsageError, UsageStatus};
use crate::store::{messages, projects};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

/// Longest accepted prompt, in characters.
pub const MAX_PROMPT_CHARS: usize = 10_000;

/// Usage key when the caller does not identify itself.
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("You have run out of credits")]
    CreditsExhausted { retry_after_secs: i64 },
    #[error("Server is shutting down")]
    ShuttingDown(#[from] ShuttingDown),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::CreditsExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ShuttingDown(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(e) => {
                tracing::error!("Request failed: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let mut body = json!({ "error": self.to_string() });
        if let Self::CreditsExhausted { retry_after_secs } = &self {
            body["retryAfterSecs"] = json!(retry_after_secs);
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run `write` and, for premium runs, spend one credit for `user_id`, all in
/// one transaction: a failed write leaves the credit unspent and an exhausted
/// key leaves nothing written.
fn write_with_credit<T>(
    services: &Services,
    tier: Tier,
    user_id: Option<&str>,
    write: impl FnOnce(&Connection) -> anyhow::Result<T>,
) -> ApiResult<T> {
    let key = user_id.filter(|k| !k.is_empty()).unwrap_or(ANONYMOUS_USER);
    let config = &services.config.usage;
    services.store.with(|c| {
        let tx = c.unchecked_transaction()?;
        if tier == Tier::Premium {
            match usage::consume(&tx, config, key) {
                Ok(status) => {
                    tracing::debug!(key, remaining = status.remaining_points, "Premium credit consumed");
                }
                Err(UsageError::Exhausted { retry_after_secs }) => {
                    return Ok(Err(ApiError::CreditsExhausted { retry_after_secs }));
                }
                Err(UsageError::Store(e)) => return Err(e),
            }
        }
        let value = write(&*tx)?;
        tx.commit()?;
        Ok(Ok(value))
    })?
}

fn validate_prompt(value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest("Prompt cannot be empty".into()));
    }
    if value.chars().count() > MAX_PROMPT_CHARS {
        return Err(ApiError::BadRequest("Prompt is too long".into()));
    }
    Ok(())
}

fn require_project(services: &Services, id: &str) -> ApiResult<projects::Project> {
    services
        .store
        .with(|c| projects::get_project(c, id))?
        .ok_or(ApiError::NotFound("Project"))
}

// ── POST /api/code-agent ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeAgentBody {
    pub project_id: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub tier: Tier,
    pub user_id: Option<String>,
}

pub async fn trigger_code_agent(
    State(state): State<AppState>,
    Json(body): Json<CodeAgentBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let (Some(project_id), Some(message)) = (
        body.project_id.filter(|s| !s.is_empty()),
        body.message.filter(|s| !s.is_empty()),
    ) else {
        return Err(ApiError::BadRequest("Missing projectId or message".into()));
    };

    state.dispatcher.ensure_accepting()?;
    let services = state.dispatcher.services();
    require_project(services, &project_id)?;
    write_with_credit(services, body.tier, body.user_id.as_deref(), |_| Ok(()))?;

    let event_id = state.dispatcher.enqueue(RunRequest {
        project_id,
        value: message,
        tier: body.tier,
    })?;

    Ok(Json(json!({
        "success": true,
        "eventId": event_id,
        "tier": body.tier,
        "message": format!("{} code agent triggered successfully", body.tier.label()),
    })))
}

// ── Projects ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptBody {
    pub value: String,
    #[serde(default)]
    pub tier: Tier,
    pub user_id: Option<String>,
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<PromptBody>,
) -> ApiResult<(StatusCode, Json<projects::Project>)> {
    validate_prompt(&body.value)?;
    state.dispatcher.ensure_accepting()?;
    let services = state.dispatcher.services();
    let project = write_with_credit(services, body.tier, body.user_id.as_deref(), |c| {
        let project = projects::create_project(c, &projects::generate_slug())?;
        messages::create_user_message(c, &project.id, &body.value)?;
        Ok(project)
    })?;

    state.dispatcher.enqueue(RunRequest {
        project_id: project.id.clone(),
        value: body.value,
        tier: body.tier,
    })?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<projects::Project>>> {
    let list = state.dispatcher.services().store.with(projects::list_projects)?;
    Ok(Json(list))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<projects::Project>> {
    Ok(Json(require_project(state.dispatcher.services(), &id)?))
}

// ── Messages ────────────────────────────────────────────────────────────────────

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<messages::Message>>> {
    let services = state.dispatcher.services();
    require_project(services, &id)?;
    let list = services.store.with(|c| messages::list_messages(c, &id))?;
    Ok(Json(list))
}

pub async fn create_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PromptBody>,
) -> ApiResult<(StatusCode, Json<messages::Message>)> {
    validate_prompt(&body.value)?;
    state.dispatcher.ensure_accepting()?;
    let services = state.dispatcher.services();
    require_project(services, &id)?;
    let message = write_with_credit(services, body.tier, body.user_id.as_deref(), |c| {
        messages::create_user_message(c, &id, &body.value)
    })?;

    state.dispatcher.enqueue(RunRequest {
        project_id: id,
        value: body.value,
        tier: body.tier,
    })?;
    Ok((StatusCode::CREATED, Json(message)))
}

// ── Usage / ops ─────────────────────────────────────────────────────────────────

pub async fn usage_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<UsageStatus>> {
    let services = state.dispatcher.services();
    let config = &services.config.usage;
    let status = services
        .store
        .with(|c| usage::get_status(c, config, &key))?
        .unwrap_or(UsageStatus {
            consumed_points: 0,
            remaining_points: config.free_points,
            ms_before_next: 0,
        });
    Ok(Json(status))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.dispatcher.services().metrics.render(),
    )
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "inFlightRuns": state.dispatcher.in_flight(),
    }))
}
