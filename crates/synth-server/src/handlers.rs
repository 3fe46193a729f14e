//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use synth_core::{
    AgentError, Message, ReasoningTrace, ReasoningType, SessionId, SessionSummary, ToolInvocation, ToolResult,
    ToolSchema,
};
use synth_tools::{Document, DocumentInfo};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_profile: String,
    pub model: String,
    pub profiles: Vec<String>,
    pub provider_reachable: bool,
}

const fn default_use_tools() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_use_tools")]
    pub use_tools: bool,
    #[serde(default)]
    pub reasoning_type: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub reasoning_type: ReasoningType,
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<ReasoningTrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_markdown: Option<String>,
    pub tool_results: Vec<ToolResult>,
    pub incomplete: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: SessionId,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotesQuery {
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub num_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error half of every handler result
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code: code.into(),
            },
        }
    }

    fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found"))
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let status = match &err {
            AgentError::ProviderUnavailable(_) | AgentError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AgentError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            AgentError::InvalidInput(_)
            | AgentError::UnknownTool(_)
            | AgentError::InvalidToolArguments { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.user_message())
    }
}

impl From<synth_tools::ToolError> for ApiError {
    fn from(err: synth_tools::ToolError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let router = state.orchestrator.router();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        active_profile: router.active_profile().to_string(),
        model: router.active_model().to_string(),
        profiles: router.profile_names().into_iter().map(str::to_string).collect(),
        provider_reachable: router.health_check().await,
    })
}

/// Main chat endpoint.
///
/// The turn runs on its own task; if the client goes away this handler is
/// dropped, the drop guard cancels the token and the turn stops at its next
/// suspension point.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let ChatRequest {
        message,
        use_tools,
        reasoning_type,
        session_id,
    } = payload;

    let reasoning_type: ReasoningType = reasoning_type.as_deref().unwrap_or_default().parse()?;
    let session_id = session_id
        .filter(|id| !id.trim().is_empty())
        .map_or_else(SessionId::new, SessionId::from);

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let orchestrator = state.orchestrator.clone();
    let turn = tokio::spawn({
        let session_id = session_id.clone();
        async move {
            orchestrator
                .handle_cancellable(&session_id, &message, use_tools, reasoning_type, &cancel)
                .await
        }
    });

    let reply = turn
        .await
        .map_err(|e| {
            tracing::error!(session = %session_id, error = %e, "chat task aborted");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "The request failed unexpectedly.")
        })??;

    Ok(Json(ChatResponse {
        response: reply.answer,
        reasoning_type: reply.reasoning_type,
        session_id: reply.session_id,
        trace_markdown: reply.trace.as_ref().map(ReasoningTrace::to_markdown),
        trace: reply.trace,
        tool_results: reply.tool_results,
        incomplete: reply.incomplete,
    }))
}

/// Tool catalog
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSchema>> {
    Json(state.orchestrator.tools().list())
}

/// Full, untrimmed history of a session
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let session_id = SessionId::from(id);
    let messages = state.orchestrator.store().history(&session_id).await?;
    Ok(Json(HistoryResponse { session_id, messages }))
}

/// Drop every non-system message of a session
pub async fn clear_history(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let session_id = SessionId::from(id);
    if state.orchestrator.store().clear(&session_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format_args!("session '{session_id}'")))
    }
}

pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<Vec<SessionSummary>>> {
    Ok(Json(state.orchestrator.store().summaries().await?))
}

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let session_id = SessionId::from(id);
    if state.orchestrator.store().delete(&session_id).await? {
        tracing::info!(session = %session_id, "session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format_args!("session '{session_id}'")))
    }
}

pub async fn save_note(State(state): State<AppState>, Json(payload): Json<NoteRequest>) -> ApiResult<Json<Value>> {
    let call = ToolInvocation::from_json(
        "save_note",
        json!({"title": payload.title, "content": payload.content, "tags": payload.tags}),
    );
    run_tool(&state, &call).await
}

pub async fn list_notes(State(state): State<AppState>, Query(query): Query<NotesQuery>) -> ApiResult<Json<Value>> {
    let arguments = query.tag.map_or_else(|| json!({}), |tag| json!({"tag": tag}));
    run_tool(&state, &ToolInvocation::from_json("list_notes", arguments)).await
}

pub async fn search(State(state): State<AppState>, Json(payload): Json<SearchRequest>) -> ApiResult<Json<Value>> {
    let mut arguments = json!({"query": payload.query});
    if let Some(n) = payload.num_results {
        arguments["num_results"] = json!(n);
    }
    run_tool(&state, &ToolInvocation::from_json("web_search", arguments)).await
}

/// Store already-extracted document text
pub async fn upload_document(
    State(state): State<AppState>,
    Json(payload): Json<DocumentRequest>,
) -> ApiResult<(StatusCode, Json<DocumentInfo>)> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", "document text must not be empty"));
    }

    let id = payload
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let info = state.documents.put(Document::new(id, payload.name, payload.text))?;
    tracing::info!(document = %info.id, chars = info.chars, "document stored");

    Ok((StatusCode::CREATED, Json(info)))
}

pub async fn delete_document(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    if state.documents.delete(&id)? {
        tracing::info!(document = %id, "document deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format_args!("document '{id}'")))
    }
}

pub async fn list_documents(State(state): State<AppState>) -> ApiResult<Json<Vec<DocumentInfo>>> {
    Ok(Json(state.documents.list()?))
}

/// Invoke a registered tool directly; a failed result becomes 422
async fn run_tool(state: &AppState, call: &ToolInvocation) -> ApiResult<Json<Value>> {
    let result = state.orchestrator.tools().invoke(call).await;
    if result.success {
        Ok(Json(result.data))
    } else {
        Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "TOOL_FAILED",
            result.error.unwrap_or_else(|| format!("{} failed", call.name)),
        ))
    }
}
