//! Browser front-end: a chat box over the quoting agent plus quote browsing.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use crate::agent::{QuotingAgent, SAMPLE_REQUESTS};
use crate::catalog::Product;
use crate::error::QuoteError;
use crate::quotes::{Quote, QuoteSummary};

const INDEX_HTML: &str = include_str!("../assets/index.html");

const RECENT_QUOTES: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatMessage {
    pub role:       ChatRole,
    pub content:    String,
    pub quote_ids:  Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), quote_ids: Vec::new(), created_at: Utc::now() }
    }
}

/// One browser session's conversation and how many quotes it produced.
#[derive(Debug, Default)]
pub struct ChatSession {
    pub messages:       Vec<ChatMessage>,
    pub session_quotes: usize,
}

#[derive(Clone)]
pub struct WebState {
    agent:   Arc<QuotingAgent>,
    session: Arc<Mutex<ChatSession>>,
}

impl WebState {
    pub fn new(agent: QuotingAgent) -> Self {
        Self { agent: Arc::new(agent), session: Arc::new(Mutex::new(ChatSession::default())) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ApiErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiErrorBody { error: message.into() }))
}

fn quote_error(err: QuoteError) -> ApiError {
    let status = match &err {
        QuoteError::QuoteNotFound(_) => StatusCode::NOT_FOUND,
        QuoteError::InvalidQuoteId(_) | QuoteError::Invalid(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "quote data unavailable");
    }
    api_error(status, err.to_string())
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
    pub status:     &'static str,
    pub model:      String,
    pub checked_at: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatsResponse {
    pub total_quotes:   usize,
    pub session_quotes: usize,
    pub recent:         Vec<QuoteSummary>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatReply {
    pub reply:          ChatMessage,
    pub session_quotes: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatHistory {
    pub messages:       Vec<ChatMessage>,
    pub session_quotes: usize,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/products", get(products))
        .route("/api/samples", get(samples))
        .route("/api/quotes", get(list_quotes))
        .route("/api/quotes/{id}", get(show_quote))
        .route("/api/quotes/{id}/download", get(download_quote))
        .route("/api/stats", get(stats))
        .route("/api/chat", get(chat_history).post(post_chat).delete(clear_chat))
        .with_state(state)
}

/// Binds and serves until the process is stopped.
pub async fn serve(bind_address: &str, state: WebState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!(bind_address = %listener.local_addr()?, "web UI listening");
    axum::serve(listener, router(state)).await
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<WebState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.agent.model().to_string(),
        checked_at: Utc::now().to_rfc3339(),
    })
}

pub async fn products(State(state): State<WebState>) -> Result<Json<Vec<Product>>, ApiError> {
    let catalog = state.agent.catalog().map_err(quote_error)?;
    Ok(Json(catalog.products().to_vec()))
}

pub async fn samples() -> Json<Vec<&'static str>> {
    Json(SAMPLE_REQUESTS.to_vec())
}

pub async fn list_quotes(State(state): State<WebState>) -> Result<Json<Vec<QuoteSummary>>, ApiError> {
    state.agent.store().summaries().map(Json).map_err(quote_error)
}

pub async fn show_quote(
    State(state): State<WebState>,
    Path(id): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    state.agent.store().load(&id).map(Json).map_err(quote_error)
}

pub async fn download_quote(
    State(state): State<WebState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let quote = state.agent.store().load(&id).map_err(quote_error)?;
    let body = serde_json::to_string_pretty(&quote)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let headers = [
        (header::CONTENT_TYPE, "application/json".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}.json\"", quote.quote_id)),
    ];
    Ok((headers, body))
}

pub async fn stats(State(state): State<WebState>) -> Result<Json<StatsResponse>, ApiError> {
    let summaries = state.agent.store().summaries().map_err(quote_error)?;
    let session_quotes = state.session.lock().await.session_quotes;
    Ok(Json(StatsResponse {
        total_quotes: summaries.len(),
        session_quotes,
        recent: summaries.into_iter().take(RECENT_QUOTES).collect(),
    }))
}

pub async fn chat_history(State(state): State<WebState>) -> Json<ChatHistory> {
    let session = state.session.lock().await;
    Json(ChatHistory { messages: session.messages.clone(), session_quotes: session.session_quotes })
}

pub async fn clear_chat(State(state): State<WebState>) -> StatusCode {
    let mut session = state.session.lock().await;
    session.messages.clear();
    info!("chat history cleared");
    StatusCode::NO_CONTENT
}

pub async fn post_chat(
    State(state): State<WebState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }

    state.session.lock().await.messages.push(ChatMessage::new(ChatRole::User, message.clone()));

    let store = state.agent.store();
    let before = store.count().map_err(quote_error)?;

    let reply = match state.agent.ask(&message).await {
        Ok(outcome) => {
            let mut reply = ChatMessage::new(ChatRole::Assistant, outcome.answer);
            reply.quote_ids = outcome.quote_ids;
            reply
        }
        Err(err) => {
            warn!(error = %err, "chat request failed");
            ChatMessage::new(ChatRole::Assistant, format!("Error processing request: {}", err))
        }
    };

    let after = store.count().map_err(quote_error)?;

    let mut session = state.session.lock().await;
    if after > before {
        session.session_quotes += 1;
    }
    session.messages.push(reply.clone());
    Ok(Json(ChatReply { reply, session_quotes: session.session_quotes }))
}
