use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::cookie::CookieSession;
use crate::error::ChatError;
use crate::state::{AppState, SESSION_HEADER};

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

fn unix_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// A body that is not a JSON object with a string `message` counts as no message
fn parse_chat_request(
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<ChatRequest, ChatError> {
    match payload {
        Ok(Json(request)) => Ok(request),
        Err(rejection) => {
            tracing::debug!("Rejected chat body: {}", rejection);
            Err(ChatError::Validation("No message provided".to_string()))
        }
    }
}

fn header_session(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
}

/// Session for routes that accept either the API header or the cookie
fn resolve_session(state: &AppState, headers: &HeaderMap) -> CookieSession {
    match header_session(headers) {
        Some(id) => CookieSession { id, is_new: false },
        None => state.cookies.resolve(headers),
    }
}

fn with_cookie(mut response: Response, state: &AppState, session: &CookieSession) -> Response {
    if session.is_new {
        match state.cookies.set_cookie(&session.id) {
            Ok((name, value)) => {
                response.headers_mut().insert(name, value);
            }
            Err(e) => {
                return ChatError::Internal(format!("cannot build session cookie: {}", e))
                    .into_response()
            }
        }
    }
    response
}

pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match parse_chat_request(payload) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    let session = state.cookies.resolve(&headers);
    match state
        .manager
        .chat(&session.id, request.message.as_deref())
        .await
    {
        Ok(exchange) => {
            let body = Json(json!({
                "success": true,
                "response": exchange.reply.text(),
                "message": exchange.message,
            }));
            with_cookie(body.into_response(), &state, &session)
        }
        Err(e) => e.into_response(),
    }
}

pub async fn clear_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = resolve_session(&state, &headers);
    let message = state.manager.clear(&session.id);
    let body = Json(json!({
        "success": true,
        "message": message,
    }));
    with_cookie(body.into_response(), &state, &session)
}

pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "message": format!("gembot is running ({})", state.manager.model()),
        "timestamp": unix_timestamp(),
    }))
}

pub async fn api_chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ChatError> {
    let request = parse_chat_request(payload)?;

    let session_id = header_session(&headers).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let exchange = state
        .manager
        .chat(&session_id, request.message.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "response": exchange.reply.text(),
        "timestamp": unix_timestamp(),
        "session_id": session_id,
    })))
}

pub async fn history_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = resolve_session(&state, &headers);
    let history = state.manager.history(&session.id).await;
    let body = Json(json!({
        "success": true,
        "history": history,
        "session_id": session.id,
    }));
    with_cookie(body.into_response(), &state, &session)
}
