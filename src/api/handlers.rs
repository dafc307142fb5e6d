//! HTTP request handlers

use super::types::{ActivityRequest, ErrorResponse, HealthResponse};
use super::AppState;
use crate::activity::{Activity, ConversationKey};
use crate::error::TurnError;
use crate::runtime::TurnOutcome;
use crate::store::Storage;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router<S: Storage + Clone + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // One turn per incoming activity
        .route(
            "/api/conversations/:channel/:conversation/activities",
            post(post_activity::<S>),
        )
        // Forget a user's dialog stack in one conversation
        .route(
            "/api/conversations/:channel/:conversation/users/:user",
            delete(reset_user::<S>),
        )
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// ============================================================
// Turns
// ============================================================

async fn post_activity<S: Storage + Clone + 'static>(
    State(state): State<AppState<S>>,
    Path((channel, conversation)): Path<(String, String)>,
    Json(req): Json<ActivityRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    if req.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("user_id is required".to_string()));
    }
    let key = ConversationKey::new(channel, conversation, req.user_id);
    let mut item = Activity::message(req.text);
    if let Some(value) = req.value {
        item = item.with_value(value);
    }

    let outcome = state.manager.handle(&key, item).await?;
    Ok(Json(outcome))
}

async fn reset_user<S: Storage + Clone + 'static>(
    State(state): State<AppState<S>>,
    Path((channel, conversation, user)): Path<(String, String, String)>,
) -> Result<StatusCode, AppError> {
    let key = ConversationKey::new(channel, conversation, user);
    state.manager.reset(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Turn(TurnError),
}

impl From<TurnError> for AppError {
    fn from(err: TurnError) -> Self {
        AppError::Turn(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            // Details are logged by the runtime, not returned
            AppError::Turn(_) => (StatusCode::INTERNAL_SERVER_ERROR, "turn failed".to_string()),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
