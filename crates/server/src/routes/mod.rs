//! Endpoints, all mounted under `/api`.

mod chat;
mod health;
mod sheets;
mod suggestions;
mod voice;

use axum::Router;
use axum::routing::{get, post};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/chat", post(chat::chat))
        .route("/suggestions", post(suggestions::suggestions))
        .route("/sheets", post(sheets::save).get(sheets::initialize))
        .route("/voice/conversation", post(voice::conversation))
        .route("/voice/test", post(voice::test_connection))
        .route("/voice/websocket", get(voice::websocket))
        .route("/health", get(health::health_check))
        .with_state(state);

    Router::new().nest("/api", api_routes)
}

// Bodies are parsed by hand so a malformed body and an invalid one can get
// different answers.
fn parse_body(body: &[u8], unreadable: &'static str) -> Result<Value, AppError> {
    serde_json::from_slice(body).map_err(|err| AppError::internal(unreadable, err))
}

fn from_value<T: DeserializeOwned>(value: Value, invalid: &'static str) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|err| {
        debug!("rejecting body: {err}");
        AppError::BadRequest(invalid)
    })
}
