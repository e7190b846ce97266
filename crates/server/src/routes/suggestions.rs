use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde_json::Value;
use survey_chat_core::wire::SuggestionGroups;

use super::parse_body;
use crate::error::AppError;
use crate::prompts::suggestions_request;
use crate::state::AppState;

const FAILED: &str = "Failed to generate suggestions";

pub async fn suggestions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SuggestionGroups>, AppError> {
    let chat = state
        .chat
        .ok_or(AppError::NotConfigured("Server configuration error"))?;

    let body = parse_body(&body, FAILED)?;
    let question = match body.get("question") {
        Some(Value::String(question)) if !question.is_empty() => question.as_str(),
        _ => return Err(AppError::BadRequest("Question is required")),
    };

    let reply = chat
        .send_request(suggestions_request(question), |_| {})
        .await
        .map_err(|err| AppError::internal(FAILED, err))?;

    let groups = match serde_json::from_str::<SuggestionGroups>(reply.transcript.trim()) {
        Ok(groups) => groups.capped(),
        Err(err) => {
            warn!("failed to parse suggestions ({err}): {}", reply.transcript);
            SuggestionGroups::default()
        }
    };
    Ok(Json(groups))
}
