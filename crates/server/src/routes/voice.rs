use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use reqwest::header;
use serde::Deserialize;
use serde_json::{Value, json};
use survey_chat_voice::VoiceCredentials;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
struct ConversationAction {
    #[serde(default)]
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    character_count: Option<u64>,
    #[serde(default)]
    character_limit: Option<u64>,
}

fn credentials(state: AppState) -> Result<VoiceCredentials, AppError> {
    state.voice.ok_or(AppError::NotConfigured(
        "ElevenLabs API key or Agent ID not configured",
    ))
}

/// Hands the agent credentials to a front-end about to connect.
pub async fn conversation(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body: ConversationAction =
        serde_json::from_slice(&body).map_err(|err| AppError::Voice(err.to_string()))?;
    let credentials = credentials(state)?;

    match body.action.as_deref() {
        Some("start") => Ok(Json(json!({
            "success": true,
            "agent_id": credentials.agent_id,
            "api_key": credentials.api_key,
            "message": "Ready to connect to ElevenLabs agent",
        }))),
        _ => Err(AppError::BadRequest("Invalid action")),
    }
}

/// Checks the key against the vendor's subscription endpoint.
pub async fn test_connection(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let url = format!("{}/v1/user/subscription", state.voice_api_base);
    let http = state.http.clone();
    let credentials = credentials(state)?;

    let resp = http
        .get(url)
        .header(header::ACCEPT, "application/json")
        .header("xi-api-key", &credentials.api_key)
        .send()
        .await
        .map_err(|err| AppError::Voice(err.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(AppError::Voice(format!("API request failed: {status}")));
    }
    let subscription: Subscription = resp
        .json()
        .await
        .map_err(|err| AppError::Voice(err.to_string()))?;
    debug!("voice subscription: {subscription:?}");

    Ok(Json(json!({
        "success": true,
        "message": "ElevenLabs connection successful",
        "agentId": credentials.agent_id,
        "subscription": {
            "tier": subscription.tier,
            "character_count": subscription.character_count,
            "character_limit": subscription.character_limit,
        },
    })))
}

/// Advertises the header-authenticated socket URL.
pub async fn websocket(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let credentials = credentials(state)?;
    Ok(Json(json!({
        "success": true,
        "websocket_url": credentials.websocket_url(),
        "headers": { "xi-api-key": credentials.api_key },
    })))
}
