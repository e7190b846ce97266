use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use chrono::Utc;
use serde_json::{Value, json};
use survey_chat_core::PersistedRecord;
use survey_chat_core::wire::PersistAck;
use uuid::Uuid;

use super::{from_value, parse_body};
use crate::error::AppError;
use crate::sheets::SheetRow;
use crate::state::AppState;

const FAILED: &str = "Failed to save to Google Sheets";
const INIT_FAILED: &str = "Failed to initialize Google Sheets";

pub async fn save(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PersistAck>, AppError> {
    let sheets = state
        .sheets
        .ok_or(AppError::NotConfigured("Google Sheets not configured"))?;

    let body = parse_body(&body, FAILED)?;
    if !body.get("conversation").is_some_and(Value::is_array) {
        return Err(AppError::BadRequest("Invalid conversation format"));
    }
    let record: PersistedRecord = from_value(body, "Invalid conversation format")?;

    sheets
        .write_header()
        .await
        .map_err(|err| AppError::internal(FAILED, err))?;

    let session_id = record.session_id.unwrap_or_else(Uuid::new_v4);
    let row = SheetRow::from_record(&record, session_id, Utc::now());
    sheets
        .append_row(&row)
        .await
        .map_err(|err| AppError::internal(FAILED, err))?;
    info!(
        "saved {} turns of session {session_id}: {}",
        record.conversation.len(),
        row.summary
    );

    Ok(Json(PersistAck {
        success: true,
        session_id,
    }))
}

pub async fn initialize(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let sheets = state
        .sheets
        .ok_or_else(|| AppError::internal(INIT_FAILED, "Google Sheets not configured"))?;
    sheets
        .write_header()
        .await
        .map_err(|err| AppError::internal(INIT_FAILED, err))?;

    Ok(Json(json!({
        "success": true,
        "message": "Sheet initialized successfully",
    })))
}
