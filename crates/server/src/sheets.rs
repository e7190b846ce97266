//! The spreadsheet transcripts are stored in.
//!
//! One row per persistence call, 17 columns wide. The structured columns
//! between the duration and the raw conversation are reserved and written
//! empty.

use std::fmt::{self, Debug};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use survey_chat_core::{PersistedRecord, RecordTurn};
use survey_chat_model::Role;
use thiserror::Error;
use uuid::Uuid;

/// Column titles, A through Q.
pub const HEADER: [&str; 17] = [
    "Timestamp",
    "Session ID",
    "Duration (seconds)",
    "Role",
    "Team Size",
    "Location Setup",
    "Company Stage",
    "Industry Sector",
    "Project Management Tools",
    "Documentation Tools",
    "Communication Tools",
    "AI Usage",
    "Meeting Practices",
    "Main Pain Points",
    "Tool Satisfaction",
    "Looking to Change",
    "Raw Conversation",
];

const HEADER_RANGE: &str = "Sheet1!A1:Q1";
const ROWS_RANGE: &str = "Sheet1!A:Q";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const API_BASE_URL: &str = "https://sheets.googleapis.com";
const TOKEN_LIFETIME_SECS: i64 = 3600;
// Tokens are refreshed this long before they expire.
const TOKEN_LEEWAY_SECS: i64 = 60;

/// Errors of a [`SheetStore`].
#[derive(Debug, Error)]
pub enum SheetsError {
    /// The service account key could not sign a token.
    #[error("failed to sign the token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    /// The request could not be delivered.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The API answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// Status of the answer.
        status: StatusCode,
        /// Body of the answer.
        body: String,
    },
}

/// One spreadsheet row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetRow {
    /// When the row was written.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the session.
    pub session_id: Uuid,
    /// Session length in seconds.
    pub duration: u64,
    /// The transcript, one `role: content` paragraph per turn.
    pub conversation: String,
    /// Latest reply tagged with the exit path. Not stored in a column.
    pub summary: String,
}

impl SheetRow {
    /// Builds the row of `record`.
    pub fn from_record(
        record: &PersistedRecord,
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut summary = record.latest_response.clone();
        if record.is_abrupt_exit {
            summary.push_str(" [ABRUPT EXIT]");
        }
        if record.is_auto_save {
            summary.push_str(" [AUTO-SAVED]");
        }
        Self {
            timestamp,
            session_id,
            duration: record.session_duration,
            conversation: format_conversation(&record.conversation),
            summary,
        }
    }

    /// Returns the cells of the row, A through Q.
    pub fn cells(&self) -> Vec<Value> {
        let mut cells = Vec::with_capacity(HEADER.len());
        cells.push(json!(
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
        cells.push(json!(self.session_id.to_string()));
        // A zero duration means it was never measured.
        cells.push(match self.duration {
            0 => json!(""),
            secs => json!(secs),
        });
        cells.resize(HEADER.len() - 1, json!(""));
        cells.push(json!(self.conversation));
        cells
    }
}

fn format_conversation(turns: &[RecordTurn]) -> String {
    turns
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            format!("{role}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Where rows are written.
#[async_trait]
pub trait SheetStore: Send + Sync + 'static {
    /// Writes the header row. Rewriting it is harmless.
    async fn write_header(&self) -> Result<(), SheetsError>;

    /// Appends one row below the existing ones.
    async fn append_row(&self, row: &SheetRow) -> Result<(), SheetsError>;
}

/// Service account credentials of the spreadsheet.
#[derive(Clone, PartialEq, Eq)]
pub struct SheetsCredentials {
    /// Identifier of the spreadsheet.
    pub spreadsheet_id: String,
    /// Email of the service account.
    pub client_email: String,
    /// PEM encoded RSA key of the service account.
    pub private_key: String,
}

impl Debug for SheetsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetsCredentials")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// The Google Sheets values API, authenticated as a service account.
pub struct GoogleSheets {
    client: Client,
    credentials: SheetsCredentials,
    token_url: String,
    api_base_url: String,
    token: tokio::sync::Mutex<Option<CachedToken>>,
}

impl GoogleSheets {
    /// Creates a store writing to the spreadsheet of `credentials`.
    #[inline]
    pub fn new(client: Client, credentials: SheetsCredentials) -> Self {
        Self {
            client,
            credentials,
            token_url: TOKEN_URL.to_owned(),
            api_base_url: API_BASE_URL.to_owned(),
            token: tokio::sync::Mutex::new(None),
        }
    }

    /// Talks to other token and API endpoints.
    #[inline]
    pub fn with_endpoints<T: Into<String>, A: Into<String>>(
        mut self,
        token_url: T,
        api_base_url: A,
    ) -> Self {
        self.token_url = token_url.into();
        self.api_base_url = api_base_url.into().trim_end_matches('/').to_owned();
        self
    }

    async fn access_token(&self) -> Result<String, SheetsError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|token| token.expires_at > now) {
            return Ok(token.value.clone());
        }

        let claims = Claims {
            iss: &self.credentials.client_email,
            scope: SCOPE,
            aud: &self.token_url,
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)?;

        trace!("exchanging service account assertion for a token");
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = check_status(resp).await?.json().await?;

        let lifetime = token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS);
        let expires_at = now + Duration::seconds((lifetime - TOKEN_LEEWAY_SECS).max(0));
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{range}",
            self.api_base_url, self.credentials.spreadsheet_id
        )
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SheetsError::Status { status, body })
}

#[async_trait]
impl SheetStore for GoogleSheets {
    async fn write_header(&self) -> Result<(), SheetsError> {
        let token = self.access_token().await?;
        let url = format!("{}?valueInputOption=RAW", self.values_url(HEADER_RANGE));
        let resp = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&json!({ "values": [HEADER] }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn append_row(&self, row: &SheetRow) -> Result<(), SheetsError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}:append?valueInputOption=RAW",
            self.values_url(ROWS_RANGE)
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "values": [row.cells()] }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

impl Debug for GoogleSheets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleSheets")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// A store keeping rows in memory.
#[derive(Debug, Default)]
pub struct MemorySheets {
    header_writes: Mutex<usize>,
    rows: Mutex<Vec<SheetRow>>,
}

impl MemorySheets {
    /// How many times the header was written.
    pub fn header_writes(&self) -> usize {
        self.header_writes.lock().map(|count| *count).unwrap_or_default()
    }

    /// The rows appended so far.
    pub fn rows(&self) -> Vec<SheetRow> {
        self.rows
            .lock()
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SheetStore for MemorySheets {
    async fn write_header(&self) -> Result<(), SheetsError> {
        if let Ok(mut count) = self.header_writes.lock() {
            *count += 1;
        }
        Ok(())
    }

    async fn append_row(&self, row: &SheetRow) -> Result<(), SheetsError> {
        if let Ok(mut rows) = self.rows.lock() {
            rows.push(row.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use survey_chat_core::ExitMode;

    use super::*;

    fn record(mode: ExitMode, duration: u64) -> PersistedRecord {
        let mut record = PersistedRecord {
            conversation: vec![
                RecordTurn {
                    role: Role::Assistant,
                    content: "What's your role?".to_owned(),
                    timestamp: None,
                },
                RecordTurn {
                    role: Role::User,
                    content: "CTO".to_owned(),
                    timestamp: None,
                },
            ],
            latest_response: "What's your role?".to_owned(),
            session_duration: duration,
            session_id: None,
            is_abrupt_exit: false,
            is_auto_save: false,
        };
        record.is_abrupt_exit = mode == ExitMode::Abrupt;
        record.is_auto_save = mode == ExitMode::AutoSave;
        record
    }

    #[test]
    fn test_row_cells() {
        let session_id = Uuid::new_v4();
        let timestamp = DateTime::parse_from_rfc3339("2026-03-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let row = SheetRow::from_record(&record(ExitMode::Abrupt, 42), session_id, timestamp);

        let cells = row.cells();
        assert_eq!(cells.len(), HEADER.len());
        assert_eq!(cells[0], json!("2026-03-01T09:30:00.000Z"));
        assert_eq!(cells[1], json!(session_id.to_string()));
        assert_eq!(cells[2], json!(42));
        assert!(cells[3..16].iter().all(|cell| cell == &json!("")));
        assert_eq!(cells[16], json!("assistant: What's your role?\n\nuser: CTO"));
        assert_eq!(row.summary, "What's your role? [ABRUPT EXIT]");
    }

    #[test]
    fn test_unmeasured_duration() {
        let row = SheetRow::from_record(&record(ExitMode::AutoSave, 0), Uuid::new_v4(), Utc::now());
        assert_eq!(row.cells()[2], json!(""));
        assert!(row.summary.ends_with(" [AUTO-SAVED]"));
    }
}
