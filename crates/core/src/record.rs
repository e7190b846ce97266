//! The transcript payload sent to the persistence endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use survey_chat_model::Role;
use uuid::Uuid;

use crate::conversation::Turn;

/// Why a persistence call happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitMode {
    /// The survey concluded.
    Normal,
    /// Periodic save after a completed response.
    AutoSave,
    /// The front-end is going away.
    Abrupt,
}

/// One transcript entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTurn {
    /// Author of the turn.
    pub role: Role,
    /// Final text of the turn.
    pub content: String,
    /// Creation time of the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&Turn> for RecordTurn {
    #[inline]
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role(),
            content: turn.content().to_owned(),
            timestamp: Some(turn.timestamp()),
        }
    }
}

/// The payload accepted by the persistence endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    /// The full transcript.
    pub conversation: Vec<RecordTurn>,
    /// The newest assistant text, used as the row summary.
    #[serde(default)]
    pub latest_response: String,
    /// Session length in seconds.
    #[serde(default)]
    pub session_duration: u64,
    /// Identifier shared by every record of one session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// Sent from the abrupt-exit path.
    #[serde(default)]
    pub is_abrupt_exit: bool,
    /// Sent from the auto-save path.
    #[serde(default)]
    pub is_auto_save: bool,
}

impl PersistedRecord {
    /// Builds a record for the given exit mode.
    pub fn new<'a>(
        turns: impl IntoIterator<Item = &'a Turn>,
        session_id: Option<Uuid>,
        session_duration: u64,
        mode: ExitMode,
    ) -> Self {
        let conversation: Vec<RecordTurn> =
            turns.into_iter().map(RecordTurn::from).collect();
        let latest_response = conversation
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.content.clone())
            .unwrap_or_default();
        Self {
            conversation,
            latest_response,
            session_duration,
            session_id,
            is_abrupt_exit: mode == ExitMode::Abrupt,
            is_auto_save: mode == ExitMode::AutoSave,
        }
    }

    /// Returns the exit mode encoded in the flags.
    #[inline]
    pub fn exit_mode(&self) -> ExitMode {
        if self.is_abrupt_exit {
            ExitMode::Abrupt
        } else if self.is_auto_save {
            ExitMode::AutoSave
        } else {
            ExitMode::Normal
        }
    }
}
