use serde::{Deserialize, Serialize};

/// Who authored a turn.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person taking the survey.
    User,
    /// The interviewer model.
    Assistant,
}

/// One history entry sent to the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: Role,
    /// Text of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Session state that travels alongside the history.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct SessionContext {
    /// Seconds elapsed since the session started.
    pub duration_secs: u64,
    /// The local heuristic believes enough has been gathered, and the model
    /// should wrap up. Advisory only.
    pub should_conclude: bool,
    /// The session is winding down, the model should ask one last question.
    pub is_session_ending: bool,
}

/// A request to be sent to the chat provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChatRequest {
    /// The system instructions, if the provider is the one that owns them.
    pub system: Option<String>,
    /// The ordered conversation history.
    pub messages: Vec<ChatMessage>,
    /// Session context for this turn.
    pub context: SessionContext,
    /// Upper bound of generated tokens, the provider default if `None`.
    pub max_tokens: Option<u32>,
}
