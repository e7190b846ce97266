//! Bodies exchanged between the front-end and the relay server.

use serde::{Deserialize, Serialize};
use survey_chat_model::{ChatMessage, ChatRequest, SessionContext};
use uuid::Uuid;

/// Most suggestions kept in one group.
pub const MAX_SUGGESTIONS_PER_GROUP: usize = 6;

/// Body of the chat endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    /// The ordered history, ending with the newest user turn.
    pub messages: Vec<ChatMessage>,
    /// Seconds since the session started.
    #[serde(default)]
    pub session_duration: u64,
    /// Ask the model for one final question.
    #[serde(default)]
    pub is_session_ending: bool,
    /// Ask the model to conclude.
    #[serde(default)]
    pub should_conclude: bool,
}

impl ChatPayload {
    /// Returns the session context carried by this payload.
    #[inline]
    pub fn context(&self) -> SessionContext {
        SessionContext {
            duration_secs: self.session_duration,
            should_conclude: self.should_conclude,
            is_session_ending: self.is_session_ending,
        }
    }
}

impl From<&ChatRequest> for ChatPayload {
    fn from(req: &ChatRequest) -> Self {
        Self {
            messages: req.messages.clone(),
            session_duration: req.context.duration_secs,
            is_session_ending: req.context.is_session_ending,
            should_conclude: req.context.should_conclude,
        }
    }
}

/// Body of the suggestions endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionQuery {
    /// The question the assistant just asked.
    pub question: String,
}

/// Answer options for one topic of a question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionGroup {
    /// Topic label.
    #[serde(default)]
    pub category: String,
    /// Short answer options.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Reply of the suggestions endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionGroups {
    /// Groups in display order, possibly empty.
    #[serde(default)]
    pub groups: Vec<SuggestionGroup>,
}

impl SuggestionGroups {
    /// Drops empty groups and caps every group at
    /// [`MAX_SUGGESTIONS_PER_GROUP`].
    pub fn capped(mut self) -> Self {
        self.groups.retain(|group| !group.suggestions.is_empty());
        for group in &mut self.groups {
            group.suggestions.truncate(MAX_SUGGESTIONS_PER_GROUP);
        }
        self
    }
}

/// Reply of the persistence endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistAck {
    /// Always `true` on success.
    pub success: bool,
    /// The identifier the row was written under.
    pub session_id: Uuid,
}

/// Error body returned by every endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_chat_payload_wire_format() {
        let req = ChatRequest {
            messages: vec![ChatMessage::assistant("Hi!"), ChatMessage::user("Yo")],
            context: SessionContext {
                duration_secs: 12,
                should_conclude: true,
                is_session_ending: false,
            },
            ..Default::default()
        };
        let payload = ChatPayload::from(&req);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "messages": [
                    { "role": "assistant", "content": "Hi!" },
                    { "role": "user", "content": "Yo" },
                ],
                "sessionDuration": 12,
                "isSessionEnding": false,
                "shouldConclude": true,
            })
        );
        assert_eq!(payload.context(), req.context);

        let bare: ChatPayload = serde_json::from_value(json!({ "messages": [] })).unwrap();
        assert_eq!(bare, ChatPayload::default());
    }

    #[test]
    fn test_suggestions_capped() {
        let groups: SuggestionGroups = serde_json::from_value(json!({
            "groups": [
                { "category": "Tools", "suggestions": ["a", "b", "c", "d", "e", "f", "g"] },
                { "category": "Empty", "suggestions": [] },
            ]
        }))
        .unwrap();
        let groups = groups.capped();
        assert_eq!(groups.groups.len(), 1);
        assert_eq!(groups.groups[0].suggestions.len(), MAX_SUGGESTIONS_PER_GROUP);
    }
}
