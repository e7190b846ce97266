use chrono::Utc;
use survey_chat_core::{PersistedRecord, RecordTurn};
use survey_chat_model::Role;
use uuid::Uuid;

use crate::frames::VoiceEvent;

/// Turns heard during a voice conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoiceTranscript {
    turns: Vec<RecordTurn>,
}

impl VoiceTranscript {
    /// Records the turn carried by `event`, if any.
    pub fn apply(&mut self, event: &VoiceEvent) {
        let (role, content) = match event {
            VoiceEvent::AgentResponse(text) => (Role::Assistant, text),
            VoiceEvent::UserTranscript(text) => (Role::User, text),
            VoiceEvent::Audio(_) | VoiceEvent::Ping(_) => return,
        };
        self.turns.push(RecordTurn {
            role,
            content: content.clone(),
            timestamp: Some(Utc::now()),
        });
    }

    /// The turns so far.
    #[inline]
    pub fn turns(&self) -> &[RecordTurn] {
        &self.turns
    }

    /// Whether nothing was heard yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Builds the record persisted when the conversation ends. The summary
    /// is the newest turn, whoever said it.
    pub fn to_record(&self, session_id: Uuid, session_duration: u64) -> PersistedRecord {
        PersistedRecord {
            conversation: self.turns.clone(),
            latest_response: self
                .turns
                .last()
                .map(|turn| turn.content.clone())
                .unwrap_or_default(),
            session_duration,
            session_id: Some(session_id),
            is_abrupt_exit: false,
            is_auto_save: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use survey_chat_core::ExitMode;

    use super::*;

    #[test]
    fn test_collects_spoken_turns() {
        let mut transcript = VoiceTranscript::default();
        transcript.apply(&VoiceEvent::AgentResponse("Hey! What's your role?".to_owned()));
        transcript.apply(&VoiceEvent::Audio("AAA=".to_owned()));
        transcript.apply(&VoiceEvent::Ping(json!(1)));
        transcript.apply(&VoiceEvent::UserTranscript("Founder".to_owned()));
        assert_eq!(transcript.turns().len(), 2);

        let record = transcript.to_record(Uuid::nil(), 9);
        assert_eq!(record.exit_mode(), ExitMode::Normal);
        assert_eq!(record.latest_response, "Founder");
        assert_eq!(record.conversation[0].role, Role::Assistant);
    }
}
