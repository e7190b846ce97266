//! Conversation-related types.
//!
//! A [`Conversation`] is an append-only log of [`Turn`]s. The only mutation
//! allowed on an existing turn is appending streamed text to the in-flight
//! assistant turn, which is always the last one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use survey_chat_model::{ChatMessage, Role};

/// Opening line of every survey.
pub const GREETING: &str = "Hi! I'd love to learn about your startup and how your team works. Let's start with something simple - what's your company about and what problem are you solving?";

/// Identifier of a turn, unique and increasing within a conversation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TurnId(pub u64);

/// One message unit in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub(crate) id: TurnId,
    pub(crate) role: Role,
    pub(crate) content: String,
    pub(crate) timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) in_flight: bool,
}

impl Turn {
    /// Returns the identifier of this turn.
    #[inline]
    pub fn id(&self) -> TurnId {
        self.id
    }

    /// Returns the author of this turn.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text of this turn.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns when this turn was created.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether this turn is still receiving streamed deltas.
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

/// Represents a conversation.
#[derive(Clone, Debug)]
pub struct Conversation {
    turns: Vec<Turn>,
    next_id: u64,
}

impl Conversation {
    /// Creates a conversation opened by the given assistant greeting.
    pub fn seeded<S: Into<String>>(greeting: S) -> Self {
        let mut conversation = Self {
            turns: Vec::new(),
            next_id: 1,
        };
        conversation.push(Role::Assistant, greeting.into(), false);
        conversation
    }

    fn push(&mut self, role: Role, content: String, in_flight: bool) -> TurnId {
        let id = TurnId(self.next_id);
        self.next_id += 1;
        self.turns.push(Turn {
            id,
            role,
            content,
            timestamp: Utc::now(),
            in_flight,
        });
        id
    }

    /// Appends a user turn.
    #[inline]
    pub fn push_user<S: Into<String>>(&mut self, content: S) -> TurnId {
        debug_assert!(self.in_flight().is_none());
        self.push(Role::User, content.into(), false)
    }

    /// Appends an empty assistant turn that will receive streamed deltas.
    ///
    /// Returns `None` if another turn is already in flight.
    pub fn begin_assistant(&mut self) -> Option<TurnId> {
        if self.in_flight().is_some() {
            return None;
        }
        Some(self.push(Role::Assistant, String::new(), true))
    }

    /// Appends a delta to the in-flight turn.
    ///
    /// Returns `false` if no turn is in flight.
    pub fn append_delta(&mut self, delta: &str) -> bool {
        match self.in_flight_mut() {
            Some(turn) => {
                turn.content.push_str(delta);
                true
            }
            None => false,
        }
    }

    /// Freezes the in-flight turn, returning its id.
    pub fn freeze(&mut self) -> Option<TurnId> {
        let turn = self.in_flight_mut()?;
        turn.in_flight = false;
        Some(turn.id)
    }

    /// Replaces the content of the in-flight turn and freezes it.
    pub fn overwrite_in_flight<S: Into<String>>(
        &mut self,
        content: S,
    ) -> Option<TurnId> {
        let turn = self.in_flight_mut()?;
        turn.content = content.into();
        turn.in_flight = false;
        Some(turn.id)
    }

    /// Returns the in-flight turn, if any.
    #[inline]
    pub fn in_flight(&self) -> Option<&Turn> {
        self.turns.last().filter(|turn| turn.in_flight)
    }

    #[inline]
    fn in_flight_mut(&mut self) -> Option<&mut Turn> {
        self.turns.last_mut().filter(|turn| turn.in_flight)
    }

    /// Returns all turns, including an in-flight one.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns turns whose content is final.
    pub fn committed(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|turn| !turn.in_flight)
    }

    /// Returns the user turns.
    pub fn user_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|turn| turn.role == Role::User)
    }

    /// Number of turns, including an in-flight one.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// A seeded conversation is never empty, this exists for clippy.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the newest committed assistant text.
    pub fn last_assistant_content(&self) -> Option<&str> {
        self.committed()
            .filter(|turn| turn.role == Role::Assistant)
            .last()
            .map(|turn| turn.content.as_str())
    }

    /// Builds the history sent to the model. The in-flight placeholder is
    /// not part of it.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.committed()
            .map(|turn| ChatMessage {
                role: turn.role,
                content: turn.content.clone(),
            })
            .collect()
    }
}

impl Default for Conversation {
    #[inline]
    fn default() -> Self {
        Self::seeded(GREETING)
    }
}
