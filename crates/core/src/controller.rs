//! The survey state machine.
//!
//! [`Controller`] performs no I/O. Callers feed it user input, stream
//! events and clock ticks, send the [`ChatRequest`]s it builds, and drain
//! the records it queues for persistence.

use std::fmt::{self, Display};

use survey_chat_model::{ChatRequest, SessionContext};
use tokio::time::Instant;
use uuid::Uuid;

use crate::clock::SessionClock;
use crate::conversation::Conversation;
use crate::heuristic::{
    Assessment, CompletionPolicy, ContentPolicy, PolicyInput, is_conclusion,
};
use crate::record::{ExitMode, PersistedRecord};

/// Shown in place of the assistant reply when the request fails.
pub const FAILURE_MESSAGE: &str =
    "I'm sorry, there was an error processing your message. Please try again.";

// Auto-saves start once the conversation holds more than the greeting and
// the first user turn.
const AUTO_SAVE_MIN_TURNS: usize = 2;

/// Whether a request is in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the user.
    #[default]
    Idle,
    /// Streaming the assistant reply.
    AwaitingResponse,
}

/// Why a submission was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// The content is empty or whitespace only.
    Empty,
    /// A reply is still streaming.
    Busy,
    /// The survey has ended.
    Ending,
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Empty => write!(f, "message is empty"),
            SubmitError::Busy => write!(f, "a reply is still streaming"),
            SubmitError::Ending => write!(f, "the survey has ended"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Owns the conversation and drives one survey session.
#[derive(Debug)]
pub struct Controller {
    conversation: Conversation,
    clock: SessionClock,
    policy: Box<dyn CompletionPolicy>,
    phase: Phase,
    ending: bool,
    unloaded: bool,
    session_id: Option<Uuid>,
    outbox: Vec<PersistedRecord>,
}

impl Controller {
    /// Creates a controller over a freshly seeded conversation.
    #[inline]
    pub fn new(policy: Box<dyn CompletionPolicy>) -> Self {
        Self::with_conversation(Conversation::default(), policy)
    }

    /// Creates a controller over the given conversation.
    pub fn with_conversation(
        conversation: Conversation,
        policy: Box<dyn CompletionPolicy>,
    ) -> Self {
        Self {
            conversation,
            clock: SessionClock::default(),
            policy,
            phase: Phase::Idle,
            ending: false,
            unloaded: false,
            session_id: None,
            outbox: Vec::new(),
        }
    }

    /// The conversation so far.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether a request is in flight.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the survey has ended.
    #[inline]
    pub fn is_ending(&self) -> bool {
        self.ending
    }

    /// Whether the next submission would be accepted.
    #[inline]
    pub fn is_ready_for_input(&self) -> bool {
        self.phase == Phase::Idle && !self.ending
    }

    /// Whether the session clock is running.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.clock.is_started()
    }

    /// Identifier shared by every record of this session.
    #[inline]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Whole seconds since the session started.
    #[inline]
    pub fn duration_secs(&self, now: Instant) -> u64 {
        self.clock.duration_secs(now)
    }

    /// Starts the session on the first keystroke.
    pub fn note_keystroke(&mut self, now: Instant) {
        if self.clock.start(now) {
            let session_id = Uuid::new_v4();
            debug!("session {session_id} started");
            self.session_id = Some(session_id);
        }
    }

    /// Accepts a user message and returns the request to send.
    pub fn submit(
        &mut self,
        content: &str,
        now: Instant,
    ) -> Result<ChatRequest, SubmitError> {
        if self.ending {
            return Err(SubmitError::Ending);
        }
        if self.phase != Phase::Idle {
            return Err(SubmitError::Busy);
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(SubmitError::Empty);
        }
        self.note_keystroke(now);

        self.conversation.push_user(content);
        let assessment = self.assess(now);
        // History is captured before the placeholder exists.
        let messages = self.conversation.to_chat_messages();
        self.conversation.begin_assistant();
        self.phase = Phase::AwaitingResponse;

        Ok(ChatRequest {
            system: None,
            messages,
            context: SessionContext {
                duration_secs: self.clock.duration_secs(now),
                should_conclude: assessment.should_conclude,
                is_session_ending: assessment.is_session_ending,
            },
            max_tokens: None,
        })
    }

    /// Appends streamed text to the pending reply.
    pub fn apply_delta(&mut self, delta: &str) -> bool {
        if self.phase != Phase::AwaitingResponse {
            warn!("delta outside of a request, dropped");
            return false;
        }
        self.conversation.append_delta(delta)
    }

    /// Handles the stream-complete signal.
    pub fn complete_stream(&mut self, now: Instant) {
        if self.phase != Phase::AwaitingResponse {
            return;
        }
        self.conversation.freeze();
        self.phase = Phase::Idle;

        if self.conversation.len() > AUTO_SAVE_MIN_TURNS && self.clock.is_started() {
            self.queue_record(ExitMode::AutoSave, now);
        }

        let concluded = self
            .conversation
            .last_assistant_content()
            .is_some_and(is_conclusion);
        if concluded {
            debug!("closing phrase received");
            self.enter_ending(now);
        } else if self.assess(now).force_ending {
            self.enter_ending(now);
        }
    }

    /// Handles a failed request or a broken stream.
    pub fn fail_stream(&mut self) {
        if self.phase != Phase::AwaitingResponse {
            return;
        }
        self.conversation.overwrite_in_flight(FAILURE_MESSAGE);
        self.phase = Phase::Idle;
    }

    /// Lets time-based policies end the session while the user is idle.
    pub fn tick(&mut self, now: Instant) {
        if self.phase != Phase::Idle || self.ending || !self.clock.is_started() {
            return;
        }
        if self.assess(now).force_ending {
            debug!("wind-down boundary crossed");
            self.enter_ending(now);
        }
    }

    /// Handles the front-end going away.
    ///
    /// Queues at most one abrupt-exit record, built from committed turns
    /// only. Nothing is queued once the survey has ended normally.
    pub fn unload(&mut self, now: Instant) {
        if self.unloaded {
            return;
        }
        self.unloaded = true;
        if self.ending {
            return;
        }
        if self.clock.is_started() && self.conversation.committed().count() > 1 {
            self.queue_record(ExitMode::Abrupt, now);
        }
    }

    /// Takes the records queued for persistence.
    #[inline]
    pub fn drain_outbox(&mut self) -> Vec<PersistedRecord> {
        std::mem::take(&mut self.outbox)
    }

    fn assess(&self, now: Instant) -> Assessment {
        self.policy.assess(&PolicyInput {
            conversation: &self.conversation,
            elapsed: self.clock.elapsed(now),
        })
    }

    fn enter_ending(&mut self, now: Instant) {
        if self.ending {
            return;
        }
        self.ending = true;
        self.queue_record(ExitMode::Normal, now);
    }

    fn queue_record(&mut self, mode: ExitMode, now: Instant) {
        let record = PersistedRecord::new(
            self.conversation.committed(),
            self.session_id,
            self.clock.duration_secs(now),
            mode,
        );
        self.outbox.push(record);
    }
}

impl Default for Controller {
    #[inline]
    fn default() -> Self {
        Self::new(Box::new(ContentPolicy::default()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use survey_chat_model::Role;

    use super::*;
    use crate::heuristic::DurationPolicy;

    fn exchange(controller: &mut Controller, input: &str, reply: &[&str], now: Instant) {
        controller.submit(input, now).unwrap();
        for delta in reply {
            assert!(controller.apply_delta(delta));
        }
        controller.complete_stream(now);
    }

    fn modes(records: &[PersistedRecord]) -> Vec<ExitMode> {
        records.iter().map(PersistedRecord::exit_mode).collect()
    }

    #[test]
    fn test_reply_is_concatenation_of_deltas() {
        let now = Instant::now();
        let mut controller = Controller::default();
        let request = controller.submit("  We sell payroll software  ", now).unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].content, "We sell payroll software");
        assert_eq!(controller.phase(), Phase::AwaitingResponse);

        for delta in ["Nice", " - what's", " your ", "role?"] {
            controller.apply_delta(delta);
        }
        controller.complete_stream(now);
        assert_eq!(
            controller.conversation().last_assistant_content(),
            Some("Nice - what's your role?")
        );
        assert!(controller.is_ready_for_input());
    }

    #[test]
    fn test_rejects_input_while_awaiting() {
        let now = Instant::now();
        let mut controller = Controller::default();
        controller.submit("first", now).unwrap();
        let len = controller.conversation().len();

        assert_eq!(controller.submit("second", now), Err(SubmitError::Busy));
        assert_eq!(controller.conversation().len(), len);

        controller.complete_stream(now);
        assert!(controller.submit("second", now).is_ok());
    }

    #[test]
    fn test_rejects_empty_input() {
        let mut controller = Controller::default();
        assert_eq!(
            controller.submit(" \n\t", Instant::now()),
            Err(SubmitError::Empty)
        );
        assert!(!controller.is_started());
    }

    #[test]
    fn test_failure_overwrites_placeholder() {
        let now = Instant::now();
        let mut controller = Controller::default();
        controller.submit("hello", now).unwrap();
        controller.apply_delta("partial");
        controller.fail_stream();

        assert_eq!(
            controller.conversation().last_assistant_content(),
            Some(FAILURE_MESSAGE)
        );
        assert!(!controller.is_ending());
        assert!(controller.is_ready_for_input());
        assert!(controller.drain_outbox().is_empty());
    }

    #[test]
    fn test_conclusion_enters_ending_once() {
        let now = Instant::now();
        let mut controller = Controller::default();
        exchange(&mut controller, "CTO here", &["Are you remote?"], now);
        assert_eq!(modes(&controller.drain_outbox()), vec![ExitMode::AutoSave]);

        exchange(&mut controller, "Remote", &["Perfect, ", "thanks!"], now);
        assert!(controller.is_ending());
        assert!(!controller.is_ready_for_input());
        let records = controller.drain_outbox();
        assert_eq!(modes(&records), vec![ExitMode::AutoSave, ExitMode::Normal]);
        assert_eq!(records[0].session_id, records[1].session_id);
        assert!(records[0].session_id.is_some());

        let len = controller.conversation().len();
        assert_eq!(controller.submit("one more", now), Err(SubmitError::Ending));
        assert_eq!(controller.conversation().len(), len);

        controller.tick(now + Duration::from_secs(120));
        controller.unload(now);
        assert!(controller.drain_outbox().is_empty());
    }

    #[test]
    fn test_conclusion_flag_is_advisory() {
        let now = Instant::now();
        let mut controller = Controller::default();
        exchange(&mut controller, "I'm the CTO", &["Setup?"], now);
        exchange(&mut controller, "Fully remote", &["Tools?"], now);
        let request = controller
            .submit("Slack, and Claude for everything", now)
            .unwrap();
        assert!(request.context.should_conclude);

        // The model ignores the instruction.
        controller.apply_delta("What's your stage?");
        controller.complete_stream(now);
        assert!(!controller.is_ending());
    }

    #[test]
    fn test_single_rich_turn_does_not_conclude() {
        let mut controller = Controller::default();
        let request = controller
            .submit(
                "We're a 5-person remote fintech team using Linear and Slack, and we use Claude daily",
                Instant::now(),
            )
            .unwrap();
        assert!(!request.context.should_conclude);
    }

    #[test]
    fn test_duration_policy_forces_ending_on_tick() {
        let t0 = Instant::now();
        let mut controller = Controller::new(Box::new(DurationPolicy::default()));
        controller.note_keystroke(t0);

        let request = controller.submit("hello", t0 + Duration::from_secs(52)).unwrap();
        assert!(request.context.is_session_ending);
        assert!(!request.context.should_conclude);
        assert_eq!(request.context.duration_secs, 52);

        // Boundary crossed mid-stream, nothing happens until idle.
        controller.tick(t0 + Duration::from_secs(61));
        assert!(!controller.is_ending());
        controller.apply_delta("Final question - what value do you get from AI?");
        controller.complete_stream(t0 + Duration::from_secs(62));
        assert!(controller.is_ending());
        assert_eq!(
            modes(&controller.drain_outbox()),
            vec![ExitMode::AutoSave, ExitMode::Normal]
        );
    }

    #[test]
    fn test_duration_policy_tick_while_idle() {
        let t0 = Instant::now();
        let mut controller = Controller::new(Box::new(DurationPolicy::default()));
        controller.tick(t0 + Duration::from_secs(90));
        assert!(!controller.is_ending());

        controller.note_keystroke(t0);
        controller.tick(t0 + Duration::from_secs(59));
        assert!(!controller.is_ending());
        controller.tick(t0 + Duration::from_secs(60));
        assert!(controller.is_ending());
        let records = controller.drain_outbox();
        assert_eq!(modes(&records), vec![ExitMode::Normal]);
        assert_eq!(records[0].session_duration, 60);
    }

    #[test]
    fn test_unload_requires_started_session() {
        let now = Instant::now();
        let mut controller = Controller::default();
        controller.note_keystroke(now);
        controller.unload(now);
        assert!(controller.drain_outbox().is_empty());
    }

    #[test]
    fn test_unload_fires_once_with_committed_turns() {
        let now = Instant::now();
        let mut controller = Controller::default();
        exchange(&mut controller, "We are remote", &["Tools?"], now);
        controller.drain_outbox();

        controller.submit("Slack", now).unwrap();
        controller.apply_delta("half a repl");
        controller.unload(now);
        controller.unload(now);

        let records = controller.drain_outbox();
        assert_eq!(modes(&records), vec![ExitMode::Abrupt]);
        let turns = &records[0].conversation;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[3].role, Role::User);
        assert_eq!(records[0].latest_response, "Tools?");
    }
}
