//! Running a survey on its own task.
//!
//! A [`Session`] owns a [`Controller`] on a dedicated tokio task and feeds it
//! from a mailbox. Replies stream in spawned tasks that post their deltas
//! back to the same mailbox, so the controller is only ever touched by the
//! session task. Messages are handled immediately, whatever the controller
//! is doing: a submission that arrives while a reply is streaming is
//! rejected rather than queued.

use std::fmt::{self, Debug, Display};
use std::sync::Arc;
use std::time::Duration;

use survey_chat_model::{ChatProvider, ChatRequest};
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::Instrument;
use uuid::Uuid;

use crate::chat_client::{ChatClient, ChatClientError};
use crate::controller::{Controller, Phase, SubmitError};
use crate::conversation::{Conversation, Turn};
use crate::heuristic::{CompletionPolicy, ContentPolicy};
use crate::persistence::{NoopGateway, PersistenceGateway};

type DeltaFn = Box<dyn Fn(&str) + Send + Sync>;
type StateChangeFn = Box<dyn Fn(&SessionSnapshot) + Send + Sync>;
type IdleFn = Box<dyn Fn() + Send + Sync>;

/// A point-in-time view of a session.
#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
    /// Every turn, including an in-flight one.
    pub turns: Vec<Turn>,
    /// Whether a reply is streaming.
    pub phase: Phase,
    /// Whether the survey has ended.
    pub is_ending: bool,
    /// Whether a submission would be accepted.
    pub is_ready_for_input: bool,
    /// Whole seconds since the first keystroke.
    pub duration_secs: u64,
    /// Identifier shared by every persisted record.
    pub session_id: Option<Uuid>,
}

/// Errors returned by [`Session`] operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// The controller refused the submission.
    Rejected(SubmitError),
    /// The session task has terminated.
    Closed,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Rejected(err) => Display::fmt(err, f),
            SessionError::Closed => write!(f, "the session has been closed"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SubmitError> for SessionError {
    #[inline]
    fn from(err: SubmitError) -> Self {
        SessionError::Rejected(err)
    }
}

/// [`Session`] builder.
pub struct SessionBuilder {
    chat_client: ChatClient,
    conversation: Conversation,
    policy: Box<dyn CompletionPolicy>,
    gateway: Arc<dyn PersistenceGateway>,
    tick_interval: Duration,
    on_delta: Option<DeltaFn>,
    on_state_change: Option<StateChangeFn>,
    on_idle: Option<IdleFn>,
}

impl SessionBuilder {
    /// Creates a new builder with the specified chat provider.
    #[inline]
    pub fn with_chat_provider<P: ChatProvider + 'static>(provider: P) -> Self {
        Self::with_chat_client(ChatClient::new(provider))
    }

    /// Creates a new builder with an already wrapped provider.
    pub fn with_chat_client(chat_client: ChatClient) -> Self {
        Self {
            chat_client,
            conversation: Conversation::default(),
            policy: Box::new(ContentPolicy::default()),
            gateway: Arc::new(NoopGateway),
            tick_interval: Duration::from_secs(1),
            on_delta: None,
            on_state_change: None,
            on_idle: None,
        }
    }

    /// Replaces the completion policy.
    #[inline]
    pub fn with_policy<P: CompletionPolicy>(mut self, policy: P) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Sets where transcripts are persisted.
    #[inline]
    pub fn with_gateway<G: PersistenceGateway>(mut self, gateway: G) -> Self {
        self.gateway = Arc::new(gateway);
        self
    }

    /// Starts from the given conversation instead of the default greeting.
    #[inline]
    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    /// Changes how often time-based policies are consulted.
    #[inline]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Attaches a callback invoked for every streamed delta.
    #[inline]
    pub fn on_delta(mut self, on_delta: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_delta = Some(Box::new(on_delta));
        self
    }

    /// Attaches a callback invoked when the session state changes, that is
    /// when input readiness flips or the survey ends.
    #[inline]
    pub fn on_state_change(
        mut self,
        on_state_change: impl Fn(&SessionSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_change = Some(Box::new(on_state_change));
        self
    }

    /// Attaches a callback invoked whenever a reply finishes, successfully
    /// or not.
    #[inline]
    pub fn on_idle(mut self, on_idle: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_idle = Some(Box::new(on_idle));
        self
    }

    /// Spawns the session task.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn build(self) -> Session {
        let SessionBuilder {
            chat_client,
            conversation,
            policy,
            gateway,
            tick_interval,
            on_delta,
            on_state_change,
            on_idle,
        } = self;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            controller: Controller::with_conversation(conversation, policy),
            chat_client,
            gateway,
            stream_tx,
            stream_task: None,
            stream_seq: 0,
            persist_tasks: JoinSet::new(),
            on_delta,
            on_state_change,
            on_idle,
        };
        let task = tokio::spawn(
            driver
                .run(cmd_rx, stream_rx, tick_interval)
                .instrument(debug_span!("session")),
        );
        Session { cmd_tx, task }
    }
}

/// Handle to a running survey session.
///
/// Dropping the handle has the same effect as [`Session::unload`].
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl Session {
    /// Records a keystroke, which starts the session clock.
    #[inline]
    pub fn note_keystroke(&self) {
        self.cmd_tx.send(Command::Keystroke).ok();
    }

    /// Submits a user message. Returns once the request has been started.
    pub async fn submit<S: Into<String>>(&self, content: S) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Submit {
                content: content.into(),
                reply_tx,
            })
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }

    /// Returns the current state of the session.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Snapshot(reply_tx))
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }

    /// Signals that the front-end is going away.
    ///
    /// The streaming reply, if any, is abandoned, an abrupt-exit record is
    /// persisted if the session has content, and the session task exits.
    #[inline]
    pub fn unload(&self) {
        self.cmd_tx.send(Command::Unload).ok();
    }

    /// Unloads the session and waits until the session task has exited and
    /// every pending persistence call has finished.
    pub async fn closed(self) {
        let Session { cmd_tx, task } = self;
        drop(cmd_tx);
        if let Err(err) = task.await {
            error!("session task failed: {err}");
        }
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

enum Command {
    Keystroke,
    Submit {
        content: String,
        reply_tx: oneshot::Sender<Result<(), SubmitError>>,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Unload,
}

enum StreamEvent {
    Delta {
        seq: u64,
        text: String,
    },
    Finished {
        seq: u64,
        result: Result<(), ChatClientError>,
    },
}

struct Driver {
    controller: Controller,
    chat_client: ChatClient,
    gateway: Arc<dyn PersistenceGateway>,
    stream_tx: mpsc::UnboundedSender<StreamEvent>,
    stream_task: Option<JoinHandle<()>>,
    stream_seq: u64,
    persist_tasks: JoinSet<()>,
    on_delta: Option<DeltaFn>,
    on_state_change: Option<StateChangeFn>,
    on_idle: Option<IdleFn>,
}

impl Driver {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut stream_rx: mpsc::UnboundedReceiver<StreamEvent>,
        tick_interval: Duration,
    ) {
        debug!("started");
        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Unload) | None => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                Some(event) = stream_rx.recv() => {
                    self.handle_stream_event(event);
                }
                _ = ticker.tick() => {
                    self.handle_tick();
                }
                Some(res) = self.persist_tasks.join_next(),
                    if !self.persist_tasks.is_empty() =>
                {
                    if let Err(err) = res {
                        warn!("persistence task failed: {err}");
                    }
                }
            }
        }

        self.shutdown().await;
        debug!("will terminate");
    }

    fn handle_command(&mut self, cmd: Command) {
        let now = Instant::now();
        match cmd {
            Command::Keystroke => {
                let started = self.controller.is_started();
                self.controller.note_keystroke(now);
                if !started {
                    self.notify_state_change();
                }
            }
            Command::Submit { content, reply_tx } => {
                match self.controller.submit(&content, now) {
                    Ok(req) => {
                        self.start_stream(req);
                        reply_tx.send(Ok(())).ok();
                        self.notify_state_change();
                    }
                    Err(err) => {
                        debug!("submission rejected: {err}");
                        reply_tx.send(Err(err)).ok();
                    }
                }
            }
            Command::Snapshot(reply_tx) => {
                reply_tx.send(self.snapshot(now)).ok();
            }
            // Handled by the run loop.
            Command::Unload => {}
        }
    }

    fn start_stream(&mut self, req: ChatRequest) {
        self.stream_seq += 1;
        let seq = self.stream_seq;
        let chat_client = self.chat_client.clone();
        let stream_tx = self.stream_tx.clone();

        let task = tokio::spawn(
            async move {
                let result = stream_reply(&chat_client, req, seq, &stream_tx).await;
                stream_tx.send(StreamEvent::Finished { seq, result }).ok();
            }
            .instrument(trace_span!("stream", seq)),
        );
        if let Some(stale) = self.stream_task.replace(task) {
            stale.abort();
        }
    }

    fn handle_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Delta { seq, text } => {
                if seq != self.stream_seq {
                    return;
                }
                if self.controller.apply_delta(&text) {
                    if let Some(on_delta) = &self.on_delta {
                        on_delta(&text);
                    }
                }
            }
            StreamEvent::Finished { seq, result } => {
                if seq != self.stream_seq {
                    return;
                }
                self.stream_task = None;
                let now = Instant::now();
                match result {
                    Ok(()) => self.controller.complete_stream(now),
                    Err(err) => {
                        warn!("reply failed: {err}");
                        self.controller.fail_stream();
                    }
                }
                self.flush_outbox();
                self.notify_state_change();
                if let Some(on_idle) = &self.on_idle {
                    on_idle();
                }
            }
        }
    }

    fn handle_tick(&mut self) {
        let was_ending = self.controller.is_ending();
        self.controller.tick(Instant::now());
        if self.controller.is_ending() != was_ending {
            self.flush_outbox();
            self.notify_state_change();
        }
    }

    fn flush_outbox(&mut self) {
        for record in self.controller.drain_outbox() {
            let gateway = Arc::clone(&self.gateway);
            self.persist_tasks.spawn(async move {
                let mode = record.exit_mode();
                match gateway.persist(record).await {
                    Ok(()) => debug!("persisted {mode:?} record"),
                    Err(err) => warn!("failed to persist {mode:?} record: {err}"),
                }
            });
        }
    }

    fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            turns: self.controller.conversation().turns().to_vec(),
            phase: self.controller.phase(),
            is_ending: self.controller.is_ending(),
            is_ready_for_input: self.controller.is_ready_for_input(),
            duration_secs: self.controller.duration_secs(now),
            session_id: self.controller.session_id(),
        }
    }

    fn notify_state_change(&self) {
        if let Some(on_state_change) = &self.on_state_change {
            on_state_change(&self.snapshot(Instant::now()));
        }
    }

    async fn shutdown(&mut self) {
        if let Some(task) = self.stream_task.take() {
            trace!("abandoning the streaming reply");
            task.abort();
        }
        self.controller.unload(Instant::now());
        self.flush_outbox();
        while let Some(res) = self.persist_tasks.join_next().await {
            if let Err(err) = res {
                warn!("persistence task failed: {err}");
            }
        }
    }
}

async fn stream_reply(
    chat_client: &ChatClient,
    req: ChatRequest,
    seq: u64,
    stream_tx: &mpsc::UnboundedSender<StreamEvent>,
) -> Result<(), ChatClientError> {
    let mut stream = chat_client.open(req).await?;
    while let Some(text) = stream.next_delta().await? {
        if stream_tx.send(StreamEvent::Delta { seq, text }).is_err() {
            break;
        }
    }
    Ok(())
}
