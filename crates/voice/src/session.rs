use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use survey_chat_core::PersistenceGateway;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::Instrument;
use uuid::Uuid;

use crate::credentials::VoiceCredentials;
use crate::frames::{ControlFrame, OutgoingFrame, VoiceEvent, parse_frame};
use crate::pcm;
use crate::transcript::VoiceTranscript;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors of a [`VoiceSession`].
#[derive(Debug, Error)]
pub enum VoiceError {
    /// The WebSocket could not be opened.
    #[error("failed to connect to the voice agent: {0}")]
    Connect(#[from] tungstenite::Error),
    /// The conversation is over.
    #[error("the voice conversation has ended")]
    Closed,
}

/// How to reach the voice agent.
#[derive(Clone, Debug)]
pub struct VoiceConfig {
    credentials: VoiceCredentials,
    url: String,
    init_delay: Duration,
}

impl VoiceConfig {
    /// Creates a configuration for the vendor's conversation endpoint.
    pub fn new(credentials: VoiceCredentials) -> Self {
        Self {
            url: credentials.conversation_url(),
            credentials,
            init_delay: Duration::from_millis(100),
        }
    }

    /// Connects somewhere else.
    #[inline]
    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = url.into();
        self
    }

    /// Changes the pause between authenticating and starting the
    /// conversation.
    #[inline]
    pub fn with_init_delay(mut self, init_delay: Duration) -> Self {
        self.init_delay = init_delay;
        self
    }
}

enum Outgoing {
    Frame(OutgoingFrame),
    Close,
}

// Everything tied to the open socket. Dropping it tears the socket down.
struct VoiceResources {
    frame_tx: mpsc::UnboundedSender<Outgoing>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl Drop for VoiceResources {
    fn drop(&mut self) {
        self.writer.abort();
        self.reader.abort();
    }
}

#[derive(Default)]
enum Save {
    #[default]
    NotStarted,
    Running(JoinHandle<()>),
    Finished,
}

struct Recorder {
    transcript: Mutex<VoiceTranscript>,
    save: Mutex<Save>,
    session_id: Uuid,
    started_at: Instant,
    gateway: Arc<dyn PersistenceGateway>,
}

impl Recorder {
    fn record(&self, event: &VoiceEvent) {
        if let Ok(mut transcript) = self.transcript.lock() {
            transcript.apply(event);
        }
    }

    fn transcript(&self) -> VoiceTranscript {
        self.transcript
            .lock()
            .map(|transcript| transcript.clone())
            .unwrap_or_default()
    }

    // The save runs on its own task, so tearing down the socket tasks never
    // cancels it.
    fn persist_once(&self) {
        let Ok(mut save) = self.save.lock() else {
            return;
        };
        if !matches!(*save, Save::NotStarted) {
            return;
        }
        *save = Save::Finished;

        let transcript = self.transcript();
        if transcript.is_empty() {
            debug!("nothing was said, skipping persistence");
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no runtime to persist the voice transcript on");
            return;
        };
        let duration = self.started_at.elapsed().as_secs();
        let record = transcript.to_record(self.session_id, duration);
        let gateway = Arc::clone(&self.gateway);
        let task = handle.spawn(
            async move {
                match gateway.persist(record).await {
                    Ok(()) => debug!("voice transcript persisted"),
                    Err(err) => warn!("failed to persist voice transcript: {err}"),
                }
            }
            .in_current_span(),
        );
        *save = Save::Running(task);
    }

    async fn saved(&self) {
        let task = match self.save.lock() {
            Ok(mut save) => match std::mem::take(&mut *save) {
                Save::Running(task) => {
                    *save = Save::Finished;
                    Some(task)
                }
                other => {
                    *save = other;
                    None
                }
            },
            Err(_) => None,
        };
        if let Some(task) = task {
            task.await.ok();
        }
    }
}

/// A live voice conversation.
///
/// The transcript is persisted exactly once: when the agent closes the
/// socket, when [`VoiceSession::end`] is called, or when the session is
/// dropped, whichever comes first.
pub struct VoiceSession {
    resources: Option<VoiceResources>,
    recorder: Arc<Recorder>,
}

impl VoiceSession {
    /// Opens the socket and starts the conversation.
    ///
    /// Returns the session and the events heard from the agent, including
    /// audio to be played back. The event channel closes with the socket.
    pub async fn connect<G: PersistenceGateway>(
        config: VoiceConfig,
        gateway: G,
    ) -> Result<(Self, mpsc::UnboundedReceiver<VoiceEvent>), VoiceError> {
        let VoiceConfig {
            credentials,
            url,
            init_delay,
        } = config;
        let (socket, _) = connect_async(url.as_str()).await?;
        debug!("connected to the voice agent");
        let (sink, stream) = socket.split();

        let recorder = Arc::new(Recorder {
            transcript: Mutex::default(),
            save: Mutex::default(),
            session_id: Uuid::new_v4(),
            started_at: Instant::now(),
            gateway: Arc::new(gateway),
        });
        let span = debug_span!("voice", session_id = %recorder.session_id);

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handshake = [
            ControlFrame::Auth {
                api_key: credentials.api_key,
            },
            ControlFrame::InitConversation {
                agent_id: credentials.agent_id,
            },
        ];
        let writer = tokio::spawn(
            write_frames(sink, handshake, init_delay, frame_rx).instrument(span.clone()),
        );
        let reader = tokio::spawn(
            read_frames(stream, frame_tx.clone(), event_tx, Arc::clone(&recorder))
                .instrument(span),
        );

        let session = Self {
            resources: Some(VoiceResources {
                frame_tx,
                writer,
                reader,
            }),
            recorder,
        };
        Ok((session, event_rx))
    }

    /// Streams one chunk of microphone samples.
    pub fn send_audio(&self, samples: &[f32]) -> Result<(), VoiceError> {
        let resources = self.resources.as_ref().ok_or(VoiceError::Closed)?;
        let frame = OutgoingFrame::Audio {
            user_audio_chunk: pcm::encode_f32(samples),
        };
        resources
            .frame_tx
            .send(Outgoing::Frame(frame))
            .map_err(|_| VoiceError::Closed)
    }

    /// Identifier of the persisted record.
    #[inline]
    pub fn session_id(&self) -> Uuid {
        self.recorder.session_id
    }

    /// The turns heard so far.
    #[inline]
    pub fn transcript(&self) -> VoiceTranscript {
        self.recorder.transcript()
    }

    /// Closes the socket, releases every resource and persists the
    /// transcript. Returns once the transcript is stored.
    pub async fn end(mut self) {
        if let Some(mut resources) = self.resources.take() {
            resources.frame_tx.send(Outgoing::Close).ok();
            if timeout(CLOSE_TIMEOUT, &mut resources.reader).await.is_err() {
                warn!("voice agent did not close the socket in time");
            }
        }
        self.recorder.persist_once();
        self.recorder.saved().await;
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        let Some(resources) = self.resources.take() else {
            return;
        };
        drop(resources);
        self.recorder.persist_once();
    }
}

async fn send_frame<S>(sink: &mut S, frame: &OutgoingFrame) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match sink.send(Message::text(frame.to_json())).await {
        Ok(()) => true,
        Err(err) => {
            warn!("failed to send frame: {err}");
            false
        }
    }
}

async fn write_frames<S>(
    mut sink: S,
    handshake: [ControlFrame; 2],
    init_delay: Duration,
    mut frame_rx: mpsc::UnboundedReceiver<Outgoing>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let [auth, init] = handshake;
    if !send_frame(&mut sink, &OutgoingFrame::from(auth)).await {
        return;
    }
    sleep(init_delay).await;
    if !send_frame(&mut sink, &OutgoingFrame::from(init)).await {
        return;
    }

    while let Some(outgoing) = frame_rx.recv().await {
        match outgoing {
            Outgoing::Frame(frame) => {
                if !send_frame(&mut sink, &frame).await {
                    break;
                }
            }
            Outgoing::Close => {
                trace!("closing the socket");
                sink.send(Message::Close(None)).await.ok();
                break;
            }
        }
    }
    trace!("writer finished");
}

async fn read_frames<S>(
    mut stream: S,
    frame_tx: mpsc::UnboundedSender<Outgoing>,
    event_tx: mpsc::UnboundedSender<VoiceEvent>,
    recorder: Arc<Recorder>,
) where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                debug!("socket closed by the agent: {frame:?}");
                break;
            }
            Ok(_) => continue,
            Err(err) => {
                warn!("socket failed: {err}");
                break;
            }
        };

        for event in parse_frame(text.as_str()) {
            if let VoiceEvent::Ping(event_id) = &event {
                let pong = ControlFrame::Pong {
                    event_id: event_id.clone(),
                };
                frame_tx.send(Outgoing::Frame(pong.into())).ok();
            }
            recorder.record(&event);
            event_tx.send(event).ok();
        }
    }
    recorder.persist_once();
}
