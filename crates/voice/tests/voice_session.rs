use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use survey_chat_core::{
    ExitMode, MemoryGateway, PersistedRecord, PersistenceError, PersistenceGateway,
};
use survey_chat_voice::{VoiceConfig, VoiceCredentials, VoiceEvent, VoiceSession};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

type Agent = WebSocketStream<TcpStream>;

async fn next_json(ws: &mut Agent) -> Option<Value> {
    while let Some(msg) = ws.next().await {
        match msg.ok()? {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
    None
}

async fn say(ws: &mut Agent, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn fake_agent<F, Fut>(script: F) -> (VoiceConfig, JoinHandle<()>)
where
    F: FnOnce(Agent) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();

        let auth = next_json(&mut ws).await.unwrap();
        assert_eq!(auth, json!({ "type": "auth", "api_key": "xi-key" }));
        let init = next_json(&mut ws).await.unwrap();
        assert_eq!(init, json!({ "type": "init_conversation", "agent_id": "agent" }));

        script(ws).await;
    });
    let config = VoiceConfig::new(VoiceCredentials::new("xi-key", "agent"))
        .with_url(format!("ws://{addr}"))
        .with_init_delay(Duration::from_millis(5));
    (config, handle)
}

// Signals when a save begins, then takes its time.
struct SlowGateway {
    entered: mpsc::UnboundedSender<()>,
    inner: MemoryGateway,
}

#[async_trait]
impl PersistenceGateway for SlowGateway {
    async fn persist(&self, record: PersistedRecord) -> Result<(), PersistenceError> {
        self.entered.send(()).ok();
        sleep(Duration::from_millis(300)).await;
        self.inner.persist(record).await
    }
}

fn slow_gateway() -> (SlowGateway, MemoryGateway, mpsc::UnboundedReceiver<()>) {
    let (entered, entered_rx) = mpsc::unbounded_channel();
    let inner = MemoryGateway::default();
    let gateway = SlowGateway {
        entered,
        inner: inner.clone(),
    };
    (gateway, inner, entered_rx)
}

async fn one_line_then_close(mut ws: Agent) {
    say(&mut ws, json!({ "agent_response_event": { "agent_response": "Bye!" } })).await;
    ws.close(None).await.unwrap();
    while let Some(Ok(_)) = ws.next().await {}
}

#[tokio::test]
async fn test_agent_closes_conversation() {
    let (config, agent) = fake_agent(|mut ws| async move {
        say(&mut ws, json!({ "agent_response_event": { "agent_response": "Hey! Your role?" } })).await;
        say(&mut ws, json!({ "ping_event": { "event_id": 5 } })).await;
        say(&mut ws, json!({ "user_transcription_event": { "user_transcript": "..." } })).await;
        say(&mut ws, json!({ "user_transcription_event": { "user_transcript": "Founder" } })).await;
        ws.send(Message::text("garbage")).await.unwrap();

        let pong = next_json(&mut ws).await.unwrap();
        assert_eq!(pong, json!({ "type": "pong", "event_id": 5 }));
        let audio = next_json(&mut ws).await.unwrap();
        assert_eq!(audio, json!({ "user_audio_chunk": "AAAAQA==" }));

        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;

    let gateway = MemoryGateway::default();
    let (session, mut events) = VoiceSession::connect(config, gateway.clone()).await.unwrap();

    assert_eq!(
        events.recv().await,
        Some(VoiceEvent::AgentResponse("Hey! Your role?".to_owned()))
    );
    assert_eq!(events.recv().await, Some(VoiceEvent::Ping(json!(5))));
    assert_eq!(
        events.recv().await,
        Some(VoiceEvent::UserTranscript("Founder".to_owned()))
    );
    session.send_audio(&[0.0, 0.5]).unwrap();

    assert_eq!(events.recv().await, None);
    assert_eq!(session.transcript().turns().len(), 2);
    session.end().await;
    agent.await.unwrap();

    let records = gateway.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].exit_mode(), ExitMode::Normal);
    assert_eq!(records[0].latest_response, "Founder");
    assert!(records[0].session_id.is_some());
}

#[tokio::test]
async fn test_user_ends_conversation() {
    let (config, agent) = fake_agent(|mut ws| async move {
        say(&mut ws, json!({ "agent_response_event": { "agent_response": "Hi!" } })).await;
        while next_json(&mut ws).await.is_some() {}
    })
    .await;

    let gateway = MemoryGateway::default();
    let (session, mut events) = VoiceSession::connect(config, gateway.clone()).await.unwrap();
    assert!(matches!(events.recv().await, Some(VoiceEvent::AgentResponse(_))));

    session.end().await;
    agent.await.unwrap();
    assert_eq!(gateway.records().len(), 1);
    assert_eq!(events.recv().await, None);
}

#[tokio::test]
async fn test_silent_conversation_is_not_persisted() {
    let (config, agent) = fake_agent(|mut ws| async move {
        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;

    let gateway = MemoryGateway::default();
    let (session, mut events) = VoiceSession::connect(config, gateway.clone()).await.unwrap();
    assert_eq!(events.recv().await, None);
    assert!(session.transcript().is_empty());
    session.end().await;
    agent.await.unwrap();
    assert!(gateway.records().is_empty());
}

#[tokio::test]
async fn test_drop_during_save_keeps_transcript() {
    let (config, agent) = fake_agent(one_line_then_close).await;
    let (gateway, records, mut entered) = slow_gateway();
    let (session, _events) = VoiceSession::connect(config, gateway).await.unwrap();

    entered.recv().await.unwrap();
    drop(session);
    agent.await.unwrap();

    sleep(Duration::from_millis(600)).await;
    assert_eq!(records.records().len(), 1);
    assert!(entered.try_recv().is_err());
}

#[tokio::test]
async fn test_end_waits_for_save() {
    let (config, agent) = fake_agent(one_line_then_close).await;
    let (gateway, records, mut entered) = slow_gateway();
    let (session, mut events) = VoiceSession::connect(config, gateway).await.unwrap();

    while events.recv().await.is_some() {}
    entered.recv().await.unwrap();
    session.end().await;
    agent.await.unwrap();

    let records = records.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].latest_response, "Bye!");
}
