use std::sync::{Arc, Mutex};

use survey_chat::core::ChatClient;
use survey_chat::{PolicyKind, Session, SessionBuilder};
use survey_chat_server::sheets::MemorySheets;
use survey_chat_server::{AppState, router};
use survey_chat_test_model::{PresetResponse, TestChatProvider};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

struct Harness {
    session: Session,
    sheets: Arc<MemorySheets>,
    deltas: Arc<Mutex<Vec<String>>>,
    idle_rx: mpsc::UnboundedReceiver<()>,
}

async fn start(preset: PresetResponse) -> Harness {
    let mut provider = TestChatProvider::default();
    provider.add_response(preset);
    let sheets = Arc::new(MemorySheets::default());
    let state = AppState::new()
        .with_chat_client(ChatClient::new(provider))
        .with_sheets(Arc::clone(&sheets));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    let deltas = Arc::new(Mutex::new(Vec::new()));
    let (idle_tx, idle_rx) = mpsc::unbounded_channel();
    let session = SessionBuilder::with_server_url(&format!("http://{addr}"))
        .with_policy(PolicyKind::Content)
        .on_delta({
            let deltas = Arc::clone(&deltas);
            move |delta| deltas.lock().unwrap().push(delta.to_owned())
        })
        .on_idle(move || {
            idle_tx.send(()).ok();
        })
        .build();

    Harness {
        session,
        sheets,
        deltas,
        idle_rx,
    }
}

fn summaries(sheets: &MemorySheets) -> Vec<String> {
    let mut summaries: Vec<String> = sheets.rows().into_iter().map(|row| row.summary).collect();
    summaries.sort();
    summaries
}

#[tokio::test]
async fn test_survey_concludes() {
    let mut harness = start(PresetResponse::with_deltas(["Perfect, ", "thanks!"])).await;

    harness.session.note_keystroke();
    harness.session.submit("CTO, 8 people, remote, we use Slack and ChatGPT").await.unwrap();
    harness.idle_rx.recv().await.unwrap();

    assert_eq!(*harness.deltas.lock().unwrap(), vec!["Perfect, ", "thanks!"]);
    let snapshot = harness.session.snapshot().await.unwrap();
    assert!(snapshot.is_ending);
    assert!(!snapshot.is_ready_for_input);
    assert_eq!(snapshot.turns.last().unwrap().content(), "Perfect, thanks!");

    harness.session.close().await;

    // One auto-save after the reply, then the final record. Leaving after
    // the survey ended adds nothing.
    assert_eq!(
        summaries(&harness.sheets),
        vec!["Perfect, thanks!", "Perfect, thanks! [AUTO-SAVED]"]
    );
    let rows = harness.sheets.rows();
    assert_eq!(rows[0].session_id, rows[1].session_id);
    assert_eq!(Some(rows[0].session_id), snapshot.session_id);
}

#[tokio::test]
async fn test_leaving_midway_is_saved() {
    let mut harness = start(PresetResponse::with_deltas(["What's your ", "team size?"])).await;

    harness.session.note_keystroke();
    harness.session.submit("I'm a founder").await.unwrap();
    harness.idle_rx.recv().await.unwrap();
    assert!(!harness.session.snapshot().await.unwrap().is_ending);

    harness.session.close().await;
    assert_eq!(
        summaries(&harness.sheets),
        vec![
            "What's your team size? [ABRUPT EXIT]",
            "What's your team size? [AUTO-SAVED]",
        ]
    );
}

#[tokio::test]
async fn test_suggestions_for_latest_question() {
    let reply = r#"{"groups":[{"category":"Company","suggestions":["SaaS","Fintech","Marketplace"]}]}"#;
    let harness = start(PresetResponse::with_deltas([reply])).await;

    let groups = harness.session.suggest().await;
    assert_eq!(groups.groups.len(), 1);
    assert_eq!(groups.groups[0].suggestions, vec!["SaaS", "Fintech", "Marketplace"]);

    // Nothing was said, so nothing is saved.
    harness.session.close().await;
    assert!(harness.sheets.rows().is_empty());
}
