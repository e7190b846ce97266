use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{post, put};
use axum::{Form, Json, Router};
use chrono::Utc;
use serde_json::{Value, json};
use survey_chat_server::sheets::{
    GoogleSheets, HEADER, SheetRow, SheetStore, SheetsCredentials, SheetsError,
};
use tokio::net::TcpListener;
use uuid::Uuid;

const TEST_KEY: &str = include_str!("fixtures/test-service-account.pem");

#[derive(Clone, Debug, PartialEq)]
struct Call {
    method: &'static str,
    range: String,
    body: Value,
}

#[derive(Clone, Default)]
struct Api {
    token_requests: Arc<Mutex<usize>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Api {
    fn check(headers: &HeaderMap, query: &HashMap<String, String>) -> Result<(), StatusCode> {
        let auth = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        if auth != Some("Bearer ya29.test-token") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        if query.get("valueInputOption").map(String::as_str) != Some("RAW") {
            return Err(StatusCode::BAD_REQUEST);
        }
        Ok(())
    }
}

async fn token(State(api): State<Api>, Form(form): Form<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(
        form["grant_type"],
        "urn:ietf:params:oauth:grant-type:jwt-bearer"
    );
    // header.claims.signature
    assert_eq!(form["assertion"].split('.').count(), 3);
    *api.token_requests.lock().unwrap() += 1;
    Json(json!({
        "access_token": "ya29.test-token",
        "expires_in": 3599,
        "token_type": "Bearer",
    }))
}

async fn update(
    State(api): State<Api>,
    Path((spreadsheet, range)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    Api::check(&headers, &query)?;
    assert_eq!(spreadsheet, "sheet-1");
    api.calls.lock().unwrap().push(Call {
        method: "PUT",
        range,
        body,
    });
    Ok(Json(json!({})))
}

async fn append(
    State(api): State<Api>,
    Path((spreadsheet, range)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    Api::check(&headers, &query)?;
    assert_eq!(spreadsheet, "sheet-1");
    api.calls.lock().unwrap().push(Call {
        method: "POST",
        range,
        body,
    });
    Ok(Json(json!({})))
}

async fn serve(api: Api) -> String {
    let router = Router::new()
        .route("/token", post(token))
        .route(
            "/v4/spreadsheets/{spreadsheet}/values/{range}",
            put(update).post(append),
        )
        .with_state(api);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn credentials(private_key: &str) -> SheetsCredentials {
    SheetsCredentials {
        spreadsheet_id: "sheet-1".to_owned(),
        client_email: "survey@test-project.iam.gserviceaccount.com".to_owned(),
        private_key: private_key.to_owned(),
    }
}

fn row() -> SheetRow {
    SheetRow {
        timestamp: Utc::now(),
        session_id: Uuid::new_v4(),
        duration: 58,
        conversation: "assistant: Hi\n\nuser: Hello".to_owned(),
        summary: "Hi".to_owned(),
    }
}

#[tokio::test]
async fn test_header_and_rows() {
    let api = Api::default();
    let base = serve(api.clone()).await;
    let sheets = GoogleSheets::new(reqwest::Client::new(), credentials(TEST_KEY))
        .with_endpoints(format!("{base}/token"), &base);

    sheets.write_header().await.unwrap();
    let row = row();
    sheets.append_row(&row).await.unwrap();
    sheets.append_row(&row).await.unwrap();

    // The token is reused until it expires.
    assert_eq!(*api.token_requests.lock().unwrap(), 1);

    let calls = api.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[0],
        Call {
            method: "PUT",
            range: "Sheet1!A1:Q1".to_owned(),
            body: json!({ "values": [HEADER] }),
        }
    );
    assert_eq!(calls[1].method, "POST");
    assert_eq!(calls[1].range, "Sheet1!A:Q:append");
    assert_eq!(calls[1].body, json!({ "values": [row.cells()] }));
}

#[tokio::test]
async fn test_bad_key() {
    let api = Api::default();
    let base = serve(api.clone()).await;
    let sheets = GoogleSheets::new(reqwest::Client::new(), credentials("not a key"))
        .with_endpoints(format!("{base}/token"), &base);

    let err = sheets.write_header().await.unwrap_err();
    assert!(matches!(err, SheetsError::Signing(_)));
    assert_eq!(*api.token_requests.lock().unwrap(), 0);
}
