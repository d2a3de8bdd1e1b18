#![allow(clippy::unwrap_used)]
// `LiftDriver` against a local WebSocket server: what actually reaches the wire.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use liftwire_api::{Credentials, EvidenceRecorder, MemoryTokenStore, Session, SessionConfig};
use liftwire_core::{
    CallActionRequest, CoreError, DriverTarget, ElevatorDriver, HoldOpenRequest, LiftDriver,
    SubscribeRequest, SuiteConfig, run_suite,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Echo server: answers each frame with a 201 carrying the same id and a
/// session id, and records everything it received.
async fn echo_server(received: Arc<Mutex<Vec<Value>>>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let received = Arc::clone(&received);
            tokio::spawn(async move {
                let callback = |_: &Request, mut resp: Response| {
                    resp.headers_mut()
                        .insert("sec-websocket-protocol", "koneapi".parse().unwrap());
                    Ok::<_, ErrorResponse>(resp)
                };
                let ws = tokio_tungstenite::accept_hdr_async(tcp, callback).await.unwrap();
                let (mut tx, mut rx) = ws.split();

                while let Some(Ok(Message::Text(text))) = rx.next().await {
                    let msg: Value = serde_json::from_str(&text).unwrap();
                    received.lock().unwrap().push(msg.clone());
                    let reply = json!({
                        "type": msg["type"],
                        "callType": msg["callType"],
                        "statusCode": 201,
                        "requestId": msg.get("requestId"),
                        "data": {
                            "request_id": msg["payload"]["request_id"],
                            "session_id": 4242
                        }
                    });
                    if tx.send(Message::Text(reply.to_string().into())).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    Url::parse(&format!("ws://{addr}/stream-v2")).unwrap()
}

async fn driver(received: Arc<Mutex<Vec<Value>>>) -> (MockServer, LiftDriver) {
    let tokens = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "expires_in": 3600
        })))
        .mount(&tokens)
        .await;

    let ws_url = echo_server(received).await;
    let config = SessionConfig::new(
        Url::parse(&tokens.uri()).unwrap(),
        ws_url,
        "koneapi",
        Credentials::new("id", SecretString::from("secret".to_string())),
    )
    .with_request_timeout(Duration::from_secs(5));
    let session =
        Session::new(config, Arc::new(MemoryTokenStore::new()), EvidenceRecorder::new()).unwrap();

    (tokens, LiftDriver::new(session, DriverTarget::new("4TFxWRCv23D", "1")))
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delay_31_never_reaches_the_wire() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (_tokens, driver) = driver(Arc::clone(&received)).await;

    let err = driver
        .call_action(&CallActionRequest::new(1000, 2).with_delay(31))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Validation { .. }), "got: {err:?}");
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_delay_30_sends_well_formed_envelope() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (_tokens, driver) = driver(Arc::clone(&received)).await;

    let frame = driver
        .call_action(
            &CallActionRequest::new(1000, 2)
                .with_destination(2000)
                .with_delay(30),
        )
        .await
        .unwrap();
    assert_eq!(frame.status_code(), Some(201));

    let sent = received.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let msg = &sent[0];
    assert_eq!(msg["type"], "lift-call-api-v2");
    assert_eq!(msg["buildingId"], "building:4TFxWRCv23D");
    assert_eq!(msg["callType"], "action");
    assert_eq!(msg["groupId"], "1");
    assert_eq!(msg["payload"]["area"], 1000);
    assert_eq!(msg["payload"]["call"], json!({ "action": 2, "destination": 2000, "delay": 30 }));
    assert!(msg["payload"]["request_id"].is_u64());
    assert!(msg["payload"]["time"].is_string());
}

#[tokio::test]
async fn test_hold_open_hard_time_boundary() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (_tokens, driver) = driver(Arc::clone(&received)).await;

    assert!(driver.hold_open(&HoldOpenRequest::new(1001, 1000, 11)).await.is_err());
    assert!(driver.hold_open(&HoldOpenRequest::new(1001, 1000, 10)).await.is_ok());
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_subscribe_id_travels_in_envelope() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (_tokens, driver) = driver(Arc::clone(&received)).await;

    driver
        .subscribe(&SubscribeRequest::new(vec!["lift_1/status".into()], 3600))
        .await
        .unwrap();

    let msg = received.lock().unwrap()[0].clone();
    assert_eq!(msg["type"], "site-monitoring");
    assert!(msg["requestId"].is_string());
    assert!(msg["payload"].get("request_id").is_none());
    assert_eq!(msg["payload"]["duration"], 300);
}

#[tokio::test]
async fn test_suite_runs_against_live_driver() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (_tokens, driver) = driver(Arc::clone(&received)).await;
    let config = SuiteConfig {
        event_wait: Duration::from_millis(50),
        ..SuiteConfig::default()
    };

    let report = run_suite(&driver, &config, |_| {}).await;

    assert!(report.is_success(), "{}", report.to_markdown());
    let delete = received
        .lock()
        .unwrap()
        .iter()
        .find(|m| m["callType"] == "delete")
        .cloned()
        .unwrap();
    assert_eq!(delete["payload"]["session_id"], 4242);
}
