use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use pwdb_cracker_rs::{GuessSubmission, GuessSubmitter, ReqwestGuessSubmitter, SubmitError};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use url::Url;

/// Spawns a PasswordDB stand-in that forwards every posted body and answers
/// with `status`.
async fn spawn_endpoint(status: StatusCode) -> (Url, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new().route(
        "/",
        post(move |Json(body): Json<Value>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(body);
                status
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Url::parse(&format!("http://{addr}/")).unwrap(), rx)
}

#[tokio::test]
async fn posts_password_and_webhooks_as_json() {
    let (endpoint, mut bodies) = spawn_endpoint(StatusCode::OK).await;
    let submitter = ReqwestGuessSubmitter::new(endpoint, Duration::from_secs(5)).unwrap();

    let webhooks = vec!["127.0.0.1:50012".to_string(), "10.0.0.2:50012".to_string()];
    submitter
        .submit(&GuessSubmission::new("042000000000", &webhooks))
        .await
        .unwrap();

    let body = bodies.recv().await.unwrap();
    assert_eq!(
        body,
        json!({
            "password": "042000000000",
            "webhooks": ["127.0.0.1:50012", "10.0.0.2:50012"],
        })
    );
}

#[tokio::test]
async fn error_status_is_not_a_transport_failure() {
    let (endpoint, mut bodies) = spawn_endpoint(StatusCode::INTERNAL_SERVER_ERROR).await;
    let submitter = ReqwestGuessSubmitter::new(endpoint, Duration::from_secs(5)).unwrap();

    let result = submitter
        .submit(&GuessSubmission::new("000000000000", &["127.0.0.1:50012".into()]))
        .await;
    assert!(result.is_ok());
    assert!(bodies.recv().await.is_some());
}

#[tokio::test]
async fn unreachable_endpoint_reports_transport_error() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);

    let endpoint = Url::parse(&format!("http://{addr}/")).unwrap();
    let submitter = ReqwestGuessSubmitter::new(endpoint, Duration::from_secs(2)).unwrap();
    let result = submitter
        .submit(&GuessSubmission::new("000000000000", &[]))
        .await;
    assert!(matches!(result, Err(SubmitError::Transport(_))));
}
