//! HTTP generator against a local stand-in for the answer service.
//!
//! Run with: `cargo test -p parley-providers --test answer_service`

use std::time::Duration;

use axum::http::{HeaderMap, StatusCode, header};
use tokio::sync::mpsc;

use parley_core::error::ParleyError;
use parley_core::ports::ResponseGenerator;
use parley_providers::HttpResponseGenerator;

/// A received request: its headers and body.
type Captured = (HeaderMap, String);

/// Serve `POST /answer` with `status` and a JSON `body`; requests arrive on the receiver.
async fn answer_server(status: StatusCode, body: &'static str) -> (String, mpsc::UnboundedReceiver<Captured>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = axum::Router::new().route(
        "/answer",
        axum::routing::post(move |headers: HeaderMap, request: String| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((headers, request));
                (status, [(header::CONTENT_TYPE, "application/json")], body)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/answer", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (url, rx)
}

#[tokio::test]
async fn test_answer_with_citations() {
    let (url, mut requests) = answer_server(
        StatusCode::OK,
        r#"{"answer": "Cargo is Rust's build tool.", "citations": ["https://doc.rust-lang.org/cargo/"]}"#,
    )
    .await;
    let generator = HttpResponseGenerator::new(url, Some("secret".into()), Duration::from_secs(5));

    let request = generator.generate_answer("what is cargo").await.unwrap();
    assert_eq!(request.answer, "Cargo is Rust's build tool.");
    assert_eq!(request.citations, vec!["https://doc.rust-lang.org/cargo/"]);

    let (headers, body) = requests.recv().await.unwrap();
    assert_eq!(
        headers.get(header::AUTHORIZATION).unwrap().to_str().unwrap(),
        "Bearer secret"
    );
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, serde_json::json!({"question": "what is cargo"}));
}

#[tokio::test]
async fn test_no_api_key_sends_no_authorization() {
    let (url, mut requests) = answer_server(StatusCode::OK, r#"{"answer": "Yes."}"#).await;
    let generator = HttpResponseGenerator::new(url, None, Duration::from_secs(5));

    let request = generator.generate_answer("is it on").await.unwrap();
    assert!(request.citations.is_empty());
    let (headers, _) = requests.recv().await.unwrap();
    assert!(headers.get(header::AUTHORIZATION).is_none());
}

#[tokio::test]
async fn test_service_error_is_generator_failure() {
    let (url, _requests) = answer_server(StatusCode::SERVICE_UNAVAILABLE, r#"{"error": "overloaded"}"#).await;
    let generator = HttpResponseGenerator::new(url, None, Duration::from_secs(5));

    let err = generator.generate_answer("what is cargo").await.unwrap_err();
    assert!(matches!(err, ParleyError::Generator(msg) if msg.contains("503")));
}

#[tokio::test]
async fn test_malformed_answer_is_generator_failure() {
    let (url, _requests) = answer_server(StatusCode::OK, r#"{"text": "wrong shape"}"#).await;
    let generator = HttpResponseGenerator::new(url, None, Duration::from_secs(5));

    let err = generator.generate_answer("what is cargo").await.unwrap_err();
    assert!(matches!(err, ParleyError::Generator(msg) if msg.contains("malformed")));
}

#[tokio::test]
async fn test_unreachable_service_is_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let generator = HttpResponseGenerator::new(format!("http://{addr}/answer"), None, Duration::from_secs(2));
    let err = generator.generate_answer("anyone there").await.unwrap_err();
    assert!(matches!(err, ParleyError::GeneratorUnavailable(msg) if msg.contains("unreachable")));
}
