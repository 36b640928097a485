//! End-to-end chat cycles against an in-process HTTP server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use chatline::chat::{ChatConfig, ChatSession, TerminalView};
use chatline::error::Rejection;
use chatline::{
    Author, ChatClient, ChatCompletionChunk, ChatCompletionParams, ChatView, ClientLogger, Error,
};

/// Serves one canned HTTP response and returns the raw request it received.
async fn serve_once(response: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/v1", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        request
    });
    (endpoint, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(split) = text.find("\r\n\r\n") {
            let length = text[..split]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= split + 4 + length {
                break;
            }
        }
    }
    String::from_utf8(buf).unwrap()
}

fn sse_response(events: &[&str]) -> String {
    let mut body = String::new();
    for event in events {
        body.push_str("data: ");
        body.push_str(event);
        body.push_str("\n\n");
    }
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}"
    )
}

fn error_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn plain_view() -> TerminalView<Vec<u8>> {
    TerminalView::with_writer(Vec::new(), false)
}

fn config(endpoint: &str) -> ChatConfig {
    ChatConfig::new()
        .with_endpoint(endpoint)
        .with_api_key(Some("test-key".to_string()))
        .with_timeout(Some(Duration::from_secs(5)))
        .without_color()
}

#[tokio::test]
async fn streamed_reply_lands_in_transcript() {
    let (endpoint, server) = serve_once(sse_response(&[
        r#"{"id":"c1","created":1700000000,"choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#,
        r#"{"id":"c1","created":1700000001,"choices":[{"index":0,"delta":{"content":"lo!"}}]}"#,
        "[DONE]",
    ]))
    .await;
    let mut session = ChatSession::new(config(&endpoint)).unwrap();
    let mut view = plain_view();
    let stop = AtomicBool::new(false);

    let outcome = session.submit("Hi", &mut view, &stop).await.unwrap();

    assert_eq!(outcome.fragments, 2);
    assert_eq!(outcome.turns_appended, 2);
    assert!(!session.is_loading());
    let turns: Vec<(Author, &str)> = session
        .transcript()
        .snapshot()
        .iter()
        .map(|t| (t.author, t.text.as_str()))
        .collect();
    assert_eq!(
        turns,
        vec![
            (Author::User, "Hi"),
            (Author::Assistant, "Hel"),
            (Author::Assistant, "lo!"),
        ]
    );
    let blocks = session.blocks();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1].text(), "Hello!");

    view.finish_response();
    let printed = String::from_utf8(view.into_inner()).unwrap();
    assert!(printed.contains("🤖 Friendly Bot\nHello!"));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /v1/chat/completions "));
    assert!(
        request
            .to_ascii_lowercase()
            .contains("authorization: bearer test-key")
    );
    let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
    let body: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(body["model"], "phi3.5");
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "Hi");
}

#[tokio::test]
async fn server_error_is_a_submission_error() {
    let (endpoint, server) = serve_once(error_response(
        "500 Internal Server Error",
        r#"{"error":{"message":"model crashed","type":"server_error"}}"#,
    ))
    .await;
    let mut session = ChatSession::new(config(&endpoint)).unwrap();
    let mut view = plain_view();
    let stop = AtomicBool::new(false);

    let err = session.submit("Hi", &mut view, &stop).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Rejected {
            status: 500,
            kind: Rejection::ServerError,
            ..
        }
    ));
    assert!(err.is_submission_error());
    assert!(err.to_string().contains("model crashed"));
    assert!(!session.is_loading());
    assert_eq!(session.transcript().len(), 1);
    server.await.unwrap();
}

#[tokio::test]
async fn unknown_model_is_not_found() {
    let (endpoint, server) = serve_once(error_response(
        "404 Not Found",
        r#"{"error":"model \"nope\" not found, try pulling it first"}"#,
    ))
    .await;
    let mut session = ChatSession::new(config(&endpoint).with_model("nope")).unwrap();
    let mut view = plain_view();
    let stop = AtomicBool::new(false);

    let err = session.submit("Hi", &mut view, &stop).await.unwrap_err();

    assert!(err.is_model_not_found());
    assert!(matches!(err, Error::Rejected { status: 404, .. }));
    assert!(!session.is_loading());
    server.await.unwrap();
}

#[tokio::test]
async fn malformed_chunk_keeps_earlier_turns() {
    let (endpoint, server) = serve_once(sse_response(&[
        r#"{"created":1,"choices":[{"index":0,"delta":{"content":"part"}}]}"#,
        "{not json",
    ]))
    .await;
    let mut session = ChatSession::new(config(&endpoint)).unwrap();
    let mut view = plain_view();
    let stop = AtomicBool::new(false);

    let err = session.submit("Hi", &mut view, &stop).await.unwrap_err();

    assert!(err.is_stream_error());
    assert!(!session.is_loading());
    let last = session.transcript().last().unwrap();
    assert_eq!(last.author, Author::Assistant);
    assert_eq!(last.text, "part");
    server.await.unwrap();
}

#[tokio::test]
async fn unreachable_server_resets_loading() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/v1/", listener.local_addr().unwrap());
    drop(listener);

    let mut session = ChatSession::new(config(&endpoint)).unwrap();
    let mut view = plain_view();
    let stop = AtomicBool::new(false);

    let err = session.submit("Hi", &mut view, &stop).await.unwrap_err();

    assert!(err.is_submission_error());
    assert!(!session.is_loading());
    assert_eq!(session.transcript().len(), 1);
    assert_eq!(session.transcript().snapshot()[0].text, "Hi");
}

#[derive(Default)]
struct RecordingLogger {
    models: Mutex<Vec<String>>,
    chunks: AtomicUsize,
}

impl ClientLogger for RecordingLogger {
    fn log_request(&self, params: &ChatCompletionParams) {
        self.models.lock().unwrap().push(params.model.clone());
    }

    fn log_stream_chunk(&self, _chunk: &ChatCompletionChunk) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
    }
}

#[tokio::test]
async fn logger_sees_request_and_chunks() {
    let (endpoint, server) = serve_once(sse_response(&[
        r#"{"created":1,"choices":[{"index":0,"delta":{"content":"a"}}]}"#,
        r#"{"created":2,"choices":[{"index":0,"delta":{"content":"b"}}]}"#,
        "[DONE]",
    ]))
    .await;
    let logger = Arc::new(RecordingLogger::default());
    let client = ChatClient::with_options(Some("k".to_string()), Some(&endpoint), None)
        .unwrap()
        .with_logger(logger.clone());
    let mut session = ChatSession::with_backend(client, config(&endpoint).with_model("tiny"));
    let mut view = plain_view();
    let stop = AtomicBool::new(false);

    session.submit("Hi", &mut view, &stop).await.unwrap();

    assert_eq!(*logger.models.lock().unwrap(), vec!["tiny".to_string()]);
    assert_eq!(logger.chunks.load(Ordering::Relaxed), 2);
    server.await.unwrap();
}
