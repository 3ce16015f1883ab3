//! End-to-end tests of the HTTP transport against a loopback server.

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use routerchat::{
    Attribution, ChatSession, FailedTurnPolicy, HttpTransport, Message, SessionConfig,
    cancel_after,
};

/// What the server saw.
#[derive(Debug)]
struct Captured {
    request_line: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Captured {
    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

enum Reply {
    /// Status line, content type, and body pieces sent as separate HTTP chunks.
    Chunked(&'static str, &'static str, Vec<&'static str>),
    /// A 200 event stream whose pieces are sent this far apart.
    Paced(Duration, Vec<&'static str>),
    /// Read the request and never answer.
    Silent,
}

async fn read_request(socket: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8(buf[..header_end].to_vec()).unwrap();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap().to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse().unwrap())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending body");
        body.extend_from_slice(&chunk[..n]);
    }

    Captured {
        request_line,
        headers,
        body,
    }
}

async fn write_chunked(
    socket: &mut TcpStream,
    status: &str,
    content_type: &str,
    pieces: Vec<&'static str>,
    gap: Duration,
) {
    let head = format!(
        "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\n\
         transfer-encoding: chunked\r\nconnection: close\r\n\r\n"
    );
    socket.write_all(head.as_bytes()).await.unwrap();
    for piece in pieces {
        let frame = format!("{:x}\r\n{piece}\r\n", piece.len());
        socket.write_all(frame.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(gap).await;
    }
    socket.write_all(b"0\r\n\r\n").await.unwrap();
    socket.shutdown().await.unwrap();
}

/// Serve exactly one request; returns the API root and a handle yielding the captured request.
async fn serve_once(reply: Reply) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let captured = read_request(&mut socket).await;
        match reply {
            Reply::Chunked(status, content_type, pieces) => {
                write_chunked(&mut socket, status, content_type, pieces, Duration::from_millis(5))
                    .await;
            }
            Reply::Paced(gap, pieces) => {
                write_chunked(&mut socket, "200 OK", "text/event-stream", pieces, gap).await;
            }
            Reply::Silent => {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        }
        captured
    });
    (format!("http://{addr}/api/v1"), handle)
}

fn attribution() -> Attribution {
    Attribution::new("https://example.com/chat", "Loopback Test")
}

fn session_for(base_url: String) -> ChatSession {
    let config = SessionConfig::default()
        .with_system_prompt("be brief")
        .with_attribution(attribution())
        .with_base_url(base_url);
    ChatSession::from_config("sk-test".to_string(), config).unwrap()
}

#[tokio::test]
async fn streaming_turn_over_http() {
    let (base_url, server) = serve_once(Reply::Chunked(
        "200 OK",
        "text/event-stream",
        vec![
            ": OPENROUTER PROCESSING\n\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"H\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"i\"}}]}\n",
            "\ndata: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        ],
    ))
    .await;

    let mut session = session_for(base_url);
    let mut fragments = Vec::new();
    let reply = session
        .ask("hello", |f| fragments.push(f.to_string()))
        .await
        .unwrap();
    assert_eq!(fragments, vec!["H", "i"]);
    assert_eq!(reply, "Hi");
    assert_eq!(session.history().len(), 3);

    let captured = server.await.unwrap();
    assert_eq!(
        captured.request_line,
        "POST /api/v1/chat/completions HTTP/1.1"
    );
    assert_eq!(captured.headers["authorization"], "Bearer sk-test");
    assert_eq!(captured.headers["content-type"], "application/json");
    assert_eq!(captured.headers["accept"], "text/event-stream");
    assert_eq!(captured.headers["http-referer"], "https://example.com/chat");
    assert_eq!(captured.headers["x-title"], "Loopback Test");

    let body = captured.json();
    assert_eq!(body["model"], "openai/gpt-4o");
    assert_eq!(body["stream"], true);
    assert_eq!(
        body["messages"],
        serde_json::json!([
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "hello"}
        ])
    );
}

#[tokio::test]
async fn error_status_never_reaches_decoder() {
    let error_body = r#"{"error":{"message":"No auth credentials found","code":401}}"#;
    let (base_url, server) = serve_once(Reply::Chunked(
        "401 Unauthorized",
        "application/json",
        vec![error_body],
    ))
    .await;

    let mut session = session_for(base_url);
    let mut called = false;
    let err = session.ask("hello", |_| called = true).await.unwrap_err();
    server.await.unwrap();

    assert!(!called);
    assert!(err.is_api());
    assert!(err.is_authentication());
    assert_eq!(err.status_code(), Some(401));
    assert_eq!(err.body(), Some(error_body));
    assert_eq!(
        err.to_string(),
        "API error (status 401): No auth credentials found"
    );
    assert_eq!(
        session.history(),
        &[Message::system("be brief"), Message::user("hello")]
    );
}

#[tokio::test]
async fn sync_turn_over_http() {
    let (base_url, server) = serve_once(Reply::Chunked(
        "200 OK",
        "application/json",
        vec![
            r#"{"id":"gen-1","choices":[{"message":{"role":"assistant","content":"Hello!"},"#,
            r#""finish_reason":"stop"}],"usage":{"prompt_tokens":8,"completion_tokens":2,"total_tokens":10}}"#,
        ],
    ))
    .await;

    let mut session = session_for(base_url);
    let reply = session.ask_sync("hi").await.unwrap();
    assert_eq!(reply, "Hello!");
    let stats = session.stats();
    assert_eq!(stats.usage.total_tokens, 10);
    assert!(!stats.usage_estimated);

    let captured = server.await.unwrap();
    assert_eq!(captured.headers["accept"], "application/json");
    assert_eq!(captured.json()["stream"], false);
}

#[tokio::test]
async fn malformed_events_are_skipped_over_http() {
    let (base_url, _server) = serve_once(Reply::Chunked(
        "200 OK",
        "text/event-stream",
        vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {\"choices\":[{\"del",
            "ta\":{\"content\":\"b\"}}]}\n\ndata: {garbage}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"c\"}}]}\n\ndata: [DONE]\n\n",
        ],
    ))
    .await;

    let mut session = session_for(base_url);
    let reply = session.ask("hello", |_| {}).await.unwrap();
    assert_eq!(reply, "abc");
    assert_eq!(session.stats().skipped_chunks, 1);
}

#[tokio::test]
async fn model_catalog_is_sorted() {
    let (base_url, server) = serve_once(Reply::Chunked(
        "200 OK",
        "application/json",
        vec![r#"{"data":[{"id":"z/last","name":"Z"},{"id":"a/first","context_length":4096}]}"#],
    ))
    .await;

    let transport =
        HttpTransport::with_options("sk-test", attribution(), Some(base_url), None).unwrap();
    let models = transport.list_models().await.unwrap();
    let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a/first", "z/last"]);

    let captured = server.await.unwrap();
    assert_eq!(captured.request_line, "GET /api/v1/models HTTP/1.1");
    assert_eq!(captured.headers["authorization"], "Bearer sk-test");
}

#[tokio::test]
async fn cancellation_before_response() {
    let (base_url, _server) = serve_once(Reply::Silent).await;
    let config = SessionConfig::default()
        .with_base_url(base_url)
        .with_failed_turn_policy(FailedTurnPolicy::Rollback);
    let mut session = ChatSession::from_config("sk-test".to_string(), config).unwrap();

    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(100));
    let err = session
        .ask_cancellable("hello", &cancel, |_| {})
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(err.is_transport());
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn client_timeout() {
    let (base_url, _server) = serve_once(Reply::Silent).await;
    let config = SessionConfig::default()
        .with_base_url(base_url)
        .with_timeout(Duration::from_millis(200));
    let mut session = ChatSession::from_config("sk-test".to_string(), config).unwrap();

    let err = session.ask_sync("hello").await.unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(err.is_transport());
}

#[tokio::test]
async fn timeout_does_not_cut_off_a_slow_stream() {
    let (base_url, _server) = serve_once(Reply::Paced(
        Duration::from_millis(100),
        vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"1\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"2\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"3\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"4\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"5\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"6\"}}]}\n\n",
            "data: [DONE]\n\n",
        ],
    ))
    .await;
    let config = SessionConfig::default()
        .with_base_url(base_url)
        .with_timeout(Duration::from_millis(300));
    let mut session = ChatSession::from_config("sk-test".to_string(), config).unwrap();

    let mut fragments = 0;
    let reply = session.ask("count", |_| fragments += 1).await.unwrap();
    assert_eq!(reply, "123456");
    assert_eq!(fragments, 6);
    assert_eq!(session.history().len(), 3);
}
