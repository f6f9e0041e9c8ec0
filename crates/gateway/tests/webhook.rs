//! End-to-end tests for the webhook endpoint.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    secrecy::Secret,
    serde_json::{Value, json},
    tokio::{net::TcpListener, sync::Notify},
};

use {
    courier_agents::{ReasoningBackend, ResponseEvent, ResponseStream, Runner},
    courier_common::{ChatId, OutboundReply},
    courier_gateway::{APOLOGY_TEXT, AppState, WebhookDispatcher, build_app},
    courier_sessions::{InMemorySessionStore, Session},
    courier_telegram::{ChannelOutbound, TelegramClient},
};

/// Records every reply instead of calling Telegram.
#[derive(Default)]
struct RecordingOutbound {
    replies: Mutex<Vec<OutboundReply>>,
}

impl RecordingOutbound {
    fn replies(&self) -> Vec<OutboundReply> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> courier_telegram::Result<()> {
        self.replies
            .lock()
            .unwrap()
            .push(OutboundReply::new(chat_id, text));
        Ok(())
    }
}

/// Streams one final event with a fixed answer, or fails every turn.
struct StubBackend {
    answer: Option<&'static str>,
    calls: AtomicUsize,
}

impl StubBackend {
    fn answering(answer: &'static str) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReasoningBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn run_turn(&self, _session: Session, _text: String) -> ResponseStream<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer;
        Box::pin(async_stream::stream! {
            match answer {
                Some(text) => {
                    yield Ok(ResponseEvent::partial("stub", "thinking"));
                    yield Ok(ResponseEvent::final_response("stub", text, Some("STOP".into())));
                },
                None => yield Err(courier_agents::Error::reasoning_failed("backend unavailable")),
            }
        })
    }
}

/// Holds every turn until the gate is opened.
struct GatedBackend {
    gate: Arc<Notify>,
}

impl ReasoningBackend for GatedBackend {
    fn name(&self) -> &str {
        "gated"
    }

    fn run_turn(&self, _session: Session, _text: String) -> ResponseStream<'_> {
        let gate = Arc::clone(&self.gate);
        Box::pin(async_stream::stream! {
            gate.notified().await;
            yield Ok(ResponseEvent::final_response("gated", "done", None));
        })
    }
}

struct TestServer {
    addr: SocketAddr,
    dispatcher: Arc<WebhookDispatcher>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn post_update(&self, body: Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.url("/telegram-webhook"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Wait for all spawned turns to finish.
    async fn settle(&self) {
        assert!(self.dispatcher.drain(Duration::from_secs(5)).await);
    }
}

async fn start_server(
    backend: Arc<dyn ReasoningBackend>,
    outbound: Arc<dyn ChannelOutbound>,
    secret: Option<&str>,
) -> TestServer {
    let dispatcher = Arc::new(WebhookDispatcher::new(
        Arc::new(InMemorySessionStore::new("courier")),
        Runner::new(backend, Duration::from_secs(5)),
        outbound,
    ));
    let state = AppState::new(
        Arc::clone(&dispatcher),
        secret.map(|s| Secret::new(s.to_string())),
    );
    let app = build_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer { addr, dispatcher }
}

fn user(id: i64) -> Value {
    json!({"id": id, "is_bot": false, "first_name": "Test"})
}

fn message(chat: i64, sender: i64, text: &str) -> Value {
    json!({
        "message_id": 1,
        "from": user(sender),
        "chat": {"id": chat, "type": "private", "first_name": "Test"},
        "date": 1_700_000_000,
        "text": text
    })
}

fn text_update(chat: i64, sender: i64, text: &str) -> Value {
    json!({"update_id": 1000, "message": message(chat, sender, text)})
}

#[tokio::test]
async fn text_message_is_answered_end_to_end() {
    let backend = StubBackend::answering("It's sunny.");
    let outbound = Arc::new(RecordingOutbound::default());
    let server = start_server(backend.clone(), outbound.clone(), None).await;

    let resp = server.post_update(text_update(100, 55, "weather today?")).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().is_empty());

    server.settle().await;
    assert_eq!(outbound.replies(), vec![OutboundReply::new(100, "It's sunny.")]);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn webhook_is_acknowledged_while_the_turn_is_still_running() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(GatedBackend {
        gate: Arc::clone(&gate),
    });
    let outbound = Arc::new(RecordingOutbound::default());
    let server = start_server(backend, outbound.clone(), None).await;

    let resp = tokio::time::timeout(
        Duration::from_secs(2),
        server.post_update(text_update(100, 55, "weather today?")),
    )
    .await
    .expect("webhook acknowledged before the turn finished");
    assert_eq!(resp.status(), 200);
    assert!(outbound.replies().is_empty());
    assert_eq!(server.dispatcher.in_flight(), 1);

    gate.notify_one();
    server.settle().await;
    assert_eq!(outbound.replies(), vec![OutboundReply::new(100, "done")]);
}

#[tokio::test]
async fn malformed_update_is_acknowledged_without_reply() {
    let backend = StubBackend::answering("unused");
    let outbound = Arc::new(RecordingOutbound::default());
    let server = start_server(backend.clone(), outbound.clone(), None).await;

    let resp = server.post_update(json!({"update_id": 7})).await;
    assert_eq!(resp.status(), 200);

    let resp = reqwest::Client::new()
        .post(server.url("/telegram-webhook"))
        .body("not json at all")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    server.settle().await;
    assert!(outbound.replies().is_empty());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn backend_failure_sends_apology() {
    let outbound = Arc::new(RecordingOutbound::default());
    let server = start_server(StubBackend::failing(), outbound.clone(), None).await;

    let resp = server.post_update(text_update(42, 42, "hello")).await;
    assert_eq!(resp.status(), 200);

    server.settle().await;
    assert_eq!(outbound.replies(), vec![OutboundReply::new(42, APOLOGY_TEXT)]);
}

#[tokio::test]
async fn callback_query_is_acknowledged() {
    let backend = StubBackend::answering("unused");
    let outbound = Arc::new(RecordingOutbound::default());
    let server = start_server(backend.clone(), outbound.clone(), None).await;

    let resp = server
        .post_update(json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb-1",
                "from": user(9),
                "chat_instance": "ci-1",
                "message": message(7, 9, "choose"),
                "data": "opt1"
            }
        }))
        .await;
    assert_eq!(resp.status(), 200);

    server.settle().await;
    assert_eq!(outbound.replies(), vec![OutboundReply::new(
        7,
        "Received callback: opt1"
    )]);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn wrong_secret_token_is_rejected() {
    let backend = StubBackend::answering("hi");
    let outbound = Arc::new(RecordingOutbound::default());
    let server = start_server(backend.clone(), outbound.clone(), Some("s3cret")).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/telegram-webhook"))
        .header("X-Telegram-Bot-Api-Secret-Token", "wrong")
        .json(&text_update(1, 1, "hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(server.url("/telegram-webhook"))
        .json(&text_update(1, 1, "hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(server.url("/telegram-webhook"))
        .header("X-Telegram-Bot-Api-Secret-Token", "s3cret")
        .json(&text_update(1, 1, "hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    server.settle().await;
    assert_eq!(outbound.replies(), vec![OutboundReply::new(1, "hi")]);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn health_reports_session_count() {
    let outbound = Arc::new(RecordingOutbound::default());
    let server = start_server(StubBackend::answering("ok"), outbound, None).await;

    server.post_update(text_update(1, 10, "a")).await;
    server.post_update(text_update(2, 20, "b")).await;
    server.post_update(text_update(1, 10, "c")).await;
    server.settle().await;

    let body: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 2);
}

#[tokio::test]
async fn concurrent_messages_from_one_sender_share_a_session() {
    let backend = StubBackend::answering("ok");
    let outbound = Arc::new(RecordingOutbound::default());
    let server = Arc::new(start_server(backend.clone(), outbound.clone(), None).await);

    let posts: Vec<_> = (0..8)
        .map(|i| {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .post_update(text_update(77, 77, &format!("msg {i}")))
                    .await
                    .status()
            })
        })
        .collect();
    for post in posts {
        assert_eq!(post.await.unwrap(), 200);
    }

    server.settle().await;
    assert_eq!(outbound.replies().len(), 8);
    assert_eq!(server.dispatcher.sessions().len().await, 1);
}

#[tokio::test]
async fn replies_go_through_the_bot_api() {
    let mut telegram = mockito::Server::new_async().await;
    let send = telegram
        .mock(
            "POST",
            mockito::Matcher::Regex("(?i)^/botTEST:TOKEN/sendMessage$".into()),
        )
        .match_body(mockito::Matcher::PartialJson(json!({
            "chat_id": 100,
            "text": "It's sunny."
        })))
        .with_body(
            json!({
                "ok": true,
                "result": {
                    "message_id": 2,
                    "date": 1_700_000_001,
                    "chat": {"id": 100, "type": "private"},
                    "text": "It's sunny."
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = TelegramClient::new(
        &Secret::new("TEST:TOKEN".into()),
        &telegram.url(),
        Duration::from_secs(5),
    )
    .unwrap();
    let server = start_server(
        StubBackend::answering("It's sunny."),
        Arc::new(client),
        None,
    )
    .await;

    let resp = server.post_update(text_update(100, 55, "weather today?")).await;
    assert_eq!(resp.status(), 200);

    server.settle().await;
    send.assert_async().await;
}
