//! End-to-end tests over a real WebSocket connection.
//!
//! Each test starts the accept loop on an ephemeral port, connects with
//! `tokio-tungstenite`, and exchanges JSON frames.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use keyrelay_core::{Key, Normalizer};
use keyrelay_server::application::dispatch::Dispatcher;
use keyrelay_server::application::pipeline::{InputState, Pipeline, PipelineConfig};
use keyrelay_server::infrastructure::injector::mock::MockInjector;
use keyrelay_server::infrastructure::rpc::messages::RpcReply;
use keyrelay_server::infrastructure::rpc::ws_server::LANE_CAPACITY;
use keyrelay_server::infrastructure::rpc::{bind, serve};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    mock: Arc<MockInjector>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

async fn start_server() -> TestServer {
    start_server_with(Arc::new(MockInjector::new())).await
}

async fn start_server_with(mock: Arc<MockInjector>) -> TestServer {
    let pipeline = Pipeline::start(
        PipelineConfig::default(),
        mock.clone(),
        Arc::new(InputState::new()),
    )
    .unwrap();
    let dispatcher = Arc::new(Dispatcher::new(Normalizer::default(), Arc::new(pipeline)));

    let listener = bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(serve(listener, dispatcher, Arc::clone(&running)));

    TestServer {
        addr,
        running,
        mock,
    }
}

async fn connect(server: &TestServer) -> Client {
    let (client, _) = connect_async(format!("ws://{}", server.addr)).await.unwrap();
    client
}

async fn send(client: &mut Client, frame: Value) {
    client
        .send(WsMessage::Text(frame.to_string()))
        .await
        .unwrap();
}

async fn next_reply(client: &mut Client) -> RpcReply {
    let read = async {
        loop {
            match client.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return serde_json::from_str::<RpcReply>(&text).unwrap()
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended while waiting for a reply: {other:?}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("no reply within 5 s")
}

fn result_of(reply: RpcReply) -> Value {
    match reply {
        RpcReply::Result { result, .. } => result,
        RpcReply::Error { error, .. } => panic!("unexpected error reply: {error}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_keystroke_over_websocket() {
    // Arrange
    let server = start_server().await;
    let mut client = connect(&server).await;

    // Act
    send(
        &mut client,
        json!({"id": 1, "method": "keystroke", "params": {"key": "c", "is_ctrl": true}}),
    )
    .await;
    let reply = next_reply(&mut client).await;

    // Assert
    assert_eq!(reply.id(), Some(1));
    assert_eq!(
        result_of(reply),
        json!({"success": true, "reason_for_fail": ""})
    );
    let delivered = server.mock.delivered();
    assert_eq!(delivered.len(), 4);
    assert_eq!(delivered[3].released_key(), Key::parse("ctrl").as_ref());
}

#[tokio::test]
async fn test_liveness_probe_returns_empty_object() {
    let server = start_server().await;
    let mut client = connect(&server).await;

    send(&mut client, json!({"id": 9, "method": "test"})).await;
    let reply = next_reply(&mut client).await;

    assert_eq!(reply.id(), Some(9));
    assert_eq!(result_of(reply), json!({}));
    assert!(server.mock.attempts().is_empty());
}

#[tokio::test]
async fn test_empty_key_fails_with_reason() {
    let server = start_server().await;
    let mut client = connect(&server).await;

    send(
        &mut client,
        json!({"id": 2, "method": "key_down", "params": {"key": ""}}),
    )
    .await;
    let result = result_of(next_reply(&mut client).await);

    assert_eq!(result["success"], false);
    assert!(!result["reason_for_fail"].as_str().unwrap().is_empty());
    assert!(server.mock.attempts().is_empty());
}

#[tokio::test]
async fn test_unknown_method_gets_error_reply() {
    let server = start_server().await;
    let mut client = connect(&server).await;

    send(&mut client, json!({"id": 3, "method": "scroll", "params": {}})).await;
    let reply = next_reply(&mut client).await;

    assert_eq!(
        reply,
        RpcReply::Error {
            id: Some(3),
            error: "unknown method 'scroll'".to_string()
        }
    );
}

#[tokio::test]
async fn test_pipelined_requests_are_answered_in_order() {
    // Arrange
    let server = start_server().await;
    let mut client = connect(&server).await;

    // Act: three frames without waiting for replies
    for (id, key) in [(10, "x"), (11, "y"), (12, "z")] {
        send(
            &mut client,
            json!({"id": id, "method": "keystroke", "params": {"key": key}}),
        )
        .await;
    }
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(next_reply(&mut client).await.id());
    }

    // Assert
    assert_eq!(ids, vec![Some(10), Some(11), Some(12)]);
    let downs: Vec<Key> = server
        .mock
        .delivered()
        .into_iter()
        .filter_map(|s| match s {
            keyrelay_core::Step::KeyDown { key, .. } => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(downs, vec![Key::Char('x'), Key::Char('y'), Key::Char('z')]);
}

#[tokio::test]
async fn test_mouse_move_over_websocket() {
    let server = start_server().await;
    let mut client = connect(&server).await;

    send(
        &mut client,
        json!({"id": 4, "method": "mouse_mv", "params": {"x_pos": 640, "y_pos": 480}}),
    )
    .await;
    let result = result_of(next_reply(&mut client).await);

    assert_eq!(result["success"], true);
    assert_eq!(
        server.mock.delivered(),
        vec![keyrelay_core::Step::MouseMove(keyrelay_core::PointerPosition::new(640, 480))]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_liveness_probe_answers_while_session_lane_is_full() {
    // Arrange: the writer parks inside the first call it receives
    let (mock, gate) = MockInjector::gated();
    let server = start_server_with(Arc::new(mock)).await;
    let mut client = connect(&server).await;
    let flood = LANE_CAPACITY as u64 + 44;

    // Act: more input frames than the lane holds, then a probe
    for id in 0..flood {
        send(
            &mut client,
            json!({"id": id, "method": "mouse_mv", "params": {"x_pos": 1, "y_pos": 1}}),
        )
        .await;
    }
    send(&mut client, json!({"id": 9999, "method": "test"})).await;

    let mut refused: u64 = 0;
    let probe = loop {
        let reply = next_reply(&mut client).await;
        if reply.id() == Some(9999) {
            break reply;
        }
        let result = result_of(reply);
        assert_eq!(result["success"], false);
        assert_eq!(result["reason_for_fail"], "injection queue is full, retry later");
        refused += 1;
    };

    // Assert: overflow was refused immediately and the probe still got through
    assert_eq!(result_of(probe), json!({}));
    assert!(
        refused >= flood - LANE_CAPACITY as u64 - 1,
        "only {refused} frames were refused"
    );
    assert!(gate.wait_entered(Duration::from_secs(5)));
    drop(gate);
}
