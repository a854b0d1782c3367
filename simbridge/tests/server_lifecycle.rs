//! End-to-end tests against a real WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use simbridge::prelude::*;
use simbridge::websocket::CLOSE_GOING_AWAY;

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Connected,
    Disconnected,
    Message(Vec<u8>),
    Error(String),
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Event>>>);

impl Recorder {
    fn attach(&self, server: &Server) {
        let events = self.0.clone();
        server.on_connected(move || events.lock().push(Event::Connected));
        let events = self.0.clone();
        server.on_disconnected(move || events.lock().push(Event::Disconnected));
        let events = self.0.clone();
        server.on_message(move |payload| events.lock().push(Event::Message(payload.to_vec())));
        let events = self.0.clone();
        server.on_error(move |description| events.lock().push(Event::Error(description.into())));
    }

    fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    fn count(&self, wanted: fn(&Event) -> bool) -> usize {
        self.0.lock().iter().filter(|e| wanted(e)).count()
    }

    fn connected(&self) -> usize {
        self.count(|e| matches!(e, Event::Connected))
    }

    fn disconnected(&self) -> usize {
        self.count(|e| matches!(e, Event::Disconnected))
    }

    fn messages(&self) -> Vec<Vec<u8>> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Message(payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    fn errors(&self) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Error(description) => Some(description.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Start a server on a free port with every callback recorded
async fn boot_server() -> (Server, Recorder, String) {
    let server = Server::bind(0).await.unwrap();
    let recorder = Recorder::default();
    recorder.attach(&server);
    server.start(false).await.unwrap();

    let url = format!("ws://127.0.0.1:{}/", server.local_addr().port());
    (server, recorder, url)
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Next data frame, skipping control frames
async fn next_data(ws: &mut WsStream) -> Message {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("receive timed out")
            .expect("stream ended")
            .expect("receive failed");
        if msg.is_text() || msg.is_binary() {
            return msg;
        }
    }
}

#[tokio::test]
async fn test_inbound_text_reaches_message_callback() {
    let (server, recorder, url) = boot_server().await;

    let mut ws = connect(&url).await;
    wait_until("connected callback", || recorder.connected() == 1).await;
    assert!(server.is_connected());

    ws.send(Message::text("ping")).await.unwrap();
    wait_until("message", || !recorder.messages().is_empty()).await;

    assert_eq!(recorder.messages(), vec![b"ping".to_vec()]);
    assert_eq!(recorder.connected(), 1);
    assert!(recorder.errors().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_outbound_frames_reach_peer() {
    let (server, recorder, url) = boot_server().await;

    let mut ws = connect(&url).await;
    wait_until("connected callback", || recorder.connected() == 1).await;

    server.send(vec![1_u8, 2, 3]);
    assert_eq!(next_data(&mut ws).await, Message::binary(vec![1_u8, 2, 3]));

    // Text convenience still travels as a binary frame
    server.send_text("hello");
    assert_eq!(next_data(&mut ws).await, Message::binary(b"hello".to_vec()));

    server.send_frame(b"{\"k\":1}".to_vec(), FrameKind::Text);
    assert_eq!(next_data(&mut ws).await, Message::text("{\"k\":1}"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_send_from_non_runtime_thread() {
    let (server, recorder, url) = boot_server().await;

    let mut ws = connect(&url).await;
    wait_until("connected callback", || recorder.connected() == 1).await;

    let sender = server.clone();
    std::thread::spawn(move || sender.send_text("from a plain thread"))
        .join()
        .unwrap();
    assert_eq!(
        next_data(&mut ws).await,
        Message::binary(b"from a plain thread".to_vec())
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_send_without_peer_is_silent() {
    let (server, recorder, _url) = boot_server().await;

    server.send(b"telemetry".to_vec());
    server.send_text("more telemetry");
    tokio::time::sleep(QUIET).await;

    assert!(!server.is_connected());
    assert!(recorder.errors().is_empty());
    assert!(recorder.messages().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_latest_connection_wins() {
    let (server, recorder, url) = boot_server().await;

    let mut first = connect(&url).await;
    wait_until("first connection", || recorder.connected() == 1).await;
    let mut second = connect(&url).await;
    wait_until("second connection", || recorder.connected() == 2).await;

    server.send(b"only-second".to_vec());
    assert_eq!(
        next_data(&mut second).await,
        Message::binary(b"only-second".to_vec())
    );
    assert!(timeout(QUIET, first.next()).await.is_err());

    // The displaced peer closing does not end the current connection
    first.close(None).await.unwrap();
    tokio::time::sleep(QUIET).await;
    assert_eq!(recorder.disconnected(), 0);
    assert!(server.is_connected());

    second.close(None).await.unwrap();
    wait_until("disconnect", || recorder.disconnected() == 1).await;
    assert!(!server.is_connected());

    server.shutdown().await;
}

#[tokio::test]
async fn test_displaced_connection_still_delivers_messages() {
    let (server, recorder, url) = boot_server().await;

    let mut first = connect(&url).await;
    wait_until("first connection", || recorder.connected() == 1).await;
    let _second = connect(&url).await;
    wait_until("second connection", || recorder.connected() == 2).await;

    first.send(Message::text("late")).await.unwrap();
    wait_until("message", || !recorder.messages().is_empty()).await;
    assert_eq!(recorder.messages(), vec![b"late".to_vec()]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_handshake_without_key_is_rejected() {
    let (server, recorder, _url) = boot_server().await;

    let mut stream = TcpStream::connect(("127.0.0.1", server.local_addr().port()))
        .await
        .unwrap();
    stream
        .write_all(
            b"GET / HTTP/1.1\r\n\
              Host: localhost\r\n\
              Connection: Upgrade\r\n\
              Upgrade: websocket\r\n\
              Sec-WebSocket-Version: 13\r\n\r\n",
        )
        .await
        .unwrap();

    let mut buf = vec![0_u8; 1024];
    let n = timeout(TIMEOUT, stream.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let response = String::from_utf8_lossy(&buf[..n]);
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");

    wait_until("error callback", || !recorder.errors().is_empty()).await;
    assert!(recorder.errors()[0].contains("Sec-WebSocket-Key"));
    assert_eq!(recorder.connected(), 0);
    assert!(!server.is_connected());

    server.shutdown().await;
}

#[tokio::test]
async fn test_plain_http_request_is_bad_request() {
    let (server, recorder, _url) = boot_server().await;

    let url = format!("http://127.0.0.1:{}/status", server.local_addr().port());
    let response = timeout(TIMEOUT, reqwest::get(&url))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(response.text().await.unwrap().is_empty());
    assert_eq!(recorder.errors().len(), 1);
    assert_eq!(recorder.connected(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_close_frame_disconnects_once_without_error() {
    let (server, recorder, url) = boot_server().await;

    let mut ws = connect(&url).await;
    wait_until("connected callback", || server.is_connected()).await;

    ws.close(None).await.unwrap();
    wait_until("disconnect", || recorder.disconnected() == 1).await;
    tokio::time::sleep(QUIET).await;

    assert_eq!(recorder.disconnected(), 1);
    assert!(recorder.errors().is_empty());
    assert!(!server.is_connected());

    server.shutdown().await;
}

#[tokio::test]
async fn test_abrupt_drop_disconnects_once() {
    let (server, recorder, url) = boot_server().await;

    let ws = connect(&url).await;
    wait_until("connected callback", || server.is_connected()).await;

    drop(ws);
    wait_until("disconnect", || recorder.disconnected() == 1).await;
    tokio::time::sleep(QUIET).await;

    assert_eq!(recorder.disconnected(), 1);
    assert!(!server.is_connected());

    server.shutdown().await;
}

#[tokio::test]
async fn test_control_and_empty_frames_keep_session_alive() {
    let (server, recorder, url) = boot_server().await;

    let mut ws = connect(&url).await;
    wait_until("connected callback", || server.is_connected()).await;

    ws.send(Message::Ping(b"are you there".to_vec().into()))
        .await
        .unwrap();
    let pong = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
    assert!(pong.is_pong());

    ws.send(Message::binary(Vec::<u8>::new())).await.unwrap();
    ws.send(Message::text("after")).await.unwrap();
    wait_until("message", || !recorder.messages().is_empty()).await;

    assert_eq!(recorder.messages(), vec![b"after".to_vec()]);
    assert!(server.is_connected());
    assert_eq!(recorder.disconnected(), 0);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_start_returns_on_stop() {
    let server = Server::bind(0).await.unwrap();

    let blocked = server.clone();
    let handle = tokio::spawn(async move { blocked.start(true).await });

    tokio::time::sleep(QUIET).await;
    assert!(!handle.is_finished());
    assert!(server.is_running());

    server.stop();
    let result = timeout(TIMEOUT, handle).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(!server.is_connected());

    server.shutdown().await;
    assert!(!server.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_start_returns_on_first_connection() {
    let server = Server::bind(0).await.unwrap();
    let url = format!("ws://127.0.0.1:{}/", server.local_addr().port());

    let blocked = server.clone();
    let handle = tokio::spawn(async move { blocked.start(true).await });

    let _ws = connect(&url).await;
    let result = timeout(TIMEOUT, handle).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(server.is_connected());

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_peer_and_releases_port() {
    let (server, recorder, url) = boot_server().await;
    let port = server.local_addr().port();

    let mut ws = connect(&url).await;
    wait_until("connected callback", || server.is_connected()).await;

    server.shutdown().await;
    assert!(!server.is_running());
    assert!(!server.is_listening());

    let closing = timeout(TIMEOUT, ws.next()).await.unwrap();
    match closing {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), CLOSE_GOING_AWAY);
        }
        other => panic!("expected close frame, got {other:?}"),
    }
    assert_eq!(recorder.disconnected(), 1);

    // The port can be bound again
    let rebound = Server::bind(port).await.unwrap();
    assert_eq!(rebound.local_addr().port(), port);
}

#[tokio::test]
async fn test_oversized_frame_reports_error_then_disconnect() {
    let (server, recorder, url) = boot_server().await;
    let limit = WebSocketConfig::default().max_frame_size_bytes;

    let mut ws = connect(&url).await;
    wait_until("connected callback", || recorder.connected() == 1).await;

    // The client may already see the connection torn down
    let _ = ws.send(Message::binary(vec![7_u8; limit * 6])).await;
    wait_until("disconnect", || recorder.disconnected() == 1).await;

    let events = recorder.events();
    assert_eq!(events.len(), 3, "{events:?}");
    assert_eq!(events[0], Event::Connected);
    assert!(matches!(events[1], Event::Error(_)), "{events:?}");
    assert_eq!(events[2], Event::Disconnected);
    assert!(recorder.messages().is_empty());
    assert!(!server.is_connected());

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sends_arrive_whole() {
    const SENDERS: usize = 8;
    const PAYLOAD_LEN: usize = 6 * 1024;

    let (server, recorder, url) = boot_server().await;
    let mut ws = connect(&url).await;
    wait_until("connected callback", || recorder.connected() == 1).await;

    let payloads: Vec<Vec<u8>> = (0..SENDERS)
        .map(|i| vec![b'a' + i as u8; PAYLOAD_LEN])
        .collect();
    let threads: Vec<_> = payloads
        .iter()
        .cloned()
        .map(|payload| {
            let sender = server.clone();
            std::thread::spawn(move || sender.send(payload))
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    let mut received = Vec::with_capacity(SENDERS);
    for _ in 0..SENDERS {
        match next_data(&mut ws).await {
            Message::Binary(bytes) => received.push(bytes.to_vec()),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }
    assert!(timeout(QUIET, ws.next()).await.is_err());

    received.sort();
    assert_eq!(received, payloads);
    assert!(recorder.errors().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_start_again_right_after_stop() {
    let (server, recorder, url) = boot_server().await;

    server.stop();
    server.start(false).await.unwrap();
    tokio::time::sleep(QUIET).await;
    assert!(server.is_running());
    assert!(server.is_listening());

    let mut ws = connect(&url).await;
    wait_until("connected callback", || recorder.connected() == 1).await;
    ws.send(Message::text("still here")).await.unwrap();
    wait_until("message", || !recorder.messages().is_empty()).await;
    assert_eq!(recorder.messages(), vec![b"still here".to_vec()]);

    server.shutdown().await;
}

#[tokio::test]
async fn test_restart_after_shutdown() {
    let (server, recorder, url) = boot_server().await;
    server.shutdown().await;

    server.start(false).await.unwrap();
    assert!(server.is_running());

    let mut ws = connect(&url).await;
    wait_until("connected callback", || recorder.connected() == 1).await;
    ws.send(Message::text("again")).await.unwrap();
    wait_until("message", || !recorder.messages().is_empty()).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_publisher_streams_samples_to_peer() {
    let (server, recorder, url) = boot_server().await;
    let cancel = tokio_util::sync::CancellationToken::new();

    let record = PositionRecord::now().with_position("blue-1", Position::new(1.0, 2.0, 3.0));
    let publisher = Publisher::new(server.clone(), StaticSource::new(record))
        .with_interval(Duration::from_millis(20))
        .spawn(cancel.clone());

    let mut ws = connect(&url).await;
    wait_until("connected callback", || recorder.connected() == 1).await;

    let sample = match next_data(&mut ws).await {
        Message::Binary(bytes) => bytes,
        other => panic!("expected binary sample, got {other:?}"),
    };
    let value: serde_json::Value = serde_json::from_slice(&sample).unwrap();
    assert_eq!(value["positions"]["blue-1"]["y"], 2.0);

    cancel.cancel();
    let stats = publisher.await.unwrap();
    assert!(stats.published >= 1);

    server.shutdown().await;
}
