//! Remote sync client behavior against mock TCP servers

use std::time::{Duration, Instant};

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;

use rollcall::events::{AppEvent, EventBus};
use rollcall::sync::{ConnState, SendOutcome, SyncClient, SyncConfig};

fn config(addr: String, retry_attempts: u32) -> SyncConfig {
    SyncConfig {
        addr,
        retry_attempts,
        retry_delay: Duration::from_millis(10),
    }
}

/// Reserve an address nothing listens on.
async fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

const ACK: &[u8] = b"{\"event\":\"connected\",\"data\":{\"id\":\"client-1\"}}\n";

#[tokio::test]
async fn exhausted_retry_budget_drops_sends_without_queueing() {
    let addr = dead_addr().await;
    let client = SyncClient::connect(config(addr, 2), EventBus::new(8));

    // A send issued while the client is still trying resolves as dropped
    // once the budget runs out; nothing stays queued.
    let outcome = timeout(
        Duration::from_secs(2),
        client.send("eventmetadata", json!({})),
    )
    .await
    .expect("send must resolve after give-up");
    assert_eq!(outcome, SendOutcome::Dropped);
    assert_eq!(client.state(), ConnState::GaveUp);

    // Later sends resolve immediately, with no network activity to wait on
    let start = Instant::now();
    assert_eq!(
        client.send("eventdata", json!({})).await,
        SendOutcome::Dropped
    );
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[tokio::test]
async fn disabled_client_drops_immediately() {
    let client = SyncClient::disabled();
    assert_eq!(client.state(), ConnState::GaveUp);
    assert_eq!(
        client.send("eventmetadata", json!({})).await,
        SendOutcome::Dropped
    );
}

#[tokio::test]
async fn transport_connect_alone_is_not_logically_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    // Accept but never acknowledge
    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = SyncClient::connect(config(addr, 3), EventBus::new(8));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn queued_sends_flush_in_order_after_the_ack() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();

        // Hold the ack back so the client has to queue
        tokio::time::sleep(Duration::from_millis(50)).await;
        write.write_all(ACK).await.unwrap();

        let mut lines = BufReader::new(read).lines();
        let first = lines.next_line().await.unwrap().unwrap();
        let second = lines.next_line().await.unwrap().unwrap();
        (first, second)
    });

    let bus = EventBus::new(8);
    let mut events = bus.subscribe();
    let client = SyncClient::connect(config(addr, 3), bus);

    let (a, b) = tokio::join!(
        client.send("eventmetadata", json!({"eventId": "3_10_2016"})),
        client.send("eventdata", json!({"eventname": "Career Night"})),
    );
    assert_eq!(a, SendOutcome::Sent);
    assert_eq!(b, SendOutcome::Sent);

    let (first, second) = timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap();
    assert!(first.contains("eventmetadata"));
    assert!(second.contains("eventdata"));

    let event = timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        AppEvent::RemoteConnected { client_id } => assert_eq!(client_id, "client-1"),
        other => panic!("expected RemoteConnected, got {:?}", other),
    }
    assert!(client.is_connected());
}

#[tokio::test]
async fn send_while_connected_transmits_immediately() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        write.write_all(ACK).await.unwrap();
        let mut lines = BufReader::new(read).lines();
        lines.next_line().await.unwrap().unwrap()
    });

    let bus = EventBus::new(8);
    let mut events = bus.subscribe();
    let client = SyncClient::connect(config(addr, 3), bus);

    // Wait for the logical connection
    timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap();
    assert!(client.is_connected());

    let outcome = client
        .send("attendancedata", json!({"attendanceData": []}))
        .await;
    assert_eq!(outcome, SendOutcome::Sent);

    let line = timeout(Duration::from_secs(2), server).await.unwrap().unwrap();
    assert!(line.contains("attendancedata"));
}

#[tokio::test]
async fn attendance_request_is_republished_on_the_bus() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (_read, mut write) = stream.into_split();
        write.write_all(ACK).await.unwrap();
        write
            .write_all(b"{\"event\":\"requestattendancedata\",\"data\":{}}\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let bus = EventBus::new(8);
    let mut events = bus.subscribe();
    let _client = SyncClient::connect(config(addr, 3), bus);

    let mut saw_request = false;
    for _ in 0..2 {
        match timeout(Duration::from_secs(2), events.recv()).await.unwrap() {
            Ok(AppEvent::AttendanceRequested) => {
                saw_request = true;
                break;
            }
            Ok(_) => continue,
            Err(e) => panic!("bus closed: {:?}", e),
        }
    }
    assert!(saw_request);
}
