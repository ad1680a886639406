//! Reconnection behavior of the observer client against real sockets.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use hostdeck::client::{ConnectionStatus, GatewayClient, ReconnectOptions};
use hostdeck::events::{BroadcastEvent, Message};

fn fast_options(max_retries: u32) -> ReconnectOptions {
    ReconnectOptions {
        max_retries,
        retry_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

/// A port nothing is listening on. Bound and immediately released; the
/// race window is acceptable for loopback tests.
async fn dead_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/ws")
}

#[tokio::test]
async fn gives_up_after_max_consecutive_failures() {
    let client = GatewayClient::connect(dead_port().await, fast_options(3));
    let mut status = client.status_watch();

    timeout(
        Duration::from_secs(5),
        status.wait_for(|s| *s == ConnectionStatus::Disconnected),
    )
    .await
    .expect("never reached the terminal status")
    .unwrap();

    // The event stream ends with the connection.
    let mut client = client;
    assert!(client.next_event().await.is_none());
}

#[tokio::test]
async fn successful_connection_resets_the_failure_counter() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = GatewayClient::connect(format!("ws://{addr}/ws"), fast_options(2));
    let mut status = client.status_watch();

    // More connect/close cycles than the retry budget allows. Each
    // established connection must reset the counter, or the third cycle
    // would never happen.
    for _ in 0..3 {
        let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("client never reconnected")
            .unwrap();
        let socket = accept_async(stream).await.unwrap();
        timeout(
            Duration::from_secs(5),
            status.wait_for(|s| *s == ConnectionStatus::Connected),
        )
        .await
        .expect("client never reported connected")
        .unwrap();
        drop(socket);
    }

    assert_ne!(client.status(), ConnectionStatus::Disconnected);

    // With the server gone, two refused attempts exhaust the budget.
    drop(listener);
    timeout(
        Duration::from_secs(5),
        status.wait_for(|s| *s == ConnectionStatus::Disconnected),
    )
    .await
    .expect("never gave up after the listener went away")
    .unwrap();
}

#[tokio::test]
async fn success_after_failures_restores_the_full_retry_budget() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let post_close_rejects = Arc::new(AtomicUsize::new(0));
    let (close_tx, close_rx) = oneshot::channel::<()>();

    // Scripted peer: refuse the first two handshakes, accept the third,
    // close it on signal, then refuse everything that follows. Attempts
    // are serialized by the client, so the script is deterministic.
    let rejects = post_close_rejects.clone();
    tokio::spawn(async move {
        for _ in 0..2 {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        }
        let (stream, _) = listener.accept().await.unwrap();
        let socket = accept_async(stream).await.unwrap();
        let _ = close_rx.await;
        drop(socket);
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            // Count before closing: the client cannot observe this failure
            // until the stream is gone.
            rejects.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    // Two failures leave the client one short of its budget; the accepted
    // third attempt must wipe them.
    let client = GatewayClient::connect(format!("ws://{addr}/ws"), fast_options(3));
    let mut status = client.status_watch();
    timeout(
        Duration::from_secs(5),
        status.wait_for(|s| *s == ConnectionStatus::Connected),
    )
    .await
    .expect("client never connected after the refused attempts")
    .unwrap();

    close_tx.send(()).unwrap();
    timeout(
        Duration::from_secs(5),
        status.wait_for(|s| *s == ConnectionStatus::Disconnected),
    )
    .await
    .expect("never reached the terminal status")
    .unwrap();

    // A stale counter would give up after a single post-close refusal;
    // the fresh budget allows exactly three.
    assert_eq!(post_close_rejects.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn decodes_broadcast_frames_into_events() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();
        let event = BroadcastEvent::message(Message::new("assistant", "live update"));
        let frame = serde_json::to_string(&event).unwrap();
        socket.send(WsMessage::text(frame)).await.unwrap();
        // Hold the connection open until the client goes away.
        while socket.next().await.is_some() {}
    });

    let mut client = GatewayClient::connect(format!("ws://{addr}/ws"), fast_options(3));
    let event = timeout(Duration::from_secs(5), client.next_event())
        .await
        .expect("no event arrived")
        .expect("stream ended early");
    match event {
        BroadcastEvent::Message { message } => {
            assert_eq!(message.role, "assistant");
            assert_eq!(message.content, "live update");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_interrupts_a_pending_retry() {
    let options = ReconnectOptions {
        max_retries: 100,
        retry_interval: Duration::from_secs(60),
        ..Default::default()
    };
    let client = GatewayClient::connect(dead_port().await, options);
    let mut status = client.status_watch();

    // Let the first attempt fail so the client is parked in its retry
    // sleep.
    timeout(
        Duration::from_secs(5),
        status.wait_for(|s| *s == ConnectionStatus::Reconnecting),
    )
    .await
    .expect("client never started retrying")
    .unwrap();

    timeout(Duration::from_secs(1), client.shutdown())
        .await
        .expect("shutdown did not interrupt the retry sleep");
}
