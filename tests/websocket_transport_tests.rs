use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{timeout, Duration, Instant};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{Request, Response},
        http::StatusCode,
        Message,
    },
};

use realtime_console::config::ConsoleConfig;
use realtime_console::error::ConsoleError;
use realtime_console::realtime::{
    RealtimeTransport, TransportFrame, TransportLink, WebSocketTransport,
};

#[derive(Debug)]
struct HandshakeObservation {
    auth_header: String,
    beta_header: String,
    query: String,
    bootstrap: Value,
    forwarded: Value,
    ping_seen: bool,
}

fn config_for(address: std::net::SocketAddr) -> ConsoleConfig {
    ConsoleConfig {
        base_url: format!("ws://{address}/v1/realtime"),
        model: "gpt-4o-realtime-preview-2024-10-01".into(),
        heartbeat_interval: Duration::from_millis(10),
        reconnect_max_attempts: 0,
        ..ConsoleConfig::default()
    }
}

async fn next_text(ws: &mut tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(1), ws.next())
            .await
            .expect("frame wait should not timeout")
            .expect("frame should exist")
            .expect("frame should parse");
        match frame {
            Message::Text(text) => {
                return serde_json::from_str(text.as_ref()).expect("frame should be JSON")
            }
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn open_bootstraps_forwards_events_and_sends_heartbeat() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("local addr should be available");

    let (observation_tx, observation_rx) = oneshot::channel::<HandshakeObservation>();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("server should accept");
        let captured = Arc::new(Mutex::new((String::new(), String::new(), String::new())));
        let captured_inner = Arc::clone(&captured);
        let mut ws = accept_hdr_async(stream, move |req: &Request, response: Response| {
            let header = |name: &str| {
                req.headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            };
            *captured_inner.lock().expect("capture lock should not poison") = (
                header("authorization"),
                header("openai-beta"),
                req.uri().query().unwrap_or_default().to_string(),
            );
            Ok(response)
        })
        .await
        .expect("handshake should succeed");

        let bootstrap = next_text(&mut ws).await;
        ws.send(Message::Text(
            json!({"type":"session.created","session":{"id":"sess_1"}})
                .to_string()
                .into(),
        ))
        .await
        .expect("session.created should send");
        let forwarded = next_text(&mut ws).await;

        let mut ping_seen = false;
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            match timeout(Duration::from_millis(100), ws.next()).await {
                Ok(Some(Ok(Message::Ping(_)))) => {
                    ping_seen = true;
                    break;
                }
                Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) => break,
                _ => {}
            }
        }

        let _ = timeout(Duration::from_secs(1), ws.next()).await;
        let (auth_header, beta_header, query) = captured
            .lock()
            .expect("capture lock should not poison")
            .clone();
        let _ = observation_tx.send(HandshakeObservation {
            auth_header,
            beta_header,
            query,
            bootstrap,
            forwarded,
            ping_seen,
        });
    });

    let transport = WebSocketTransport::new(&config_for(address), "test-key")
        .expect("transport should build");
    let bootstrap = json!({"type":"session.update","session":{"instructions":"Be brief."}});
    let mut link = transport.open(bootstrap).await.expect("open should succeed");

    let created = wait_for_event(&mut link, Duration::from_secs(1)).await;
    assert_eq!(created["type"], "session.created");
    assert_eq!(created["session"]["id"], "sess_1");

    link.send(json!({"type":"response.create"}))
        .expect("send should succeed");

    tokio::time::sleep(Duration::from_millis(80)).await;
    link.close().await.expect("close should succeed");

    let observation = observation_rx.await.expect("observation should be collected");
    assert_eq!(observation.auth_header, "Bearer test-key");
    assert_eq!(observation.beta_header, "realtime=v1");
    assert!(observation
        .query
        .contains("model=gpt-4o-realtime-preview-2024-10-01"));
    assert_eq!(observation.bootstrap["type"], "session.update");
    assert_eq!(observation.bootstrap["session"]["instructions"], "Be brief.");
    assert_eq!(observation.forwarded["type"], "response.create");
    assert!(observation.ping_seen);

    server.await.expect("server task should complete");
}

#[tokio::test]
async fn open_returns_authentication_error_when_server_rejects_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("local addr should be available");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("server should accept");
        let result = accept_hdr_async(stream, |_req: &Request, _response: Response| {
            let response = tokio_tungstenite::tungstenite::http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body(Some("unauthorized".to_string()))
                .expect("auth failure response should build");
            Err(response)
        })
        .await;
        assert!(result.is_err());
    });

    let transport = WebSocketTransport::new(&config_for(address), "wrong-key")
        .expect("transport should build");
    let error = transport
        .open(json!({"type":"session.update","session":{}}))
        .await
        .err()
        .expect("open should fail");
    assert!(matches!(error, ConsoleError::Authentication(_)));

    server.await.expect("server task should complete");
}

#[tokio::test]
async fn reconnect_replays_latest_session_update() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("local addr should be available");

    let bootstraps = Arc::new(Mutex::new(Vec::<Value>::new()));
    let bootstraps_server = Arc::clone(&bootstraps);
    let (updated_tx, updated_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let mut updated_rx = Some(updated_rx);
        for connection_index in 0..2 {
            let (stream, _) = listener.accept().await.expect("server should accept");
            let mut ws = accept_hdr_async(stream, |_req: &Request, response: Response| Ok(response))
                .await
                .expect("handshake should succeed");
            let bootstrap = next_text(&mut ws).await;
            bootstraps_server
                .lock()
                .expect("bootstrap lock should not poison")
                .push(bootstrap);

            if connection_index == 0 {
                let update = next_text(&mut ws).await;
                assert_eq!(update["type"], "session.update");
                if let Some(updated_rx) = updated_rx.take() {
                    let _ = updated_rx.await;
                }
                ws.close(None).await.expect("first connection should close");
                continue;
            }

            ws.send(Message::Text(
                json!({"type":"session.created","session":{"id":"after_reconnect"}})
                    .to_string()
                    .into(),
            ))
            .await
            .expect("session.created should send");
            let _ = timeout(Duration::from_secs(1), ws.next()).await;
        }
    });

    let config = ConsoleConfig {
        reconnect_max_attempts: 3,
        reconnect_base_delay: Duration::from_millis(20),
        reconnect_max_delay: Duration::from_millis(80),
        heartbeat_interval: Duration::from_millis(200),
        ..config_for(address)
    };
    let transport = WebSocketTransport::new(&config, "test-key").expect("transport should build");
    let mut link = transport
        .open(json!({"type":"session.update","session":{"instructions":"first"}}))
        .await
        .expect("open should succeed");
    link.send(json!({"type":"session.update","session":{"instructions":"second"}}))
        .expect("update should send");
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = updated_tx.send(());

    let created = wait_for_event(&mut link, Duration::from_secs(2)).await;
    assert_eq!(created["session"]["id"], "after_reconnect");

    link.close().await.expect("close should succeed");
    server.await.expect("server task should complete");

    let bootstraps = bootstraps.lock().expect("bootstrap lock should not poison");
    assert_eq!(bootstraps.len(), 2);
    assert_eq!(bootstraps[0]["session"]["instructions"], "first");
    assert_eq!(bootstraps[1]["session"]["instructions"], "second");
}

/// Next server event, skipping transport errors reported while reconnecting.
async fn wait_for_event(link: &mut TransportLink, max_wait: Duration) -> Value {
    let deadline = Instant::now() + max_wait;
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .expect("event did not arrive before timeout");
        let frame = timeout(remaining, link.recv())
            .await
            .expect("waiting for event should not timeout")
            .expect("link should stay open");
        match frame {
            TransportFrame::Event(event) => return event,
            TransportFrame::Error(_) => {}
            TransportFrame::Closed => panic!("link closed unexpectedly"),
        }
    }
}
