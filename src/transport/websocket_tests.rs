use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::broker::Broker;
use crate::config::Settings;
use crate::lifecycle::LifecycleController;
use crate::transport::frame::CLOSE_AUTH_FAILURE;
use crate::transport::frame::CLOSE_GOING_AWAY;
use crate::transport::websocket::start_websocket_server;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (String, Arc<Broker>) {
    let settings = Settings::default();
    let addr = format!(
        "127.0.0.1:{}",
        portpicker::pick_unused_port().expect("No free ports")
    );
    let broker = Arc::new(Broker::new(settings.broker.clone()));
    tokio::spawn(start_websocket_server(addr.clone(), broker.clone(), settings));

    // Give the server a moment to start up
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, broker)
}

async fn connect(addr: &str) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws?api_key=plivo-test-key"))
        .await
        .expect("WebSocket handshake failed");
    ws
}

async fn send(ws: &mut WsClient, frame: Value) {
    ws.send(WsMessage::text(frame.to_string()))
        .await
        .expect("send failed");
}

async fn recv_frame(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("transport error");
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

async fn recv_close_code(ws: &mut WsClient) -> u16 {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended")
            .expect("transport error");
        if let WsMessage::Close(frame) = msg {
            return u16::from(frame.expect("close frame with code").code);
        }
    }
}

async fn subscribe(ws: &mut WsClient, topic: &str, client_id: &str, last_n: i64) -> Value {
    send(
        ws,
        json!({
            "type": "subscribe",
            "topic": topic,
            "client_id": client_id,
            "last_n": last_n
        }),
    )
    .await;
    recv_frame(ws).await
}

#[tokio::test]
async fn test_rejects_missing_api_key() {
    let (addr, _broker) = start_server().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("handshake should succeed before the auth close");
    assert_eq!(recv_close_code(&mut ws).await, CLOSE_AUTH_FAILURE);
}

#[tokio::test]
async fn test_rejects_wrong_api_key() {
    let (addr, _broker) = start_server().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws?api_key=wrong"))
        .await
        .expect("handshake should succeed before the auth close");
    assert_eq!(recv_close_code(&mut ws).await, CLOSE_AUTH_FAILURE);
}

#[tokio::test]
async fn test_rejects_unknown_path() {
    let (addr, _broker) = start_server().await;
    assert!(connect_async(format!("ws://{addr}/other?api_key=plivo-test-key"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_ping_pong_echoes_request_id() {
    let (addr, _broker) = start_server().await;
    let mut ws = connect(&addr).await;
    send(&mut ws, json!({ "type": "ping", "request_id": "p1" })).await;
    let pong = recv_frame(&mut ws).await;
    assert_eq!(pong["type"], "pong");
    assert_eq!(pong["request_id"], "p1");
    assert!(pong["ts"].is_string());
}

#[tokio::test]
async fn test_publish_fans_out_to_all_subscribers() {
    let (addr, broker) = start_server().await;
    broker.create_topic("orders", Some(10)).unwrap();

    let mut sub_a = connect(&addr).await;
    let mut sub_b = connect(&addr).await;
    let mut publisher = connect(&addr).await;

    assert_eq!(subscribe(&mut sub_a, "orders", "client-a", 0).await["type"], "ack");
    assert_eq!(subscribe(&mut sub_b, "orders", "client-b", 0).await["type"], "ack");

    let id = "11111111-1111-4111-8111-111111111111";
    send(
        &mut publisher,
        json!({
            "type": "publish",
            "topic": "orders",
            "message": { "id": id, "payload": { "v": 1 } },
            "request_id": "pub-1"
        }),
    )
    .await;

    let ack = recv_frame(&mut publisher).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["request_id"], "pub-1");
    assert_eq!(ack["status"], "ok");

    for ws in [&mut sub_a, &mut sub_b] {
        let event = recv_frame(ws).await;
        assert_eq!(event["type"], "event");
        assert_eq!(event["topic"], "orders");
        assert_eq!(event["message"]["id"], id);
        assert_eq!(event["message"]["payload"], json!({ "v": 1 }));
    }
}

#[tokio::test]
async fn test_subscribe_replays_history_then_live() {
    let (addr, broker) = start_server().await;
    broker.create_topic("orders", Some(5)).unwrap();
    let ids: Vec<String> = (0..7).map(|_| Uuid::new_v4().to_string()).collect();
    for (i, id) in ids.iter().enumerate() {
        broker.publish("orders", id, json!({ "i": i })).unwrap();
    }

    let mut ws = connect(&addr).await;
    assert_eq!(subscribe(&mut ws, "orders", "client-a", 3).await["type"], "ack");

    // the last three of seven, in publish order
    for expected in &ids[4..] {
        let event = recv_frame(&mut ws).await;
        assert_eq!(event["type"], "event");
        assert_eq!(event["message"]["id"], expected.as_str());
    }

    let live = Uuid::new_v4().to_string();
    broker.publish("orders", &live, json!({ "live": true })).unwrap();
    let event = recv_frame(&mut ws).await;
    assert_eq!(event["message"]["id"], live.as_str());
}

#[tokio::test]
async fn test_publish_with_invalid_uuid() {
    let (addr, broker) = start_server().await;
    broker.create_topic("orders", None).unwrap();
    let mut ws = connect(&addr).await;
    send(
        &mut ws,
        json!({
            "type": "publish",
            "topic": "orders",
            "message": { "id": "not-a-uuid", "payload": 1 },
            "request_id": "r1"
        }),
    )
    .await;
    let error = recv_frame(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["error"]["code"], "BAD_REQUEST");
    assert_eq!(error["request_id"], "r1");
}

#[tokio::test]
async fn test_publish_to_unknown_topic() {
    let (addr, _broker) = start_server().await;
    let mut ws = connect(&addr).await;
    send(
        &mut ws,
        json!({
            "type": "publish",
            "topic": "missing",
            "message": { "id": Uuid::new_v4().to_string(), "payload": 1 }
        }),
    )
    .await;
    let error = recv_frame(&mut ws).await;
    assert_eq!(error["error"]["code"], "TOPIC_NOT_FOUND");
}

#[tokio::test]
async fn test_subscribe_with_negative_last_n() {
    let (addr, broker) = start_server().await;
    broker.create_topic("orders", None).unwrap();
    let mut ws = connect(&addr).await;
    let response = subscribe(&mut ws, "orders", "client-a", -1).await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_duplicate_subscribe_rejected() {
    let (addr, broker) = start_server().await;
    broker.create_topic("orders", None).unwrap();
    let mut ws = connect(&addr).await;
    assert_eq!(subscribe(&mut ws, "orders", "client-a", 0).await["type"], "ack");
    let second = subscribe(&mut ws, "orders", "client-a", 0).await;
    assert_eq!(second["type"], "error");
    assert_eq!(second["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_malformed_frame_is_bad_request() {
    let (addr, _broker) = start_server().await;
    let mut ws = connect(&addr).await;
    ws.send(WsMessage::text("{not json")).await.unwrap();
    let error = recv_frame(&mut ws).await;
    assert_eq!(error["error"]["code"], "BAD_REQUEST");

    send(&mut ws, json!({ "type": "frobnicate" })).await;
    let error = recv_frame(&mut ws).await;
    assert_eq!(error["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let (addr, broker) = start_server().await;
    broker.create_topic("orders", None).unwrap();
    let mut ws = connect(&addr).await;
    assert_eq!(subscribe(&mut ws, "orders", "client-a", 0).await["type"], "ack");

    send(
        &mut ws,
        json!({ "type": "unsubscribe", "topic": "orders", "client_id": "client-a" }),
    )
    .await;
    assert_eq!(recv_frame(&mut ws).await["type"], "ack");

    broker
        .publish("orders", &Uuid::new_v4().to_string(), json!(1))
        .unwrap();

    // nothing was delivered for that publish; the next frame is the pong
    send(&mut ws, json!({ "type": "ping" })).await;
    assert_eq!(recv_frame(&mut ws).await["type"], "pong");
}

#[tokio::test]
async fn test_topic_deletion_notifies_subscriber() {
    let (addr, broker) = start_server().await;
    broker.create_topic("orders", None).unwrap();
    let mut ws = connect(&addr).await;
    assert_eq!(subscribe(&mut ws, "orders", "client-a", 0).await["type"], "ack");

    broker.delete_topic("orders").unwrap();
    let info = recv_frame(&mut ws).await;
    assert_eq!(info["type"], "info");
    assert_eq!(info["topic"], "orders");

    send(
        &mut ws,
        json!({
            "type": "publish",
            "topic": "orders",
            "message": { "id": Uuid::new_v4().to_string(), "payload": 1 }
        }),
    )
    .await;
    let error = recv_frame(&mut ws).await;
    assert_eq!(error["error"]["code"], "TOPIC_NOT_FOUND");
}

#[tokio::test]
async fn test_shutdown_rejects_everything_but_ping() {
    let (addr, broker) = start_server().await;
    broker.create_topic("orders", None).unwrap();
    let mut ws = connect(&addr).await;
    broker.begin_shutdown();

    send(
        &mut ws,
        json!({
            "type": "publish",
            "topic": "orders",
            "message": { "id": Uuid::new_v4().to_string(), "payload": 1 },
            "request_id": "r1"
        }),
    )
    .await;
    let error = recv_frame(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["error"]["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(error["request_id"], "r1");

    send(&mut ws, json!({ "type": "ping" })).await;
    assert_eq!(recv_frame(&mut ws).await["type"], "pong");
}

#[tokio::test]
async fn test_graceful_shutdown_notifies_and_closes() {
    let (addr, broker) = start_server().await;
    broker.create_topic("orders", None).unwrap();
    let lifecycle = LifecycleController::new(broker.clone(), Duration::from_secs(5));

    let mut ws = connect(&addr).await;
    assert_eq!(subscribe(&mut ws, "orders", "client-a", 0).await["type"], "ack");

    lifecycle.shutdown().await;

    let info = recv_frame(&mut ws).await;
    assert_eq!(info["type"], "info");
    assert_eq!(info["msg"], "server shutting down");
    assert_eq!(recv_close_code(&mut ws).await, CLOSE_GOING_AWAY);
}
