use serde_json::{json, Value};

use crate::broker::error::BrokerError;
use crate::broker::message::Message;
use crate::transport::frame::{ClientFrame, ErrorCode, ServerFrame};

fn parse(frame: Value) -> Result<ClientFrame, serde_json::Error> {
    serde_json::from_str(&frame.to_string())
}

#[test]
fn test_parse_subscribe_frame() {
    let frame = parse(json!({
        "type": "subscribe",
        "topic": "orders",
        "client_id": "client-1",
        "last_n": 3,
        "request_id": "r1"
    }))
    .unwrap();
    match frame {
        ClientFrame::Subscribe {
            topic,
            client_id,
            last_n,
            request_id,
        } => {
            assert_eq!(topic, "orders");
            assert_eq!(client_id, "client-1");
            assert_eq!(last_n, Some(3));
            assert_eq!(request_id, Some("r1".to_string()));
        }
        other => panic!("expected subscribe, got {other:?}"),
    }
}

#[test]
fn test_parse_subscribe_frame_minimal() {
    let frame = parse(json!({
        "type": "subscribe",
        "topic": "orders",
        "client_id": "client-1"
    }))
    .unwrap();
    match frame {
        ClientFrame::Subscribe {
            last_n, request_id, ..
        } => {
            assert_eq!(last_n, None);
            assert_eq!(request_id, None);
        }
        other => panic!("expected subscribe, got {other:?}"),
    }
}

#[test]
fn test_parse_publish_frame() {
    let frame = parse(json!({
        "type": "publish",
        "topic": "orders",
        "message": {
            "id": "11111111-1111-4111-8111-111111111111",
            "payload": { "v": 1 }
        }
    }))
    .unwrap();
    match frame {
        ClientFrame::Publish { topic, message, .. } => {
            assert_eq!(topic, "orders");
            assert_eq!(message.id, "11111111-1111-4111-8111-111111111111");
            assert_eq!(message.payload, json!({ "v": 1 }));
        }
        other => panic!("expected publish, got {other:?}"),
    }
}

#[test]
fn test_parse_ping_frame() {
    let frame = parse(json!({ "type": "ping", "request_id": "p1" })).unwrap();
    assert!(matches!(
        frame,
        ClientFrame::Ping { request_id: Some(ref r) } if r == "p1"
    ));
}

#[test]
fn test_parse_rejects_unknown_type_and_missing_fields() {
    assert!(parse(json!({ "type": "unknown" })).is_err());
    assert!(parse(json!({ "type": "subscribe", "topic": "orders" })).is_err());
    assert!(parse(json!({ "type": "publish", "topic": "orders" })).is_err());
    assert!(parse(json!({ "hello": "world" })).is_err());
}

fn to_value(frame: &ServerFrame) -> Value {
    serde_json::to_value(frame).unwrap()
}

#[test]
fn test_serialize_ack() {
    let v = to_value(&ServerFrame::ack(Some("r1".to_string()), "orders"));
    assert_eq!(v["type"], "ack");
    assert_eq!(v["request_id"], "r1");
    assert_eq!(v["topic"], "orders");
    assert_eq!(v["status"], "ok");
    assert!(v["ts"].is_string());

    // absent request_id is omitted, not null
    let v = to_value(&ServerFrame::ack(None, "orders"));
    assert!(v.get("request_id").is_none());
}

#[test]
fn test_serialize_event_embeds_message() {
    let message = Message::new("11111111-1111-4111-8111-111111111111", json!({ "v": 1 }));
    let v = to_value(&ServerFrame::event("orders", &message));
    assert_eq!(v["type"], "event");
    assert_eq!(v["topic"], "orders");
    assert_eq!(v["message"]["id"], "11111111-1111-4111-8111-111111111111");
    assert_eq!(v["message"]["payload"], json!({ "v": 1 }));
    assert!(v["message"]["ts"].is_string());
    assert!(v["ts"].is_string());
}

#[test]
fn test_serialize_error_codes() {
    let v = to_value(&ServerFrame::error(None, ErrorCode::BadRequest, "nope"));
    assert_eq!(v["type"], "error");
    assert_eq!(v["error"]["code"], "BAD_REQUEST");
    assert_eq!(v["error"]["message"], "nope");

    let v = to_value(&ServerFrame::error(None, ErrorCode::SlowConsumer, "slow"));
    assert_eq!(v["error"]["code"], "SLOW_CONSUMER");
    let v = to_value(&ServerFrame::error(None, ErrorCode::TopicNotFound, "gone"));
    assert_eq!(v["error"]["code"], "TOPIC_NOT_FOUND");
    let v = to_value(&ServerFrame::error(None, ErrorCode::ServiceUnavailable, "down"));
    assert_eq!(v["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[test]
fn test_serialize_info_and_pong() {
    let v = to_value(&ServerFrame::info("topic deleted", Some("orders".to_string())));
    assert_eq!(v["type"], "info");
    assert_eq!(v["msg"], "topic deleted");
    assert_eq!(v["topic"], "orders");

    let v = to_value(&ServerFrame::info("server shutting down", None));
    assert!(v.get("topic").is_none());

    let v = to_value(&ServerFrame::pong(Some("p1".to_string())));
    assert_eq!(v["type"], "pong");
    assert_eq!(v["request_id"], "p1");
}

#[test]
fn test_error_code_from_broker_error() {
    assert_eq!(
        ErrorCode::from(&BrokerError::TopicNotFound("x".to_string())),
        ErrorCode::TopicNotFound
    );
    assert_eq!(
        ErrorCode::from(&BrokerError::BadRequest("x".to_string())),
        ErrorCode::BadRequest
    );
    assert_eq!(
        ErrorCode::from(&BrokerError::TopicExists("x".to_string())),
        ErrorCode::BadRequest
    );
    assert_eq!(
        ErrorCode::from(&BrokerError::ShuttingDown),
        ErrorCode::ServiceUnavailable
    );
}
