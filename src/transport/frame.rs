use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::error::BrokerError;
use crate::broker::message::Message;

/// Transport close code for graceful shutdown.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Transport close code for slow-consumer eviction.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Transport close code for failed credential admission.
pub const CLOSE_AUTH_FAILURE: u16 = 4401;

/// A frame sent by a client.
///
/// One JSON object per WebSocket text message, dispatched on the `type`
/// tag. Anything that fails to parse into one of these shapes is answered
/// with a `BAD_REQUEST` error frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "subscribe")]
    Subscribe {
        topic: String,
        client_id: String,
        #[serde(default)]
        last_n: Option<i64>,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        topic: String,
        client_id: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "publish")]
    Publish {
        topic: String,
        message: PublishPayload,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "ping")]
    Ping {
        #[serde(default)]
        request_id: Option<String>,
    },
}

/// The message body of a publish frame.
#[derive(Debug, Deserialize)]
pub struct PublishPayload {
    pub id: String,
    pub payload: Value,
}

/// Protocol error codes carried in `error` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    TopicNotFound,
    SlowConsumer,
    ServiceUnavailable,
}

impl From<&BrokerError> for ErrorCode {
    fn from(err: &BrokerError) -> Self {
        match err {
            BrokerError::TopicExists(_) | BrokerError::BadRequest(_) => ErrorCode::BadRequest,
            BrokerError::TopicNotFound(_) => ErrorCode::TopicNotFound,
            BrokerError::ShuttingDown => ErrorCode::ServiceUnavailable,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// The message body of an `event` frame.
#[derive(Debug, Serialize)]
pub struct EventMessage {
    pub id: String,
    pub payload: Value,
    pub ts: DateTime<Utc>,
}

/// A frame sent to a client.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "ack")]
    Ack {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        topic: String,
        status: &'static str,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "event")]
    Event {
        topic: String,
        message: EventMessage,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        error: ErrorBody,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "info")]
    Info {
        msg: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        ts: DateTime<Utc>,
    },

    #[serde(rename = "pong")]
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        ts: DateTime<Utc>,
    },
}

impl ServerFrame {
    pub fn ack(request_id: Option<String>, topic: &str) -> Self {
        ServerFrame::Ack {
            request_id,
            topic: topic.to_string(),
            status: "ok",
            ts: Utc::now(),
        }
    }

    pub fn event(topic: &str, message: &Message) -> Self {
        ServerFrame::Event {
            topic: topic.to_string(),
            message: EventMessage {
                id: message.id.clone(),
                payload: message.payload.clone(),
                ts: message.ts,
            },
            ts: Utc::now(),
        }
    }

    pub fn error(request_id: Option<String>, code: ErrorCode, message: &str) -> Self {
        ServerFrame::Error {
            request_id,
            error: ErrorBody {
                code,
                message: message.to_string(),
            },
            ts: Utc::now(),
        }
    }

    pub fn broker_error(request_id: Option<String>, err: &BrokerError) -> Self {
        Self::error(request_id, ErrorCode::from(err), &err.to_string())
    }

    pub fn info(msg: &str, topic: Option<String>) -> Self {
        ServerFrame::Info {
            msg: msg.to_string(),
            topic,
            ts: Utc::now(),
        }
    }

    pub fn pong(request_id: Option<String>) -> Self {
        ServerFrame::Pong {
            request_id,
            ts: Utc::now(),
        }
    }
}
