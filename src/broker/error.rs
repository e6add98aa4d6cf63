use thiserror::Error;

/// Errors surfaced by broker operations.
///
/// Each variant maps onto one protocol error code (and one REST status):
/// `TopicExists` → 409, `TopicNotFound` → `TOPIC_NOT_FOUND`/404,
/// `BadRequest` → `BAD_REQUEST`/400, `ShuttingDown` →
/// `SERVICE_UNAVAILABLE`/503.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("topic '{0}' already exists")]
    TopicExists(String),

    #[error("topic '{0}' not found")]
    TopicNotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("server is shutting down")]
    ShuttingDown,
}
