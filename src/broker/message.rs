use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A published message.
///
/// The broker treats the payload as opaque JSON; identity is the `id`, a
/// caller-supplied UUID in canonical lowercase hyphenated form. The `ts`
/// field is stamped by the server at publish time and rides along to
/// subscribers unchanged.
///
/// # Example
///
/// ```rust
/// use fanhub::broker::message::Message;
/// let msg = Message::new(
///     "11111111-1111-4111-8111-111111111111",
///     serde_json::json!({"v": 1}),
/// );
/// assert_eq!(msg.id, "11111111-1111-4111-8111-111111111111");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub payload: Value,
    pub ts: DateTime<Utc>,
}

impl Message {
    /// Creates a message stamped with the current wall-clock time.
    pub fn new(id: &str, payload: Value) -> Self {
        Self {
            id: id.to_string(),
            payload,
            ts: Utc::now(),
        }
    }
}

/// Returns true when `id` is a UUID in canonical lowercase hyphenated form.
///
/// `Uuid::parse_str` also accepts braced, simple and urn forms, so the
/// parsed value is rendered back and compared to the input.
pub fn is_canonical_uuid(id: &str) -> bool {
    Uuid::parse_str(id)
        .map(|u| u.hyphenated().to_string() == id)
        .unwrap_or(false)
}
