//! The `broker` module is the state engine of the pub/sub system.
//!
//! It contains the following main components:
//!
//! - `Broker`: the process-wide registry of topics and sessions, routing
//!   publishes and guarding topic create/delete.
//! - `Topic`: a history ring buffer plus the set of attached subscriber
//!   queues, with atomic attach-and-replay.
//! - `SubscriberQueue`: the bounded per-subscription delivery queue with
//!   drop-oldest backpressure and slow-consumer detection.
//! - `RingBuffer` and `Message`: per-topic history storage and the message
//!   record itself.
//!
//! The broker never blocks a publish on a slow subscriber; overflow is
//! absorbed by the queues and accounted per subscription.

pub mod engine;
pub mod error;
pub mod message;
pub mod queue;
pub mod ring;
pub mod topic;

pub use engine::Broker;
pub use error::BrokerError;
