use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::warn;

use crate::broker::message::Message;

/// Why a queue stopped yielding messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEnd {
    /// Unsubscribed or the owning session went away.
    Detached,
    /// The topic was deleted out from under the subscription.
    TopicDeleted,
    /// The broker is tearing down.
    Shutdown,
    /// Consecutive drops reached the slow-consumer threshold.
    SlowConsumer,
}

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    /// The queue was full; the oldest message was evicted to make room.
    EvictedOldest,
    /// The queue has ended and takes no more messages.
    Rejected,
}

#[derive(Debug)]
struct Inner {
    items: VecDeque<Arc<Message>>,
    consecutive_drops: u32,
    end: Option<QueueEnd>,
}

/// Bounded FIFO of pending deliveries for one (session, topic) pair.
///
/// `offer` never blocks: on overflow the oldest pending message is evicted
/// and the consecutive-drop counter advances. Crossing the slow-consumer
/// threshold ends the queue terminally so the subscription's writer can
/// evict the session. A single writer task consumes via `take`.
#[derive(Debug)]
pub struct SubscriberQueue {
    client_id: String,
    topic: String,
    capacity: usize,
    slow_threshold: u32,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl SubscriberQueue {
    pub fn new(client_id: &str, topic: &str, capacity: usize, slow_threshold: u32) -> Self {
        Self {
            client_id: client_id.to_string(),
            topic: topic.to_string(),
            capacity: capacity.max(1),
            slow_threshold: slow_threshold.max(1),
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                consecutive_drops: 0,
                end: None,
            }),
            notify: Notify::new(),
        }
    }

    /// Non-blocking enqueue with drop-oldest overflow.
    ///
    /// A successful enqueue through the normal path resets the
    /// consecutive-drop counter.
    pub fn offer(&self, message: Arc<Message>) -> Offer {
        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            if inner.end.is_some() {
                return Offer::Rejected;
            }
            if inner.items.len() == self.capacity {
                inner.items.pop_front();
                inner.consecutive_drops += 1;
                inner.items.push_back(message);
                warn!(
                    client_id = %self.client_id,
                    topic = %self.topic,
                    drops = inner.consecutive_drops,
                    "subscriber queue full, dropped oldest message"
                );
                if inner.consecutive_drops >= self.slow_threshold {
                    inner.end = Some(QueueEnd::SlowConsumer);
                }
                Offer::EvictedOldest
            } else {
                inner.items.push_back(message);
                inner.consecutive_drops = 0;
                Offer::Accepted
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Awaits the next message in FIFO order.
    ///
    /// Returns `Err` once the queue has ended; an ended queue discards any
    /// messages still pending.
    pub async fn take(&self) -> Result<Arc<Message>, QueueEnd> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(end) = inner.end {
                    return Err(end);
                }
                if let Some(message) = inner.items.pop_front() {
                    return Ok(message);
                }
            }
            notified.await;
        }
    }

    /// Ends the queue, unblocking the consumer. The first end reason wins.
    pub fn close(&self, end: QueueEnd) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.end.is_none() {
                inner.end = Some(end);
            }
        }
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn consecutive_drops(&self) -> u32 {
        self.inner.lock().unwrap().consecutive_drops
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}
