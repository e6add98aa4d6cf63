use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::broker::message::Message;
use crate::broker::queue::{Offer, QueueEnd, SubscriberQueue};
use crate::broker::ring::RingBuffer;

/// Per-publish fan-out accounting, fed into the broker's global counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct FanoutOutcome {
    pub enqueued: u64,
    pub dropped: u64,
}

struct TopicInner {
    ring: RingBuffer,
    /// Attached delivery queues, keyed by owning session id. The queues are
    /// owned by their sessions; these are fan-out handles only.
    subscribers: HashMap<String, Arc<SubscriberQueue>>,
}

/// A named channel: a history ring plus the set of attached subscriber
/// queues.
///
/// One lock guards both so that `attach` can read the replay tail and join
/// the subscriber set atomically with respect to `publish`: no message can
/// be both replayed and delivered live, and none can fall in between.
pub struct Topic {
    name: String,
    ring_size: usize,
    total_published: AtomicU64,
    inner: Mutex<TopicInner>,
}

impl Topic {
    pub fn new(name: &str, ring_size: usize) -> Self {
        Self {
            name: name.to_string(),
            ring_size,
            total_published: AtomicU64::new(0),
            inner: Mutex::new(TopicInner {
                ring: RingBuffer::new(ring_size),
                subscribers: HashMap::new(),
            }),
        }
    }

    /// Appends to the ring and fans out to every attached queue.
    ///
    /// The subscriber set is snapshotted under the lock and the offers run
    /// outside it, so one slow queue cannot stall publishes or the other
    /// subscribers of this topic. Offers are non-blocking.
    pub fn publish(&self, message: Arc<Message>) -> FanoutOutcome {
        let targets: Vec<Arc<SubscriberQueue>> = {
            let mut inner = self.inner.lock().unwrap();
            inner.ring.append(message.clone());
            self.total_published.fetch_add(1, Ordering::Relaxed);
            inner.subscribers.values().cloned().collect()
        };

        let mut outcome = FanoutOutcome::default();
        for queue in targets {
            match queue.offer(message.clone()) {
                Offer::Accepted => outcome.enqueued += 1,
                Offer::EvictedOldest => {
                    outcome.enqueued += 1;
                    outcome.dropped += 1;
                }
                Offer::Rejected => {}
            }
        }
        outcome
    }

    /// Attaches a queue and returns the replay batch in one atomic step.
    ///
    /// The returned messages are the last `min(last_n, size)` in publish
    /// order; every publish serialized after this call lands in the queue,
    /// so the caller can deliver replay strictly before live events.
    pub fn attach(
        &self,
        session_id: &str,
        queue: Arc<SubscriberQueue>,
        last_n: usize,
    ) -> Vec<Arc<Message>> {
        let mut inner = self.inner.lock().unwrap();
        let replay = inner.ring.tail(last_n);
        if let Some(old) = inner.subscribers.insert(session_id.to_string(), queue) {
            old.close(QueueEnd::Detached);
        }
        replay
    }

    /// Removes the session's queue from the fan-out set. Idempotent.
    pub fn detach(&self, session_id: &str) -> Option<Arc<SubscriberQueue>> {
        self.inner.lock().unwrap().subscribers.remove(session_id)
    }

    /// Detaches and ends every attached queue with the given reason.
    pub fn close_all(&self, end: QueueEnd) {
        let queues: Vec<Arc<SubscriberQueue>> = {
            let mut inner = self.inner.lock().unwrap();
            inner.subscribers.drain().map(|(_, q)| q).collect()
        };
        for queue in queues {
            queue.close(end);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().unwrap().ring.len()
    }

    pub fn total_published(&self) -> u64 {
        self.total_published.load(Ordering::Relaxed)
    }

    /// Messages still waiting in attached queues, for shutdown draining.
    pub fn pending_messages(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.subscribers.values().map(|q| q.len()).sum()
    }
}

/// Validates a topic name: `[A-Za-z0-9][A-Za-z0-9-]*`, length 1..=128.
pub fn valid_topic_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 128 {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}
