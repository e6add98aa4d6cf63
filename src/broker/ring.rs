use std::collections::VecDeque;
use std::sync::Arc;

use crate::broker::message::Message;

/// Fixed-capacity FIFO of the most recent messages on a topic.
///
/// Appends are monotone in publish order; once the buffer is full the
/// oldest message is overwritten. `tail(n)` reads the last `min(n, size)`
/// messages in publish order for subscribe-time replay.
#[derive(Debug)]
pub struct RingBuffer {
    items: VecDeque<Arc<Message>>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, message: Arc<Message>) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(message);
    }

    /// Last `min(n, size)` messages in publish order.
    pub fn tail(&self, n: usize) -> Vec<Arc<Message>> {
        let keep = n.min(self.items.len());
        self.items
            .iter()
            .skip(self.items.len() - keep)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
