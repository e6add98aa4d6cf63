use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::broker::error::BrokerError;
use crate::broker::message::{is_canonical_uuid, Message};
use crate::broker::queue::{QueueEnd, SubscriberQueue};
use crate::broker::topic::{valid_topic_name, Topic};
use crate::config::BrokerSettings;
use crate::session::SessionHandle;
use crate::transport::frame::ServerFrame;

/// Per-topic counters returned by `list_topics`.
#[derive(Debug, Serialize)]
pub struct TopicSummary {
    pub name: String,
    pub subscribers: usize,
    pub ring_buffer_size: usize,
    pub messages_in_history: usize,
    pub total_messages: u64,
}

/// Aggregate counters returned by `stats`.
#[derive(Debug, Serialize)]
pub struct StatsSnapshot {
    pub published_total: u64,
    pub delivered_total: u64,
    pub dropped_total: u64,
    pub active_subscribers: usize,
    pub active_sessions: usize,
    pub shutting_down: bool,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Process-wide registry of topics and live sessions.
///
/// One coarse lock guards the topic map (create/delete/lookup), another the
/// session map; each `Topic` carries its own lock. Lock order is always
/// broker then topic, and fan-out runs outside both. Counters are plain
/// atomics.
pub struct Broker {
    settings: BrokerSettings,
    topics: Mutex<HashMap<String, Arc<Topic>>>,
    sessions: Mutex<HashMap<String, SessionHandle>>,
    shutting_down: AtomicBool,
    counters: Counters,
    started_at: Instant,
}

impl Broker {
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            settings,
            topics: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
            counters: Counters::default(),
            started_at: Instant::now(),
        }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    /// Creates a topic, returning the resolved ring size.
    ///
    /// `ring_size` defaults to the configured ring buffer size; explicit
    /// values outside `[1, max_ring_buffer_size]` are rejected.
    pub fn create_topic(&self, name: &str, ring_size: Option<usize>) -> Result<usize, BrokerError> {
        if self.is_shutting_down() {
            return Err(BrokerError::ShuttingDown);
        }
        if !valid_topic_name(name) {
            return Err(BrokerError::BadRequest(format!(
                "invalid topic name '{name}': must match [A-Za-z0-9][A-Za-z0-9-]* and be at most 128 characters"
            )));
        }
        let size = match ring_size {
            None => self.settings.default_ring_buffer_size,
            Some(n) if (1..=self.settings.max_ring_buffer_size).contains(&n) => n,
            Some(n) => {
                return Err(BrokerError::BadRequest(format!(
                    "ring_size {n} out of range 1..={}",
                    self.settings.max_ring_buffer_size
                )))
            }
        };

        let mut topics = self.topics.lock().unwrap();
        if topics.contains_key(name) {
            return Err(BrokerError::TopicExists(name.to_string()));
        }
        topics.insert(name.to_string(), Arc::new(Topic::new(name, size)));
        info!(topic = name, ring_size = size, "created topic");
        Ok(size)
    }

    /// Removes a topic; every attached queue is ended with `TopicDeleted`
    /// so the subscription writers can notify their sessions and unblock.
    pub fn delete_topic(&self, name: &str) -> Result<(), BrokerError> {
        if self.is_shutting_down() {
            return Err(BrokerError::ShuttingDown);
        }
        let topic = self
            .topics
            .lock()
            .unwrap()
            .remove(name)
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))?;

        let subscribers = topic.subscriber_count();
        topic.close_all(QueueEnd::TopicDeleted);
        info!(topic = name, subscribers, "deleted topic");
        Ok(())
    }

    /// Validates and publishes a message, returning the stamped copy.
    pub fn publish(&self, topic: &str, id: &str, payload: Value) -> Result<Arc<Message>, BrokerError> {
        if self.is_shutting_down() {
            return Err(BrokerError::ShuttingDown);
        }
        if !is_canonical_uuid(id) {
            return Err(BrokerError::BadRequest(
                "message.id must be a UUID in canonical lowercase hyphenated form".to_string(),
            ));
        }
        let topic = self
            .lookup(topic)
            .ok_or_else(|| BrokerError::TopicNotFound(topic.to_string()))?;

        let message = Arc::new(Message::new(id, payload));
        let outcome = topic.publish(message.clone());
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        self.counters
            .delivered
            .fetch_add(outcome.enqueued, Ordering::Relaxed);
        self.counters
            .dropped
            .fetch_add(outcome.dropped, Ordering::Relaxed);
        debug!(
            topic = topic.name(),
            id = %message.id,
            enqueued = outcome.enqueued,
            dropped = outcome.dropped,
            "published message"
        );
        Ok(message)
    }

    /// Attaches a fresh queue for `(session, topic)` and returns it with
    /// the replay batch for `last_n`.
    pub fn subscribe(
        &self,
        session_id: &str,
        topic: &str,
        client_id: &str,
        last_n: usize,
    ) -> Result<(Arc<SubscriberQueue>, Vec<Arc<Message>>), BrokerError> {
        if self.is_shutting_down() {
            return Err(BrokerError::ShuttingDown);
        }
        let topic = self
            .lookup(topic)
            .ok_or_else(|| BrokerError::TopicNotFound(topic.to_string()))?;

        let queue = Arc::new(SubscriberQueue::new(
            client_id,
            topic.name(),
            self.settings.subscriber_queue_size,
            self.settings.slow_consumer_threshold,
        ));
        let replay = topic.attach(session_id, queue.clone(), last_n);
        info!(
            topic = topic.name(),
            client_id,
            session_id,
            replay = replay.len(),
            "subscribed"
        );
        Ok((queue, replay))
    }

    /// Detaches the session's queue from the topic and ends it. Idempotent
    /// on the topic side: unsubscribing without a subscription is ok.
    pub fn unsubscribe(&self, topic: &str, session_id: &str) -> Result<(), BrokerError> {
        let topic = self
            .lookup(topic)
            .ok_or_else(|| BrokerError::TopicNotFound(topic.to_string()))?;
        if let Some(queue) = topic.detach(session_id) {
            queue.close(QueueEnd::Detached);
            info!(topic = topic.name(), session_id, "unsubscribed");
        }
        Ok(())
    }

    pub fn list_topics(&self) -> Vec<TopicSummary> {
        let topics: Vec<Arc<Topic>> = self.topics.lock().unwrap().values().cloned().collect();
        topics
            .iter()
            .map(|t| TopicSummary {
                name: t.name().to_string(),
                subscribers: t.subscriber_count(),
                ring_buffer_size: t.ring_size(),
                messages_in_history: t.history_len(),
                total_messages: t.total_published(),
            })
            .collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        let topics: Vec<Arc<Topic>> = self.topics.lock().unwrap().values().cloned().collect();
        StatsSnapshot {
            published_total: self.counters.published.load(Ordering::Relaxed),
            delivered_total: self.counters.delivered.load(Ordering::Relaxed),
            dropped_total: self.counters.dropped.load(Ordering::Relaxed),
            active_subscribers: topics.iter().map(|t| t.subscriber_count()).sum(),
            active_sessions: self.session_count(),
            shutting_down: self.is_shutting_down(),
        }
    }

    pub fn topic_count(&self) -> usize {
        self.topics.lock().unwrap().len()
    }

    /// Flips the shutdown flag. Returns false when already set.
    pub fn begin_shutdown(&self) -> bool {
        self.shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Messages still waiting in subscriber queues across all topics.
    pub fn pending_deliveries(&self) -> usize {
        let topics: Vec<Arc<Topic>> = self.topics.lock().unwrap().values().cloned().collect();
        topics.iter().map(|t| t.pending_messages()).sum()
    }

    /// Drops every topic, ending any queues still attached.
    pub fn teardown(&self) {
        let topics: Vec<Arc<Topic>> = {
            let mut map = self.topics.lock().unwrap();
            map.drain().map(|(_, t)| t).collect()
        };
        for topic in &topics {
            topic.close_all(QueueEnd::Shutdown);
        }
        info!(topics = topics.len(), "released topic storage");
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Registers a connected session so lifecycle events can reach it.
    pub fn register_session(&self, handle: SessionHandle) {
        self.sessions
            .lock()
            .unwrap()
            .insert(handle.id.clone(), handle);
    }

    /// Removes the session's handle and detaches any queues it still holds
    /// across all topics. Safe to call more than once.
    pub fn cleanup_session(&self, session_id: &str) {
        self.sessions.lock().unwrap().remove(session_id);
        let topics: Vec<Arc<Topic>> = self.topics.lock().unwrap().values().cloned().collect();
        for topic in topics {
            if let Some(queue) = topic.detach(session_id) {
                queue.close(QueueEnd::Detached);
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Best-effort `info` frame to every live session. A full outbound
    /// channel or dead transport is logged and skipped.
    pub fn broadcast_info(&self, msg: &str) {
        let handles: Vec<SessionHandle> = self.sessions.lock().unwrap().values().cloned().collect();
        for handle in handles {
            if !handle.try_send_frame(ServerFrame::info(msg, None)) {
                warn!(session_id = %handle.id, "failed to notify session");
            }
        }
    }

    /// Asks every live session to close with the given transport code.
    pub fn close_all_sessions(&self, code: u16, reason: &str) {
        let handles: Vec<SessionHandle> = self.sessions.lock().unwrap().values().cloned().collect();
        info!(sessions = handles.len(), code, "closing all sessions");
        for handle in handles {
            handle.close(code, reason);
        }
    }

    fn lookup(&self, name: &str) -> Option<Arc<Topic>> {
        self.topics.lock().unwrap().get(name).cloned()
    }
}
