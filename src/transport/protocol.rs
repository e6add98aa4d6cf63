use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::queue::{QueueEnd, SubscriberQueue};
use crate::broker::topic::valid_topic_name;
use crate::broker::Broker;
use crate::session::Outbound;
use crate::transport::frame::{
    ClientFrame, ErrorCode, ServerFrame, CLOSE_POLICY_VIOLATION,
};

/// Capacity of the per-session outbound channel. Deliberately small: once
/// it and the socket buffers fill, subscription writers stall and overflow
/// lands in the subscriber queues where it is accounted.
pub(crate) const OUTBOUND_BUFFER: usize = 64;

/// Bound on any single transport write, so a dead peer cannot wedge
/// broadcast or shutdown.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Active,
    Draining,
    Closed,
}

struct Subscription {
    client_id: String,
    queue: Arc<SubscriberQueue>,
    writer: JoinHandle<()>,
}

/// Per-connection protocol machine.
///
/// The reader half of the socket feeds `run`; every outbound frame goes
/// through the session's bounded channel to the pump task that owns the
/// writer half. Each subscription gets its own writer task draining its
/// `SubscriberQueue`.
pub struct Session {
    id: String,
    broker: Arc<Broker>,
    outbound: Sender<Outbound>,
    cancel: CancellationToken,
    subscriptions: Arc<Mutex<HashMap<String, Subscription>>>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(
        id: String,
        broker: Arc<Broker>,
        outbound: Sender<Outbound>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            broker,
            outbound,
            cancel,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            state: Mutex::new(SessionState::Active),
        }
    }

    /// Reads frames until the transport ends or the session is cancelled.
    pub async fn run(&self, mut reader: SplitStream<WebSocketStream<TcpStream>>) {
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = reader.next() => next,
            };
            match next {
                Some(Ok(msg)) if msg.is_text() => {
                    let text = match msg.to_text() {
                        Ok(t) => t.to_string(),
                        Err(_) => continue,
                    };
                    self.dispatch(&text).await;
                }
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session_id = %self.id, "transport read error: {e}");
                    break;
                }
                None => break,
            }
        }
    }

    async fn dispatch(&self, text: &str) {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.send(ServerFrame::error(
                    None,
                    ErrorCode::BadRequest,
                    &format!("invalid frame: {e}"),
                ))
                .await;
                return;
            }
        };

        // Once shutdown starts only pings get through; everything else is
        // refused while the writers drain.
        let draining =
            self.broker.is_shutting_down() || self.state() == SessionState::Draining;
        if draining && !matches!(frame, ClientFrame::Ping { .. }) {
            self.set_state(SessionState::Draining);
            let request_id = match frame {
                ClientFrame::Subscribe { request_id, .. }
                | ClientFrame::Unsubscribe { request_id, .. }
                | ClientFrame::Publish { request_id, .. } => request_id,
                ClientFrame::Ping { .. } => unreachable!(),
            };
            self.send(ServerFrame::error(
                request_id,
                ErrorCode::ServiceUnavailable,
                "server is shutting down",
            ))
            .await;
            return;
        }

        match frame {
            ClientFrame::Subscribe {
                topic,
                client_id,
                last_n,
                request_id,
            } => {
                self.handle_subscribe(topic, client_id, last_n, request_id)
                    .await
            }
            ClientFrame::Unsubscribe {
                topic,
                client_id,
                request_id,
            } => self.handle_unsubscribe(topic, client_id, request_id).await,
            ClientFrame::Publish {
                topic,
                message,
                request_id,
            } => {
                match self.broker.publish(&topic, &message.id, message.payload) {
                    Ok(_) => self.send(ServerFrame::ack(request_id, &topic)).await,
                    Err(e) => self.send(ServerFrame::broker_error(request_id, &e)).await,
                }
            }
            ClientFrame::Ping { request_id } => {
                self.send(ServerFrame::pong(request_id)).await;
            }
        }
    }

    async fn handle_subscribe(
        &self,
        topic: String,
        client_id: String,
        last_n: Option<i64>,
        request_id: Option<String>,
    ) {
        if client_id.is_empty() {
            self.send(ServerFrame::error(
                request_id,
                ErrorCode::BadRequest,
                "client_id must not be empty",
            ))
            .await;
            return;
        }
        if !valid_topic_name(&topic) {
            self.send(ServerFrame::error(
                request_id,
                ErrorCode::BadRequest,
                &format!("invalid topic name '{topic}'"),
            ))
            .await;
            return;
        }
        let last_n = match last_n {
            None => 0,
            Some(n) if n < 0 => {
                self.send(ServerFrame::error(
                    request_id,
                    ErrorCode::BadRequest,
                    "last_n must be non-negative",
                ))
                .await;
                return;
            }
            Some(n) => n as usize,
        };
        if self.subscriptions.lock().unwrap().contains_key(&topic) {
            self.send(ServerFrame::error(
                request_id,
                ErrorCode::BadRequest,
                &format!("already subscribed to topic '{topic}'"),
            ))
            .await;
            return;
        }

        let (queue, replay) = match self.broker.subscribe(&self.id, &topic, &client_id, last_n) {
            Ok(attached) => attached,
            Err(e) => {
                self.send(ServerFrame::broker_error(request_id, &e)).await;
                return;
            }
        };

        // Replay frames are queued before the writer starts, so the
        // replay-then-live ordering holds through the single outbound
        // channel.
        self.send(ServerFrame::ack(request_id, &topic)).await;
        for message in &replay {
            self.send(ServerFrame::event(&topic, message)).await;
        }

        let writer = spawn_subscription_writer(
            topic.clone(),
            queue.clone(),
            self.outbound.clone(),
            self.cancel.clone(),
            self.subscriptions.clone(),
        );
        self.subscriptions.lock().unwrap().insert(
            topic,
            Subscription {
                client_id,
                queue,
                writer,
            },
        );
    }

    async fn handle_unsubscribe(
        &self,
        topic: String,
        client_id: String,
        request_id: Option<String>,
    ) {
        if client_id.is_empty() {
            self.send(ServerFrame::error(
                request_id,
                ErrorCode::BadRequest,
                "client_id must not be empty",
            ))
            .await;
            return;
        }
        let entry = self.subscriptions.lock().unwrap().remove(&topic);
        let had_subscription = entry.is_some();
        let result = self.broker.unsubscribe(&topic, &self.id);
        if let Some(sub) = entry {
            // Queue is closed now; the writer exits on its own.
            let _ = sub.writer.await;
        }
        match result {
            Ok(()) => self.send(ServerFrame::ack(request_id, &topic)).await,
            // The topic went away underneath an existing subscription; the
            // session already holds the terminal info frame.
            Err(_) if had_subscription => self.send(ServerFrame::ack(request_id, &topic)).await,
            Err(e) => self.send(ServerFrame::broker_error(request_id, &e)).await,
        }
    }

    /// Detaches every subscription, joins the writers and deregisters the
    /// session.
    pub async fn close(&self) {
        self.set_state(SessionState::Closed);
        let entries: Vec<(String, Subscription)> = {
            let mut subs = self.subscriptions.lock().unwrap();
            subs.drain().collect()
        };
        for (topic, sub) in &entries {
            if self.broker.unsubscribe(topic, &self.id).is_err() {
                debug!(
                    session_id = %self.id,
                    topic = %topic,
                    client_id = %sub.client_id,
                    "topic already gone during session close"
                );
            }
        }
        for (_, sub) in entries {
            sub.queue.close(QueueEnd::Detached);
            let _ = sub.writer.await;
        }
        self.broker.cleanup_session(&self.id);
        info!(session_id = %self.id, "session closed");
    }

    async fn send(&self, frame: ServerFrame) {
        if self.outbound.send(Outbound::Frame(frame)).await.is_err() {
            self.cancel.cancel();
        }
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
    }
}

/// One writer per subscription: drains the queue into the outbound channel
/// until the queue ends, then reacts to the end reason.
fn spawn_subscription_writer(
    topic: String,
    queue: Arc<SubscriberQueue>,
    outbound: Sender<Outbound>,
    cancel: CancellationToken,
    subscriptions: Arc<Mutex<HashMap<String, Subscription>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match queue.take().await {
                Ok(message) => {
                    let frame = ServerFrame::event(&topic, &message);
                    if outbound.send(Outbound::Frame(frame)).await.is_err() {
                        break;
                    }
                }
                Err(QueueEnd::Detached) | Err(QueueEnd::Shutdown) => break,
                Err(QueueEnd::TopicDeleted) => {
                    let _ = outbound.try_send(Outbound::Frame(ServerFrame::info(
                        "topic deleted",
                        Some(topic.clone()),
                    )));
                    subscriptions.lock().unwrap().remove(&topic);
                    break;
                }
                Err(QueueEnd::SlowConsumer) => {
                    warn!(
                        topic = %topic,
                        client_id = queue.client_id(),
                        "evicting slow consumer"
                    );
                    let _ = outbound.try_send(Outbound::Frame(ServerFrame::error(
                        None,
                        ErrorCode::SlowConsumer,
                        "subscriber cannot keep up, disconnecting",
                    )));
                    let close = Outbound::Close {
                        code: CLOSE_POLICY_VIOLATION,
                        reason: "slow consumer".to_string(),
                    };
                    if outbound.try_send(close).is_err() {
                        cancel.cancel();
                    }
                    break;
                }
            }
        }
    })
}

/// Owns the socket's write half: serializes frames from the session's
/// outbound channel onto the wire, and closes the transport on a `Close`
/// command, a write failure, or session cancellation.
pub async fn outbound_pump(
    mut sink: SplitSink<WebSocketStream<TcpStream>, WsMessage>,
    mut rx: Receiver<Outbound>,
    cancel: CancellationToken,
) {
    loop {
        let cmd = tokio::select! {
            _ = cancel.cancelled() => break,
            cmd = rx.recv() => match cmd {
                Some(cmd) => cmd,
                None => break,
            },
        };
        match cmd {
            Outbound::Frame(frame) => {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("failed to serialize frame: {e}");
                        continue;
                    }
                };
                match timeout(SEND_TIMEOUT, sink.send(WsMessage::text(text))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!("transport write failed: {e}");
                        break;
                    }
                    Err(_) => {
                        warn!("transport write timed out");
                        break;
                    }
                }
            }
            Outbound::Close { code, reason } => {
                let frame = CloseFrame {
                    code: CloseCode::from(code),
                    reason: reason.into(),
                };
                let _ = timeout(SEND_TIMEOUT, sink.send(WsMessage::Close(Some(frame)))).await;
                break;
            }
        }
    }
    let _ = sink.close().await;
    // The pump owns the socket; its exit ends the session.
    cancel.cancel();
}
