use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::transport::frame::ServerFrame;

/// A command for a session's outbound pump.
///
/// Every frame a session emits travels through one bounded channel to a
/// single pump task that owns the socket's write half, so frames from the
/// dispatcher and from concurrent subscription writers interleave only at
/// frame boundaries.
#[derive(Debug)]
pub enum Outbound {
    Frame(ServerFrame),
    Close { code: u16, reason: String },
}

/// Broker-side handle for one connected session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: String,
    outbound: Sender<Outbound>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn new(outbound: Sender<Outbound>, cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            outbound,
            cancel,
        }
    }

    /// Non-blocking frame send. Returns false when the channel is full or
    /// the session is gone.
    pub fn try_send_frame(&self, frame: ServerFrame) -> bool {
        self.outbound.try_send(Outbound::Frame(frame)).is_ok()
    }

    /// Requests an orderly transport close. Falls back to hard cancellation
    /// when the close command cannot be queued.
    pub fn close(&self, code: u16, reason: &str) {
        let cmd = Outbound::Close {
            code,
            reason: reason.to_string(),
        };
        if self.outbound.try_send(cmd).is_err() {
            self.cancel.cancel();
        }
    }

    /// Tears the session down without a close frame.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
