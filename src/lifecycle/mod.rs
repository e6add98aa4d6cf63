//! The `lifecycle` module coordinates graceful shutdown.
//!
//! Shutdown stops admission first, tells every session, gives the
//! subscription writers a bounded window to drain their queues, then
//! closes all transports with the going-away code and releases topic
//! storage.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::transport::frame::CLOSE_GOING_AWAY;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs the graceful-shutdown procedure against a broker.
#[derive(Clone)]
pub struct LifecycleController {
    broker: Arc<Broker>,
    budget: Duration,
}

impl LifecycleController {
    pub fn new(broker: Arc<Broker>, budget: Duration) -> Self {
        Self { broker, budget }
    }

    /// Flips the broker into shutdown mode, stopping new admissions.
    /// Returns false when shutdown was already initiated.
    pub fn begin(&self) -> bool {
        self.broker.begin_shutdown()
    }

    /// Drains and closes everything. Invoking it a second time is a no-op;
    /// the first call owns the procedure.
    pub async fn shutdown(&self) {
        if !self.begin() {
            debug!("shutdown already in progress");
            return;
        }
        self.drain_and_close().await;
    }

    /// The drain procedure proper; `begin` must have been called.
    pub async fn drain_and_close(&self) {
        info!(budget = ?self.budget, "graceful shutdown started");
        self.broker.broadcast_info("server shutting down");

        let deadline = Instant::now() + self.budget;
        loop {
            let pending = self.broker.pending_deliveries();
            if pending == 0 {
                break;
            }
            if Instant::now() >= deadline {
                warn!(pending, "shutdown budget expired with messages still queued");
                break;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        self.broker
            .close_all_sessions(CLOSE_GOING_AWAY, "server shutting down");
        self.broker.teardown();
        info!("graceful shutdown complete");
    }
}
