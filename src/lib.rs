//! # fanhub
//!
//! `fanhub` is an in-memory publish/subscribe broker. Clients connect over
//! a persistent WebSocket, publish JSON messages to named topics and
//! subscribe with optional history replay; a REST surface manages topics
//! and lifecycle. Delivery is fan-out with per-subscriber bounded queues:
//! a slow consumer loses its oldest pending messages and is eventually
//! evicted, never stalling the publisher or its peers.
//!
//! ## Core Modules
//!
//! - `broker`: the state engine: topics, history rings, subscriber
//!   queues, fan-out routing and global stats.
//! - `session`: the broker-side handle for one live connection.
//! - `transport`: the WebSocket listener, the frame protocol and the
//!   per-connection session machine.
//! - `lifecycle`: graceful-shutdown coordination with a bounded drain.
//! - `api`: the axum REST control surface.
//! - `auth`: API-key admission shared by both surfaces.
//! - `config`: layered configuration loading.

pub mod api;
pub mod auth;
pub mod broker;
pub mod config;
pub mod lifecycle;
pub mod session;
pub mod transport;
