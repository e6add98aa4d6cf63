//! The `session` module defines the broker-side view of one live
//! connection.
//!
//! It provides the `SessionHandle` struct, which pairs a broker-assigned
//! session id with the channel for sending frames to that connection and a
//! cancellation token for forced teardown. The broker registers a handle
//! per connection and uses it for lifecycle broadcasts and shutdown.

pub mod handle;

pub use handle::{Outbound, SessionHandle};

#[cfg(test)]
mod tests;
