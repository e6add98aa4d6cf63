//! The `transport` module is responsible for handling network
//! communication with clients over WebSockets.
//!
//! It defines the JSON frame protocol spoken between clients and the
//! server, implements the WebSocket listener with credential admission,
//! and runs the per-connection session machine that dispatches frames to
//! the broker and fans events back out.

pub mod frame;
pub mod protocol;
pub mod websocket;

#[cfg(test)]
mod tests;

#[cfg(test)]
mod websocket_tests;
