use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::handle::{Outbound, SessionHandle};
use crate::transport::frame::ServerFrame;

#[tokio::test]
async fn test_handle_new_assigns_id() {
    let (tx, _rx) = mpsc::channel(4);
    let handle = SessionHandle::new(tx, CancellationToken::new());
    assert!(!handle.id.is_empty());
}

#[tokio::test]
async fn test_try_send_frame() {
    let (tx, mut rx) = mpsc::channel(4);
    let handle = SessionHandle::new(tx, CancellationToken::new());
    assert!(handle.try_send_frame(ServerFrame::info("hello", None)));
    match rx.recv().await {
        Some(Outbound::Frame(ServerFrame::Info { msg, .. })) => assert_eq!(msg, "hello"),
        other => panic!("expected info frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_close_queues_command() {
    let (tx, mut rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let handle = SessionHandle::new(tx, cancel.clone());
    handle.close(1001, "going away");
    match rx.recv().await {
        Some(Outbound::Close { code, reason }) => {
            assert_eq!(code, 1001);
            assert_eq!(reason, "going away");
        }
        other => panic!("expected close command, got {other:?}"),
    }
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn test_close_cancels_when_channel_full() {
    let (tx, _rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let handle = SessionHandle::new(tx, cancel.clone());
    assert!(handle.try_send_frame(ServerFrame::info("fill", None)));
    handle.close(1001, "going away");
    assert!(cancel.is_cancelled());
}
