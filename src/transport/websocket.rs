use std::sync::Arc;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth;
use crate::broker::Broker;
use crate::config::Settings;
use crate::session::SessionHandle;
use crate::transport::frame::CLOSE_AUTH_FAILURE;
use crate::transport::protocol::{outbound_pump, Session, OUTBOUND_BUFFER};

/// Accept loop for the WebSocket endpoint. Each connection gets its own
/// task; the session registers with the broker once admitted.
pub async fn start_websocket_server(addr: String, broker: Arc<Broker>, settings: Settings) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind websocket listener on {addr}: {e}");
            return;
        }
    };
    info!("websocket server listening on ws://{addr}/ws");

    while let Ok((stream, peer)) = listener.accept().await {
        debug!(%peer, "incoming connection");
        let broker = broker.clone();
        let settings = settings.clone();
        tokio::spawn(async move {
            handle_connection(stream, broker, settings).await;
        });
    }
}

async fn handle_connection(stream: TcpStream, broker: Arc<Broker>, settings: Settings) {
    let mut api_key: Option<String> = None;
    let callback = |req: &Request, response: Response| {
        let path = req.uri().path();
        if path != "/ws" && path != "/ws/" {
            let resp = tokio_tungstenite::tungstenite::http::Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(None)
                .expect("static response");
            return Err::<Response, ErrorResponse>(resp);
        }
        api_key = req
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .or_else(|| {
                req.uri()
                    .query()
                    .and_then(|q| auth::query_param(q, "api_key"))
            });
        Ok(response)
    };

    let mut ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("websocket handshake failed: {e}");
            return;
        }
    };

    if !auth::key_allowed(&settings.broker.api_keys, api_key.as_deref()) {
        warn!("connection rejected: invalid or missing api key");
        let frame = CloseFrame {
            code: CloseCode::from(CLOSE_AUTH_FAILURE),
            reason: "invalid or missing api key".into(),
        };
        let _ = ws.close(Some(frame)).await;
        return;
    }

    let (sink, reader) = ws.split();
    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
    let cancel = CancellationToken::new();
    let handle = SessionHandle::new(tx.clone(), cancel.clone());
    let session_id = handle.id.clone();
    broker.register_session(handle);
    info!(%session_id, "session connected");

    let pump = tokio::spawn(outbound_pump(sink, rx, cancel.clone()));
    let session = Session::new(session_id.clone(), broker, tx, cancel);
    session.run(reader).await;
    session.close().await;
    drop(session);
    let _ = pump.await;
    info!(%session_id, "session disconnected");
}
