use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use fanhub::api::{self, AppState};
use fanhub::broker::Broker;
use fanhub::config::load_config;
use fanhub::lifecycle::LifecycleController;
use fanhub::transport::websocket::start_websocket_server;

#[tokio::main]
async fn main() {
    // Initialize the tracing subscriber for logging
    tracing_subscriber::fmt::init();

    // Load configuration with robust error handling
    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return;
        }
    };

    let broker = Arc::new(Broker::new(settings.broker.clone()));
    let lifecycle = LifecycleController::new(
        broker.clone(),
        Duration::from_secs(settings.broker.shutdown_timeout_seconds),
    );
    let state = Arc::new(AppState {
        broker: broker.clone(),
        lifecycle: lifecycle.clone(),
        settings: settings.broker.clone(),
    });

    let ws_addr = format!("{}:{}", settings.server.host, settings.server.ws_port);
    let http_addr = format!("{}:{}", settings.server.host, settings.server.http_port);

    // Run both listeners until one exits or a shutdown signal arrives
    tokio::select! {
        _ = start_websocket_server(ws_addr, broker.clone(), settings.clone()) => {
            error!("WebSocket server exited unexpectedly.");
        }
        res = api::serve(http_addr, state) => {
            if let Err(e) = res {
                error!("HTTP server exited: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    lifecycle.shutdown().await;
}
