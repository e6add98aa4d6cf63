use serde::Deserialize;

/// Top-level configuration for the server.
///
/// Aggregates the network settings for the two listeners and the
/// operational parameters of the broker. Everything is read once at
/// startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Bind addresses for the WebSocket and HTTP listeners.
    pub server: ServerSettings,
    /// Broker tunables: admission keys, queue and ring sizes, thresholds.
    pub broker: BrokerSettings,
}

/// Network settings for the two listeners.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// The host address (e.g. "127.0.0.1" or "0.0.0.0") both listeners
    /// bind to.
    pub host: String,
    /// Port for the REST control surface.
    pub http_port: u16,
    /// Port for the WebSocket endpoint.
    pub ws_port: u16,
}

/// Operational parameters of the broker.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    /// Credentials admitted at the WebSocket and REST boundaries.
    pub api_keys: Vec<String>,
    /// Capacity of each per-subscription delivery queue.
    pub subscriber_queue_size: usize,
    /// Ring buffer size applied when topic creation omits one.
    pub default_ring_buffer_size: usize,
    /// Upper bound on any topic's ring buffer size.
    pub max_ring_buffer_size: usize,
    /// Consecutive drops after which a subscriber is evicted.
    pub slow_consumer_threshold: u32,
    /// Wall-clock budget for draining queues during graceful shutdown.
    pub shutdown_timeout_seconds: u64,
}

/// Partial configuration loaded from files or environment.
///
/// Allows partial specification of settings; missing values are filled
/// from defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
}

/// Partial server settings.
#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub http_port: Option<u16>,
    pub ws_port: Option<u16>,
}

/// Partial broker settings.
#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub api_keys: Option<Vec<String>>,
    pub subscriber_queue_size: Option<usize>,
    pub default_ring_buffer_size: Option<usize>,
    pub max_ring_buffer_size: Option<usize>,
    pub slow_consumer_threshold: Option<u32>,
    pub shutdown_timeout_seconds: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                http_port: 8080,
                ws_port: 8081,
            },
            broker: BrokerSettings::default(),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            api_keys: vec![
                "plivo-test-key".to_string(),
                "demo-key".to_string(),
                "test-123".to_string(),
            ],
            subscriber_queue_size: 50,
            default_ring_buffer_size: 100,
            max_ring_buffer_size: 10_000,
            slow_consumer_threshold: 3,
            shutdown_timeout_seconds: 30,
        }
    }
}
