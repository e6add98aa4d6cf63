//! The `config` module handles the application's configuration.
//!
//! It defines the structure of the settings, provides default values, and
//! implements loading from a configuration file and environment variables
//! using the `config` crate, merged field-by-field over the defaults.

pub mod settings;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{BrokerSettings, ServerSettings, Settings};

/// Loads application settings from file, environment, and defaults.
///
/// Configuration values are read from:
/// 1. An optional `config/default` file (TOML/YAML/JSON).
/// 2. Environment variables with `_` separators (e.g. `SERVER_HOST`).
///
/// Missing fields are filled using the values from `Settings::default()`.
///
/// # Errors
///
/// Returns an error if the config file cannot be parsed or deserialized.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("_"));

    let config = builder.build()?;

    // Deserialize what is available, then merge with defaults.
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    Ok(Settings {
        server: ServerSettings {
            host: partial
                .server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            http_port: partial
                .server
                .as_ref()
                .and_then(|s| s.http_port)
                .unwrap_or(default.server.http_port),
            ws_port: partial
                .server
                .as_ref()
                .and_then(|s| s.ws_port)
                .unwrap_or(default.server.ws_port),
        },
        broker: BrokerSettings {
            api_keys: partial
                .broker
                .as_ref()
                .and_then(|b| b.api_keys.clone())
                .unwrap_or(default.broker.api_keys),
            subscriber_queue_size: partial
                .broker
                .as_ref()
                .and_then(|b| b.subscriber_queue_size)
                .unwrap_or(default.broker.subscriber_queue_size),
            default_ring_buffer_size: partial
                .broker
                .as_ref()
                .and_then(|b| b.default_ring_buffer_size)
                .unwrap_or(default.broker.default_ring_buffer_size),
            max_ring_buffer_size: partial
                .broker
                .as_ref()
                .and_then(|b| b.max_ring_buffer_size)
                .unwrap_or(default.broker.max_ring_buffer_size),
            slow_consumer_threshold: partial
                .broker
                .as_ref()
                .and_then(|b| b.slow_consumer_threshold)
                .unwrap_or(default.broker.slow_consumer_threshold),
            shutdown_timeout_seconds: partial
                .broker
                .as_ref()
                .and_then(|b| b.shutdown_timeout_seconds)
                .unwrap_or(default.broker.shutdown_timeout_seconds),
        },
    })
}

#[cfg(test)]
mod tests;
