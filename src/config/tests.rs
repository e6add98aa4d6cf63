use super::settings::Settings;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.http_port, 8080);
    assert_eq!(settings.server.ws_port, 8081);
    assert_eq!(
        settings.broker.api_keys,
        vec!["plivo-test-key", "demo-key", "test-123"]
    );
    assert_eq!(settings.broker.subscriber_queue_size, 50);
    assert_eq!(settings.broker.default_ring_buffer_size, 100);
    assert_eq!(settings.broker.max_ring_buffer_size, 10_000);
    assert_eq!(settings.broker.slow_consumer_threshold, 3);
    assert_eq!(settings.broker.shutdown_timeout_seconds, 30);
}
