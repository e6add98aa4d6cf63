use super::{key_allowed, query_param};

#[test]
fn test_query_param_found() {
    assert_eq!(
        query_param("api_key=secret&foo=bar", "api_key"),
        Some("secret".to_string())
    );
    assert_eq!(
        query_param("foo=bar&api_key=secret", "api_key"),
        Some("secret".to_string())
    );
}

#[test]
fn test_query_param_missing_or_empty() {
    assert_eq!(query_param("foo=bar", "api_key"), None);
    assert_eq!(query_param("api_key=", "api_key"), None);
    assert_eq!(query_param("", "api_key"), None);
    assert_eq!(query_param("api_key", "api_key"), None);
}

#[test]
fn test_key_allowed() {
    let keys = vec!["demo-key".to_string(), "test-123".to_string()];
    assert!(key_allowed(&keys, Some("demo-key")));
    assert!(!key_allowed(&keys, Some("wrong")));
    assert!(!key_allowed(&keys, None));
    assert!(!key_allowed(&[], Some("demo-key")));
}
