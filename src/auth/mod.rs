//! Credential admission shared by the WebSocket and REST surfaces.
//!
//! Clients present an API key either in the `X-API-Key` header or as the
//! `api_key` query parameter; admission is membership in the configured
//! allow-list. There are no scopes or roles, just the boolean predicate.

/// Extracts a query parameter value from a raw query string.
pub fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// True when a key was presented and is in the allow-list.
pub fn key_allowed(allowed: &[String], presented: Option<&str>) -> bool {
    match presented {
        Some(key) => allowed.iter().any(|k| k == key),
        None => false,
    }
}

#[cfg(test)]
mod tests;
