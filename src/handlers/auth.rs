/// Access checks applied before a page is served or a socket is upgraded
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::app_state::AppState;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Secret presented by the client: the `token` query parameter, else an
/// `Authorization: Bearer` header. Blank values count as absent.
pub fn request_token(uri: &Uri, headers: &HeaderMap) -> Option<String> {
    let from_query = Query::<TokenQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(query)| query.token)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());
    if from_query.is_some() {
        return from_query;
    }

    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_at_checked(7)?;
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return None;
    }
    Some(token.trim().to_string()).filter(|token| !token.is_empty())
}

/// Constant-time comparison against the expected secret
pub fn is_authorized(expected: &str, presented: Option<&str>) -> bool {
    match presented {
        Some(presented) => expected.as_bytes().ct_eq(presented.as_bytes()).into(),
        None => false,
    }
}

/// Reject the request with 401 unless it carries the shared secret
pub fn authorize(state: &AppState, uri: &Uri, headers: &HeaderMap) -> Result<(), Response> {
    let presented = request_token(uri, headers);
    if is_authorized(&state.token, presented.as_deref()) {
        Ok(())
    } else {
        warn!("Rejected unauthorized request to {}", uri.path());
        Err((StatusCode::UNAUTHORIZED, "unauthorized").into_response())
    }
}

/// Canonical `scheme://host[:port]` form of an origin, or `None` for anything
/// that is not an http(s) origin.
pub fn normalize_origin(raw: &str) -> Option<String> {
    let origin = raw.trim().to_ascii_lowercase();
    let origin = origin.trim_end_matches('/');
    let (scheme, host) = origin.split_once("://")?;
    if !matches!(scheme, "http" | "https") || host.is_empty() || host.contains('/') {
        return None;
    }
    Some(origin.to_string())
}

/// Whether the request's `Origin` is the host itself or on the allow-list
pub fn is_origin_allowed(headers: &HeaderMap, allowed: &[String]) -> bool {
    let Some(origin) = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .and_then(normalize_origin)
    else {
        debug!("Missing or unusable Origin header");
        return false;
    };

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "http".to_string());
    let same_origin = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .and_then(|host| normalize_origin(&format!("{scheme}://{host}")));
    if same_origin.as_deref() == Some(origin.as_str()) {
        return true;
    }

    allowed
        .iter()
        .filter_map(|entry| normalize_origin(entry))
        .any(|entry| entry == origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn query_token_takes_precedence() {
        let uri: Uri = "/ws?token=from-query".parse().unwrap();
        let map = headers(&[("authorization", "Bearer from-header")]);
        assert_eq!(request_token(&uri, &map).as_deref(), Some("from-query"));
    }

    #[test]
    fn query_token_is_url_decoded() {
        let uri: Uri = "/?token=a%2Bb%20c".parse().unwrap();
        assert_eq!(request_token(&uri, &HeaderMap::new()).as_deref(), Some("a+b c"));
    }

    #[test]
    fn bearer_header_is_used_without_query() {
        let uri: Uri = "/ws".parse().unwrap();
        for value in ["Bearer s3cret", "bearer s3cret", "  BEARER   s3cret  "] {
            let mut map = HeaderMap::new();
            map.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
            assert_eq!(request_token(&uri, &map).as_deref(), Some("s3cret"), "{value}");
        }
    }

    #[test]
    fn blank_or_foreign_credentials_are_absent() {
        let uri: Uri = "/ws?token=%20%20".parse().unwrap();
        assert_eq!(request_token(&uri, &HeaderMap::new()), None);

        let plain: Uri = "/ws".parse().unwrap();
        assert_eq!(request_token(&plain, &headers(&[("authorization", "Basic abc")])), None);
        assert_eq!(request_token(&plain, &headers(&[("authorization", "Bearer ")])), None);
        assert_eq!(request_token(&plain, &headers(&[("authorization", "Bear")])), None);
    }

    #[test]
    fn authorization_compares_whole_secret() {
        assert!(is_authorized("secret", Some("secret")));
        assert!(!is_authorized("secret", Some("secre")));
        assert!(!is_authorized("secret", Some("secret2")));
        assert!(!is_authorized("secret", None));
    }

    #[test]
    fn origins_are_normalized() {
        assert_eq!(normalize_origin(" HTTPS://Example.com/ ").as_deref(), Some("https://example.com"));
        assert_eq!(normalize_origin("http://localhost:8787").as_deref(), Some("http://localhost:8787"));
        assert_eq!(normalize_origin("file://"), None);
        assert_eq!(normalize_origin("ws://example.com"), None);
        assert_eq!(normalize_origin("null"), None);
        assert_eq!(normalize_origin("https://example.com/path"), None);
    }

    #[test]
    fn same_origin_is_allowed() {
        let map = headers(&[("origin", "http://127.0.0.1:8787"), ("host", "127.0.0.1:8787")]);
        assert!(is_origin_allowed(&map, &[]));

        let proxied = headers(&[
            ("origin", "https://term.example.com"),
            ("host", "term.example.com"),
            ("x-forwarded-proto", "https"),
        ]);
        assert!(is_origin_allowed(&proxied, &[]));
    }

    #[test]
    fn foreign_origin_needs_allow_list() {
        let map = headers(&[("origin", "https://app.example.com"), ("host", "127.0.0.1:8787")]);
        assert!(!is_origin_allowed(&map, &[]));
        assert!(is_origin_allowed(&map, &["https://APP.example.com/".to_string()]));
        assert!(!is_origin_allowed(&headers(&[("host", "127.0.0.1:8787")]), &[]));
    }
}
