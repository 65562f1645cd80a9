use axum::http::HeaderMap;

use super::*;

#[test]
fn validate_bearer_allows_everything_when_auth_disabled() {
    let headers = HeaderMap::new();
    assert!(validate_bearer(&headers, None).is_ok());
}

#[test]
fn validate_bearer_rejects_missing_header() {
    let headers = HeaderMap::new();
    assert!(validate_bearer(&headers, Some("secret")).is_err());
}

#[test]
fn validate_bearer_rejects_wrong_token() {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", "Bearer wrong".parse().unwrap());
    assert!(validate_bearer(&headers, Some("secret")).is_err());
}

#[test]
fn validate_bearer_accepts_matching_token() {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", "Bearer secret".parse().unwrap());
    assert!(validate_bearer(&headers, Some("secret")).is_ok());
}

#[test]
fn validate_ws_query_accepts_matching_token() {
    assert!(validate_ws_query("token=secret", Some("secret")).is_ok());
}

#[test]
fn validate_ws_query_rejects_missing_token() {
    assert!(validate_ws_query("", Some("secret")).is_err());
}

#[test]
fn validate_ws_query_allows_everything_when_auth_disabled() {
    assert!(validate_ws_query("", None).is_ok());
}
