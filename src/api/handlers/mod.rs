//! API handlers and shared request/response utilities.
//!
//! Error responses follow a fixed taxonomy: wrong identity or wrong
//! credential always collapses to a bare `401` so callers cannot probe which
//! factor failed, while lifecycle conflicts (expired codes, revoked devices,
//! policy denials) are named JSON errors the client is allowed to see.

pub mod auth;
pub mod devices;
pub mod health;
pub mod pairing;
pub mod recovery;
pub mod root;
pub mod sharing;
pub mod vault;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use regex::Regex;
use serde_json::json;

/// Single-tenant deployments omit the group path segment.
pub(crate) const DEFAULT_GROUP_ID: i64 = 1;

pub(crate) fn group_or_default(group: Option<Path<i64>>) -> i64 {
    group.map_or(DEFAULT_GROUP_ID, |Path(group_id)| group_id)
}

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Conservative `local@domain.tld` shape check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[a-z0-9_.+-]+@[a-z0-9.-]+\.[a-z]{2,}$")
        .is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Generic authentication failure; deliberately carries no detail.
pub(crate) fn unauthorized() -> Response {
    StatusCode::UNAUTHORIZED.into_response()
}

/// Named, distinguishable protocol error.
pub(crate) fn named_error(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

/// Unexpected failure; details are for the logs only.
pub(crate) fn unexpected_failure() -> Response {
    StatusCode::BAD_REQUEST.into_response()
}
