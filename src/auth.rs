//! Resolution of the GitHub credential used for a request.

use crate::config::AppConfig;
use crate::error::{Result, StatsError};
use crate::types::Credential;
use axum::http::{header, HeaderMap};

/// Picks the bearer credential for an inbound request.
///
/// An `Authorization: Bearer <token>` header wins; otherwise the configured
/// `GITHUB_TOKEN` is used. The token is passed through untouched.
pub fn resolve_credential(headers: &HeaderMap, config: &AppConfig) -> Result<Credential> {
    bearer_token(headers)
        .or_else(|| config.fallback_token())
        .map(Credential::new)
        .ok_or(StatsError::MissingCredential)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
