// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Guard middleware.
//!
//! `guard_by_address` keys the connection guard on the client address;
//! `guard_by_username` first resolves the session user and keys on the
//! username. Both reject with 429 when the guard refuses and with 503 when
//! the guard cannot reach storage.
//!
//! `require_check_token` admits only callers presenting the shared check
//! token, so anonymous clients cannot drive the guard for other identities.

use crate::auth::{Account, AuthError};
use crate::connection::TargetType;
use crate::error::AppError;
use crate::handlers::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "jwt";

/// Header carrying the shared token for `POST /check`.
pub const CHECK_TOKEN_HEADER: &str = "x-check-token";

const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Account resolved from the session token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Account);

/// Guard keyed on the client network address.
pub async fn guard_by_address(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let address = client_address(
        request.headers(),
        peer,
        state.config.guard.trust_forwarded_for,
    );
    let remaining = enforce(&state, &address.to_string(), TargetType::Address).await?;
    Ok(with_remaining(next.run(request).await, remaining))
}

/// Guard keyed on the authenticated username.
pub async fn guard_by_username(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers()).ok_or(AuthError::MissingToken)?;
    let username = state.sessions.verify(&token)?;
    let account = state
        .accounts
        .find_account(&username)
        .await?
        .ok_or(AuthError::UnknownUser)?;

    let remaining = enforce(&state, &account.username, TargetType::Username).await?;
    request.extensions_mut().insert(CurrentUser(account));
    Ok(with_remaining(next.run(request).await, remaining))
}

/// Reject requests that do not carry the configured check token.
pub async fn require_check_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.check_token.as_deref() else {
        return Err(AppError::Forbidden("check endpoint disabled"));
    };
    let provided = request
        .headers()
        .get(CHECK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !token_matches(provided, expected) {
        warn!(path = %request.uri().path(), "Rejected check call without valid token");
        return Err(AppError::Forbidden("check token missing or invalid"));
    }
    Ok(next.run(request).await)
}

fn token_matches(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

/// Run the guard; `Ok` carries the remaining allowance.
async fn enforce(state: &AppState, target: &str, target_type: TargetType) -> Result<u32, AppError> {
    let decision = state.guard.check(target, target_type).await?;
    if let crate::guard::Decision::Allowed { remaining } = decision {
        return Ok(remaining);
    }

    let retry_after_secs = decision
        .retry_after(state.guard.now())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    info!(
        identity = %target,
        %target_type,
        decision = decision.label(),
        retry_after_secs,
        "Request rejected by guard"
    );
    Err(AppError::RateLimited {
        decision,
        retry_after_secs,
    })
}

fn with_remaining(mut response: Response, remaining: u32) -> Response {
    response
        .headers_mut()
        .insert(REMAINING_HEADER, HeaderValue::from(remaining));
    response
}

/// Address the request is attributed to.
///
/// With `trust_forwarded_for`, the right-most `X-Forwarded-For` hop (the one
/// appended by our own proxy) wins when it parses as an IP address.
pub fn client_address(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for {
        let forwarded = headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .last()
            .and_then(|hop| hop.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    peer.ip()
}

/// Session token from `Authorization: Bearer` or the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "192.0.2.10:40000".parse().unwrap()
    }

    #[test]
    fn test_peer_address_without_trust() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(
            client_address(&headers, peer(), false),
            "192.0.2.10".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_rightmost_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.9.9.9, 203.0.113.7"),
        );
        assert_eq!(
            client_address(&headers, peer(), true),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_garbage_forwarded_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        assert_eq!(client_address(&headers, peer(), true), peer().ip());
    }

    #[test]
    fn test_session_token_sources() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; jwt=abc.def.ghi"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));

        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cre", "s3cret"));
        assert!(!token_matches("", "s3cret"));
        assert!(!token_matches("", ""));
    }

    #[test]
    fn test_cleared_cookie_is_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt="));
        assert_eq!(session_token(&headers), None);
    }
}
