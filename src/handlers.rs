// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the bookswap server.
//!
//! Public endpoints run behind the address guard, member endpoints behind
//! the username guard (see `router`). `/check` exposes the guard to a
//! trusted proxy holding the shared check token.

use crate::auth::{self, Account, Role, Sessions};
use crate::clock::Clock;
use crate::config::Config;
use crate::connection::TargetType;
use crate::error::{AppError, Result};
use crate::guard::{ConnectionGuard, Decision};
use crate::metrics::Metrics;
use crate::middleware::{CurrentUser, SESSION_COOKIE};
use crate::store::{AccountStore, ConnectionStore};
use crate::validator::{validate_target, ProfileEdit, Registration};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    pub guard: ConnectionGuard,
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Sessions,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    /// Wire the guard, sessions and metrics over the given stores.
    pub fn new(
        config: Config,
        connections: Arc<dyn ConnectionStore>,
        accounts: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let metrics = Metrics::new().map_err(|e| AppError::Internal(e.to_string()))?;
        let sessions = Sessions::new(&config.auth)?;
        let guard = ConnectionGuard::new(config.guard.clone(), connections, clock)
            .with_metrics(metrics.clone());

        Ok(Self {
            guard,
            accounts,
            sessions,
            metrics,
            config,
        })
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Guard check request (for an external proxy).
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub target: String,
    pub target_type: TargetType,
}

/// Guard check response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub decision: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banned_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileEditRequest {
    pub display_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub create_time: DateTime<Utc>,
}

impl From<&Account> for ProfileResponse {
    fn from(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            email: account.email.clone(),
            phone: account.phone.clone(),
            role: account.role,
            create_time: account.created_at,
        }
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "bookswap-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response> {
    let (content_type, body) = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(format!("Failed to encode metrics: {e}")))?;
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

/// Run the guard for an identity supplied by an upstream proxy.
///
/// Decisions are always returned with 200 so the proxy can read the body;
/// storage failures surface as 503.
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>> {
    debug!(identity = %req.target, target_type = %req.target_type, "Processing guard check");
    validate_target(&req.target)?;

    let decision = state.guard.check(&req.target, req.target_type).await?;
    let response = match decision {
        Decision::Allowed { remaining } => CheckResponse {
            allowed: true,
            decision: decision.label(),
            reason: None,
            retry_after_secs: None,
            remaining: Some(remaining),
            banned_until: None,
        },
        Decision::Throttled { until } | Decision::Banned { until } => {
            let retry_after = decision.retry_after(state.guard.now()).map(|d| d.as_secs());
            info!(
                identity = %req.target,
                decision = decision.label(),
                retry_after_secs = ?retry_after,
                "Guard check rejected"
            );
            CheckResponse {
                allowed: false,
                decision: decision.label(),
                reason: Some(decision.to_string()),
                retry_after_secs: retry_after,
                remaining: None,
                banned_until: Some(until),
            }
        }
    };
    Ok(Json(response))
}

/// Create an account.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let form = Registration {
        username: &req.username,
        password: &req.password,
        display_name: &req.display_name,
        email: &req.email,
        phone: &req.phone,
    };

    match auth::register(state.accounts.as_ref(), &form, state.guard.now()).await {
        Ok(_) => Ok((
            StatusCode::CREATED,
            Json(MessageResponse { message: "Success." }),
        )),
        Err(err) => {
            warn!(username = %req.username, error = %err, "Registration rejected");
            Err(err.into())
        }
    }
}

/// Log in and set the session cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response> {
    let account = match auth::login(state.accounts.as_ref(), &req.username, &req.password).await {
        Ok(account) => account,
        Err(err) => {
            warn!(username = %req.username, error = %err, "Login rejected");
            return Err(err.into());
        }
    };

    let token = state.sessions.issue(&account.username, state.guard.now())?;
    let cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=Lax",
        state.sessions.lifetime().num_seconds()
    );
    info!(username = %account.username, display_name = %account.display_name, "Logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            message: "Success.",
            token,
        }),
    )
        .into_response())
}

/// Clear the session cookie.
pub async fn logout() -> Response {
    let cookie = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=Lax");
    (
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse { message: "Goodbye!" }),
    )
        .into_response()
}

/// Profile of the logged-in member.
pub async fn member_info(Extension(CurrentUser(account)): Extension<CurrentUser>) -> Json<ProfileResponse> {
    Json(ProfileResponse::from(&account))
}

/// Edit display name, email and phone of the logged-in member.
pub async fn update_member_info(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
    Json(req): Json<ProfileEditRequest>,
) -> Result<Json<MessageResponse>> {
    let edit = ProfileEdit {
        display_name: &req.display_name,
        email: &req.email,
        phone: &req.phone,
    };

    match auth::update_profile(state.accounts.as_ref(), &account, &edit).await {
        Ok(_) => Ok(Json(MessageResponse { message: "Success." })),
        Err(err) => {
            warn!(username = %account.username, error = %err, "Profile edit rejected");
            Err(err.into())
        }
    }
}

/// Change the password of the logged-in member.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(account)): Extension<CurrentUser>,
    Json(req): Json<PasswordChangeRequest>,
) -> Result<Json<MessageResponse>> {
    auth::change_password(
        state.accounts.as_ref(),
        &account,
        &req.old_password,
        &req.new_password,
    )
    .await?;
    Ok(Json(MessageResponse { message: "Success." }))
}
