// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Route table.

use crate::handlers::{
    change_password, check, health, login, logout, member_info, metrics, register,
    update_member_info, AppState,
};
use crate::middleware::{guard_by_address, guard_by_username, require_check_token};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the application router.
///
/// The caller must serve it with `ConnectInfo<SocketAddr>` available, since
/// the public routes key the guard on the client address. `/check` is only
/// mounted when a check token is configured.
pub fn app(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/session", get(logout).post(login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard_by_address,
        ));

    let member = Router::new()
        .route("/member/info", get(member_info).patch(update_member_info))
        .route("/member/password", patch(change_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard_by_username,
        ));

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .merge(public)
        .merge(member);

    if state.config.check_token.is_some() {
        router = router.merge(
            Router::new()
                .route("/check", post(check))
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    require_check_token,
                )),
        );
    } else {
        info!("CHECK_TOKEN unset, /check not mounted");
    }

    let cors = cors_layer(&state.config.cors_origins);

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
