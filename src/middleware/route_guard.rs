use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{middleware::auth::AuthUser, AppState};

/// Pages reachable without a session. "/" only matches exactly, the rest are prefixes.
pub const PUBLIC_ROUTES: &[&str] = &["/", "/auth/new-verification", "/portal"];

/// Pages that make no sense for a signed-in user.
pub const AUTH_ROUTES: &[&str] = &[
    "/auth/login",
    "/auth/register",
    "/auth/error",
    "/auth/reset",
    "/auth/new-password",
];

pub const API_PREFIX: &str = "/api";
pub const API_AUTH_PREFIX: &str = "/api/auth";
pub const PUBLIC_UPLOADS_PREFIX: &str = "/uploads/public";
pub const LOGIN_PAGE: &str = "/auth/login";
pub const DEFAULT_LOGIN_REDIRECT: &str = "/panel/jobs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    Redirect(&'static str),
}

fn has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn is_public_route(path: &str) -> bool {
    PUBLIC_ROUTES.iter().any(|route| {
        if *route == "/" {
            path == "/"
        } else {
            has_prefix(path, route)
        }
    })
}

pub fn is_auth_route(path: &str) -> bool {
    AUTH_ROUTES.contains(&path)
}

pub fn decide(path: &str, logged_in: bool) -> GuardDecision {
    // The JSON API authenticates per handler.
    if has_prefix(path, API_AUTH_PREFIX)
        || has_prefix(path, API_PREFIX)
        || has_prefix(path, PUBLIC_UPLOADS_PREFIX)
        || path == "/health"
    {
        return GuardDecision::Pass;
    }

    if is_auth_route(path) {
        return if logged_in {
            GuardDecision::Redirect(DEFAULT_LOGIN_REDIRECT)
        } else {
            GuardDecision::Pass
        };
    }

    if !logged_in && !is_public_route(path) {
        return GuardDecision::Redirect(LOGIN_PAGE);
    }

    GuardDecision::Pass
}

pub async fn route_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let logged_in = AuthUser::from_headers(req.headers(), &state.config.jwt_secret).is_ok();

    match decide(&path, logged_in) {
        GuardDecision::Pass => next.run(req).await,
        GuardDecision::Redirect(target) => {
            tracing::debug!(%path, target, logged_in, "route guard redirect");
            Redirect::to(target).into_response()
        }
    }
}
