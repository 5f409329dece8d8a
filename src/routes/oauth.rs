use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    middleware::{
        auth::{issue_session_token, session_cookie},
        route_guard::DEFAULT_LOGIN_REDIRECT,
    },
    services::{oauth_service::OAuthProvider, user_service::OAUTH_ACCOUNT_NOT_LINKED},
    utils::{crypto::secrets_match, token::generate_state},
    AppState,
};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const AUTH_ERROR_PAGE: &str = "/auth/error";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Auth error page, carrying the error code the frontend knows how to explain.
fn error_page(err: &Error) -> String {
    match err {
        Error::Conflict(code) if code == OAUTH_ACCOUNT_NOT_LINKED => {
            format!("{}?error={}", AUTH_ERROR_PAGE, OAUTH_ACCOUNT_NOT_LINKED)
        }
        _ => AUTH_ERROR_PAGE.to_string(),
    }
}

fn state_cookie(value: String) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, value))
        .path("/api/auth")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

#[utoipa::path(
    get,
    path = "/api/auth/{provider}/login",
    params(
        ("provider" = String, Path, description = "github or google")
    ),
    responses(
        (status = 303, description = "Redirect to the provider's consent page"),
        (status = 404, description = "Unknown or unconfigured provider")
    )
)]
#[axum::debug_handler]
pub async fn oauth_login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let provider: OAuthProvider = provider.parse()?;
    let csrf_state = generate_state(32);
    let url = state.oauth_service.authorize_url(provider, &csrf_state)?;
    Ok((jar.add(state_cookie(csrf_state)), Redirect::to(&url)))
}

#[utoipa::path(
    get,
    path = "/api/auth/{provider}/callback",
    params(
        ("provider" = String, Path, description = "github or google"),
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "State issued by the login redirect")
    ),
    responses(
        (status = 303, description = "Signed in and redirected, or sent to the auth error page"),
        (status = 404, description = "Unknown or unconfigured provider")
    )
)]
#[axum::debug_handler]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<Response> {
    let provider: OAuthProvider = provider.parse()?;
    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(OAUTH_STATE_COOKIE).path("/api/auth").build());

    if let Some(error) = query.error.as_deref() {
        tracing::warn!(provider = provider.as_str(), error, "provider returned an error");
        return Ok((jar, Redirect::to(AUTH_ERROR_PAGE)).into_response());
    }

    let state_ok = match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(given)) => secrets_match(given, expected),
        _ => false,
    };
    if !state_ok {
        tracing::warn!(provider = provider.as_str(), "oauth state mismatch");
        return Err(Error::BadRequest("Invalid OAuth state".into()));
    }

    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::BadRequest("Missing authorization code".into()))?;

    let user = match state.oauth_service.sign_in(provider, code).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(provider = provider.as_str(), error = %err, "oauth sign-in failed");
            return Ok((jar, Redirect::to(&error_page(&err))).into_response());
        }
    };

    let token = issue_session_token(
        &state.config.jwt_secret,
        state.config.session_ttl_hours,
        &user,
        true,
    )?;
    tracing::info!(user_id = %user.id, provider = provider.as_str(), "user signed in with oauth");
    Ok((
        jar.add(session_cookie(token)),
        Redirect::to(DEFAULT_LOGIN_REDIRECT),
    )
        .into_response())
}
