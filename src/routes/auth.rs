use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use axum_extra::extract::cookie::CookieJar;
use validator::Validate;

use crate::{
    dto::auth_dto::{
        LoginPayload, LoginResponse, MessageResponse, NewPasswordPayload,
        NewVerificationPayload, RegisterPayload, ResetPayload, SettingsPayload, UserResponse,
    },
    error::{Error, Result},
    middleware::{
        auth::{expired_session_cookie, issue_session_token, session_cookie, AuthUser},
        route_guard::DEFAULT_LOGIN_REDIRECT,
    },
    services::auth_service::{LoginOutcome, SettingsOutcome},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Account created, confirmation e-mail sent", body = MessageResponse),
        (status = 400, description = "Invalid fields"),
        (status = 409, description = "Email already in use")
    )
)]
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.auth_service.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Confirmation email sent")),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Signed in, confirmation e-mail sent, or two-factor code required", body = LoginResponse),
        (status = 400, description = "Invalid fields or invalid/expired code"),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "Email does not exist")
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let user = match state.auth_service.login(payload).await? {
        LoginOutcome::VerificationSent => {
            return Ok((
                jar,
                Json(LoginResponse::Message {
                    success: "Confirmation email sent".into(),
                }),
            ));
        }
        LoginOutcome::TwoFactorRequired => {
            return Ok((jar, Json(LoginResponse::TwoFactor { two_factor: true })));
        }
        LoginOutcome::SignedIn(user) => user,
    };

    let token = issue_session_token(
        &state.config.jwt_secret,
        state.config.session_ttl_hours,
        &user,
        false,
    )?;
    let jar = jar.add(session_cookie(token.clone()));
    Ok((
        jar,
        Json(LoginResponse::SignedIn {
            success: "Logged in".into(),
            redirect_to: DEFAULT_LOGIN_REDIRECT.into(),
            token,
            user: UserResponse::from(user),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cookie cleared", body = MessageResponse)
    )
)]
#[axum::debug_handler]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(expired_session_cookie()),
        Json(MessageResponse::new("Logged out")),
    )
}

#[utoipa::path(
    post,
    path = "/api/auth/new-verification",
    request_body = NewVerificationPayload,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Missing or expired token"),
        (status = 404, description = "Token does not exist")
    )
)]
#[axum::debug_handler]
pub async fn new_verification(
    State(state): State<AppState>,
    Json(payload): Json<NewVerificationPayload>,
) -> Result<impl IntoResponse> {
    let token = payload
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::BadRequest("Missing token!".into()))?;
    state.auth_service.new_verification(token).await?;
    Ok(Json(MessageResponse::new("Email verified!")))
}

#[utoipa::path(
    post,
    path = "/api/auth/reset",
    request_body = ResetPayload,
    responses(
        (status = 200, description = "Reset e-mail sent", body = MessageResponse),
        (status = 400, description = "Invalid email"),
        (status = 404, description = "Email not found")
    )
)]
#[axum::debug_handler]
pub async fn reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetPayload>,
) -> Result<impl IntoResponse> {
    payload
        .validate()
        .map_err(|_| Error::BadRequest("Invalid email!".into()))?;
    state.auth_service.reset(payload).await?;
    Ok(Json(MessageResponse::new("Reset email sent!")))
}

#[utoipa::path(
    post,
    path = "/api/auth/new-password",
    request_body = NewPasswordPayload,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Missing token, invalid fields or expired token"),
        (status = 404, description = "Invalid token")
    )
)]
#[axum::debug_handler]
pub async fn new_password(
    State(state): State<AppState>,
    Json(payload): Json<NewPasswordPayload>,
) -> Result<impl IntoResponse> {
    if payload.token.as_deref().map_or(true, str::is_empty) {
        return Err(Error::BadRequest("Missing token!".into()));
    }
    payload.validate()?;
    state.auth_service.new_password(payload).await?;
    Ok(Json(MessageResponse::new("Password updated!")))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Signed-in user", body = UserResponse),
        (status = 401, description = "Not signed in")
    )
)]
#[axum::debug_handler]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse> {
    let user = state.auth_service.current_user(auth.id).await?;
    let is_oauth = auth.is_oauth || state.user_service.is_oauth_user(user.id).await?;
    Ok(Json(UserResponse::from(user).with_oauth(is_oauth)))
}

#[utoipa::path(
    patch,
    path = "/api/auth/settings",
    request_body = SettingsPayload,
    responses(
        (status = 200, description = "Settings updated or verification e-mail sent", body = MessageResponse),
        (status = 400, description = "Invalid fields or incorrect current password"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Role change by a non-admin"),
        (status = 409, description = "Email is already in use")
    )
)]
#[axum::debug_handler]
pub async fn settings(
    State(state): State<AppState>,
    auth: AuthUser,
    jar: CookieJar,
    Json(mut payload): Json<SettingsPayload>,
) -> Result<impl IntoResponse> {
    if auth.is_oauth {
        payload.strip_credential_fields();
    }
    payload.validate()?;

    match state.auth_service.settings(&auth, payload).await? {
        SettingsOutcome::VerificationSent => Ok((
            jar,
            Json(MessageResponse::new(
                "Verification email sent! Please confirm your new address.",
            )),
        )),
        SettingsOutcome::Updated(user) => {
            // The role is part of the session claims.
            let token = issue_session_token(
                &state.config.jwt_secret,
                state.config.session_ttl_hours,
                &user,
                auth.is_oauth,
            )?;
            Ok((
                jar.add(session_cookie(token)),
                Json(MessageResponse::new("Settings Updated!")),
            ))
        }
    }
}
