use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    models::user::{User, UserRole},
    AppState,
};

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub is_oauth: bool,
}

pub fn issue_session_token(
    secret: &str,
    ttl_hours: i64,
    user: &User,
    is_oauth: bool,
) -> Result<String> {
    let exp = (Utc::now() + Duration::hours(ttl_hours.max(1))).timestamp() as usize;
    let claims = Claims {
        sub: user.id.to_string(),
        exp,
        email: user.email.clone(),
        role: user.role,
        is_oauth,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn decode_session_token(secret: &str, token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Bearer header first, then the session cookie.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// The signed-in caller, resolved from the session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub is_oauth: bool,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    fn from_claims(claims: Claims) -> Result<Self> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| Error::Unauthorized("Invalid session".into()))?;
        Ok(Self {
            id,
            email: claims.email,
            role: claims.role,
            is_oauth: claims.is_oauth,
        })
    }

    pub fn from_headers(headers: &HeaderMap, secret: &str) -> Result<Self> {
        let token = session_token_from_headers(headers)
            .ok_or_else(|| Error::Unauthorized("User not authenticated".into()))?;
        let claims = decode_session_token(secret, &token)
            .map_err(|_| Error::Unauthorized("Invalid session".into()))?;
        Self::from_claims(claims)
    }

    /// Reloads the account behind the session so role changes and deletions
    /// take effect before the token expires.
    pub async fn refresh(self, state: &AppState) -> Result<Self> {
        let user = state
            .user_service
            .get_by_id(self.id)
            .await?
            .ok_or_else(|| Error::Unauthorized("User not found".into()))?;
        Ok(Self {
            id: user.id,
            email: user.email,
            role: user.role,
            is_oauth: self.is_oauth,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }
        let user = AuthUser::from_headers(&parts.headers, &state.config.jwt_secret)?
            .refresh(state)
            .await?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Resolves to `None` for anonymous callers instead of rejecting the request.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(Error::Unauthorized(_)) => Ok(MaybeAuthUser(None)),
            Err(err) => Err(err),
        }
    }
}

pub async fn require_admin(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let claimed = match AuthUser::from_headers(req.headers(), &state.config.jwt_secret) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let user = match claimed.refresh(&state).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    if !user.is_admin() {
        tracing::warn!(user_id = %user.id, path = %req.uri().path(), "admin route denied");
        return Error::Forbidden("forbidden".into()).into_response();
    }
    req.extensions_mut().insert(user);
    next.run(req).await
}
