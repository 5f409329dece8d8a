use uuid::Uuid;

use crate::dto::auth_dto::{
    normalize_email, LoginPayload, NewPasswordPayload, RegisterPayload, ResetPayload,
    SettingsPayload,
};
use crate::error::{Error, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{token::has_expired, user::User};
use crate::services::{
    mail_service::MailService,
    token_service::TokenService,
    user_service::{ProfileChanges, UserService},
};
use crate::utils::{
    crypto::{hash_password, secrets_match, verify_password},
    time::now,
};

/// Result of a credential login attempt that did not fail outright.
#[derive(Debug)]
pub enum LoginOutcome {
    /// The address is unverified; a fresh confirmation link was mailed.
    VerificationSent,
    /// A one-time code was mailed and must be submitted with the credentials.
    TwoFactorRequired,
    SignedIn(User),
}

#[derive(Debug)]
pub enum SettingsOutcome {
    VerificationSent,
    Updated(User),
}

#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    tokens: TokenService,
    mail: MailService,
}

impl AuthService {
    pub fn new(users: UserService, tokens: TokenService, mail: MailService) -> Self {
        Self {
            users,
            tokens,
            mail,
        }
    }

    pub async fn register(&self, payload: RegisterPayload) -> Result<User> {
        let email = normalize_email(&payload.email);

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(Error::Conflict("Email already in use".into()));
        }

        let password_hash = hash_password(&payload.password)?;
        let user = self
            .users
            .create_with_password(payload.name.trim(), &email, &password_hash)
            .await?;

        let token = self.tokens.generate_verification_token(&email, None).await?;
        self.mail
            .send_verification_email(&token.email, &token.token)
            .await?;

        Ok(user)
    }

    pub async fn login(&self, payload: LoginPayload) -> Result<LoginOutcome> {
        let email = normalize_email(&payload.email);

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or_else(|| Error::NotFound("Email does not exist".into()))?;
        let Some(password_hash) = user.password_hash.as_deref() else {
            return Err(Error::NotFound("Email does not exist".into()));
        };

        if !verify_password(&payload.password, password_hash)? {
            tracing::info!(user_id = %user.id, "login rejected: bad credentials");
            return Err(Error::Unauthorized("Invalid credentials".into()));
        }

        if user.email_verified.is_none() {
            let token = self
                .tokens
                .generate_verification_token(&user.email, None)
                .await?;
            self.mail
                .send_verification_email(&token.email, &token.token)
                .await?;
            return Ok(LoginOutcome::VerificationSent);
        }

        if user.is_two_factor_enabled {
            match payload.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                Some(code) => self.confirm_two_factor(&user, code).await?,
                None => {
                    let token = self.tokens.generate_two_factor_token(&user.email).await?;
                    self.mail
                        .send_two_factor_token_email(&token.email, &token.token)
                        .await?;
                    tracing::info!(user_id = %user.id, "two-factor code sent");
                    return Ok(LoginOutcome::TwoFactorRequired);
                }
            }

            if !self.tokens.consume_two_factor_confirmation(user.id).await? {
                return Err(Error::Unauthorized("Invalid credentials".into()));
            }
        }

        tracing::info!(user_id = %user.id, "user signed in");
        Ok(LoginOutcome::SignedIn(user))
    }

    async fn confirm_two_factor(&self, user: &User, code: &str) -> Result<()> {
        let token = self
            .tokens
            .get_two_factor_token_by_email(&user.email)
            .await?
            .ok_or_else(|| Error::BadRequest("Invalid code!".into()))?;

        if !secrets_match(code, &token.token) {
            return Err(Error::BadRequest("Invalid code!".into()));
        }

        if has_expired(token.expires, now()) {
            return Err(Error::BadRequest("Code expired!".into()));
        }

        self.tokens.delete_two_factor_token(token.id).await?;
        self.tokens.replace_two_factor_confirmation(user.id).await?;
        Ok(())
    }

    pub async fn new_verification(&self, token: &str) -> Result<User> {
        let token = self
            .tokens
            .get_verification_token(token)
            .await?
            .ok_or_else(|| Error::NotFound("Token does not exist!".into()))?;

        if has_expired(token.expires, now()) {
            return Err(Error::BadRequest("Token has expired!".into()));
        }

        let user = match token.user_id {
            Some(user_id) => self.users.get_by_id(user_id).await?,
            None => self.users.get_by_email(&token.email).await?,
        }
        .ok_or_else(|| Error::NotFound("Email does not exist!".into()))?;

        if token.user_id.is_some() {
            if let Some(holder) = self.users.get_by_email(&token.email).await? {
                if holder.id != user.id {
                    return Err(Error::Conflict("Email is already in use".into()));
                }
            }
        }

        let user = self.users.mark_email_verified(user.id, &token.email).await?;
        self.tokens.delete_verification_token(token.id).await?;
        tracing::info!(user_id = %user.id, "email verified");
        Ok(user)
    }

    pub async fn reset(&self, payload: ResetPayload) -> Result<()> {
        let email = normalize_email(&payload.email);

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or_else(|| Error::NotFound("Email not found!".into()))?;

        let token = self.tokens.generate_password_reset_token(&user.email).await?;
        self.mail
            .send_password_reset_email(&token.email, &token.token)
            .await?;
        Ok(())
    }

    pub async fn new_password(&self, payload: NewPasswordPayload) -> Result<()> {
        let token = payload
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::BadRequest("Missing token!".into()))?;

        let token = self
            .tokens
            .get_password_reset_token(token)
            .await?
            .ok_or_else(|| Error::NotFound("Invalid token!".into()))?;

        if has_expired(token.expires, now()) {
            return Err(Error::BadRequest("Token has expired!".into()));
        }

        let user = self
            .users
            .get_by_email(&token.email)
            .await?
            .ok_or_else(|| Error::NotFound("Email does not exist!".into()))?;

        let password_hash = hash_password(&payload.password)?;
        self.users.set_password(user.id, &password_hash).await?;
        self.tokens.delete_password_reset_token(token.id).await?;
        tracing::info!(user_id = %user.id, "password reset");
        Ok(())
    }

    pub async fn current_user(&self, id: Uuid) -> Result<User> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::Unauthorized("Unauthorized".into()))
    }

    pub async fn settings(
        &self,
        caller: &AuthUser,
        payload: SettingsPayload,
    ) -> Result<SettingsOutcome> {
        let user = self.current_user(caller.id).await?;

        if let Some(email) = payload.email.as_deref().map(normalize_email) {
            if email != user.email {
                if let Some(existing) = self.users.get_by_email(&email).await? {
                    if existing.id != user.id {
                        return Err(Error::Conflict("Email is already in use".into()));
                    }
                }

                let token = self
                    .tokens
                    .generate_verification_token(&email, Some(user.id))
                    .await?;
                self.mail
                    .send_verification_email(&token.email, &token.token)
                    .await?;
                return Ok(SettingsOutcome::VerificationSent);
            }
        }

        let mut password_hash = None;
        if let (Some(current), Some(new_password)) =
            (payload.password.as_deref(), payload.new_password.as_deref())
        {
            if let Some(stored) = user.password_hash.as_deref() {
                if !verify_password(current, stored)? {
                    return Err(Error::BadRequest("Incorrect current password".into()));
                }
                password_hash = Some(hash_password(new_password)?);
            }
        }

        if let Some(role) = payload.role {
            if role != user.role && !user.is_admin() {
                return Err(Error::Forbidden("Only administrators can change roles".into()));
            }
        }

        let updated = self
            .users
            .update_profile(
                user.id,
                ProfileChanges {
                    name: payload.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                    password_hash,
                    is_two_factor_enabled: payload.is_two_factor_enabled,
                    role: payload.role,
                },
            )
            .await?;

        Ok(SettingsOutcome::Updated(updated))
    }
}
