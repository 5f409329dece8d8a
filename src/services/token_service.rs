use chrono::Duration;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::token::{
    PasswordResetToken, TwoFactorConfirmation, TwoFactorToken, VerificationToken,
};
use crate::utils::{
    time::expires_in,
    token::{generate_link_token, generate_two_factor_code},
};

pub const VERIFICATION_TOKEN_TTL_MINUTES: i64 = 60;
pub const PASSWORD_RESET_TOKEN_TTL_MINUTES: i64 = 60;
pub const TWO_FACTOR_TOKEN_TTL_MINUTES: i64 = 5;

/// Short-lived tokens for e-mail verification, password reset and the two-factor step.
/// Issuing a token removes any earlier token of the same kind for that e-mail.
#[derive(Clone)]
pub struct TokenService {
    pool: PgPool,
}

#[derive(Debug, Default)]
pub struct PurgeReport {
    pub verification: u64,
    pub password_reset: u64,
    pub two_factor: u64,
}

impl TokenService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn generate_verification_token(
        &self,
        email: &str,
        user_id: Option<Uuid>,
    ) -> Result<VerificationToken> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM verification_tokens WHERE email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await?;
        let token = sqlx::query_as::<_, VerificationToken>(
            r#"
            INSERT INTO verification_tokens (email, token, expires, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, token, expires, user_id
            "#,
        )
        .bind(email)
        .bind(generate_link_token())
        .bind(expires_in(Duration::minutes(VERIFICATION_TOKEN_TTL_MINUTES)))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(token)
    }

    pub async fn get_verification_token(&self, token: &str) -> Result<Option<VerificationToken>> {
        let row = sqlx::query_as::<_, VerificationToken>(
            "SELECT id, email, token, expires, user_id FROM verification_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_verification_token(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM verification_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn generate_password_reset_token(&self, email: &str) -> Result<PasswordResetToken> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM password_reset_tokens WHERE email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await?;
        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (email, token, expires)
            VALUES ($1, $2, $3)
            RETURNING id, email, token, expires
            "#,
        )
        .bind(email)
        .bind(generate_link_token())
        .bind(expires_in(Duration::minutes(PASSWORD_RESET_TOKEN_TTL_MINUTES)))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(token)
    }

    pub async fn get_password_reset_token(&self, token: &str) -> Result<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT id, email, token, expires FROM password_reset_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_password_reset_token(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM password_reset_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn generate_two_factor_token(&self, email: &str) -> Result<TwoFactorToken> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM two_factor_tokens WHERE email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await?;
        let token = sqlx::query_as::<_, TwoFactorToken>(
            r#"
            INSERT INTO two_factor_tokens (email, token, expires)
            VALUES ($1, $2, $3)
            RETURNING id, email, token, expires
            "#,
        )
        .bind(email)
        .bind(generate_two_factor_code())
        .bind(expires_in(Duration::minutes(TWO_FACTOR_TOKEN_TTL_MINUTES)))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(token)
    }

    pub async fn get_two_factor_token_by_email(&self, email: &str) -> Result<Option<TwoFactorToken>> {
        let row = sqlx::query_as::<_, TwoFactorToken>(
            "SELECT id, email, token, expires FROM two_factor_tokens WHERE email = $1 ORDER BY expires DESC LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_two_factor_token(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM two_factor_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drops any confirmation left for the user and records a fresh one.
    pub async fn replace_two_factor_confirmation(
        &self,
        user_id: Uuid,
    ) -> Result<TwoFactorConfirmation> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM two_factor_confirmations WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let row = sqlx::query_as::<_, TwoFactorConfirmation>(
            "INSERT INTO two_factor_confirmations (user_id) VALUES ($1) RETURNING id, user_id",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Removes the confirmation, returning whether one existed.
    pub async fn consume_two_factor_confirmation(&self, user_id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM two_factor_confirmations WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn purge_expired(&self) -> Result<PurgeReport> {
        let verification = sqlx::query("DELETE FROM verification_tokens WHERE expires < NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();
        let password_reset = sqlx::query("DELETE FROM password_reset_tokens WHERE expires < NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();
        let two_factor = sqlx::query("DELETE FROM two_factor_tokens WHERE expires < NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(PurgeReport {
            verification,
            password_reset,
            two_factor,
        })
    }
}
