use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::user::{User, UserRole};

/// Error code the frontend shows on `/auth/error` when an OAuth e-mail is already registered.
pub const OAUTH_ACCOUNT_NOT_LINKED: &str = "OAuthAccountNotLinked";

const USER_COLUMNS: &str = "id, name, email, email_verified, image, password_hash, role, is_two_factor_enabled, created_at, updated_at";

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub is_two_factor_enabled: Option<bool>,
    pub role: Option<UserRole>,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn create_with_password(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Marks the address as verified and makes it the user's primary e-mail.
    pub async fn mark_email_verified(&self, id: Uuid, email: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET email_verified = NOW(), email = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET
                name = COALESCE($2, name),
                password_hash = COALESCE($3, password_hash),
                is_two_factor_enabled = COALESCE($4, is_two_factor_enabled),
                role = COALESCE($5, role),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.password_hash)
        .bind(changes.is_two_factor_enabled)
        .bind(changes.role)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn is_oauth_user(&self, id: Uuid) -> Result<bool> {
        let linked: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE user_id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(linked)
    }

    /// Returns the user linked to a provider identity, creating both on first sign-in.
    /// An e-mail already held by another account is never linked automatically.
    pub async fn find_or_create_oauth_user(
        &self,
        provider: &str,
        provider_account_id: &str,
        email: &str,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let linked = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = (SELECT user_id FROM accounts WHERE provider = $1 AND provider_account_id = $2)",
            USER_COLUMNS
        ))
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(user) = linked {
            tx.commit().await?;
            return Ok(user);
        }

        let taken: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(user_id) = taken {
            tracing::warn!(%user_id, provider, "oauth identity matches an existing account");
            return Err(Error::Conflict(OAUTH_ACCOUNT_NOT_LINKED.into()));
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, image, email_verified)
            VALUES ($1, $2, $3, NOW())
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(name)
        .bind(email)
        .bind(image)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO accounts (user_id, provider, provider_account_id) VALUES ($1, $2, $3)",
        )
        .bind(user.id)
        .bind(provider)
        .bind(provider_account_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(user_id = %user.id, provider, "oauth account linked");
        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn update_role(&self, id: Uuid, role: UserRole) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
