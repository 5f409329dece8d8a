use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::company_dto::CompanyPayload;
use crate::error::{Error, Result};
use crate::middleware::auth::AuthUser;
use crate::models::company::Company;

const COMPANY_COLUMNS: &str = "id, name, description, image_url, owner_id, created_at, updated_at";

#[derive(Clone)]
pub struct CompanyService {
    pool: PgPool,
}

impl CompanyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, owner_id: Uuid, payload: CompanyPayload) -> Result<Company> {
        let company = sqlx::query_as::<_, Company>(&format!(
            "INSERT INTO companies (name, description, image_url, owner_id) VALUES ($1, $2, $3, $4) RETURNING {}",
            COMPANY_COLUMNS
        ))
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(&payload.image_url)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(company_id = %company.id, user_id = %owner_id, "company created");
        Ok(company)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Company> {
        sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies WHERE id = $1",
            COMPANY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Company not found".into()))
    }

    pub async fn is_owner(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM companies WHERE id = $1 AND owner_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(owned)
    }

    pub async fn update(
        &self,
        id: Uuid,
        caller: &AuthUser,
        payload: CompanyPayload,
    ) -> Result<Company> {
        let existing = self.get_by_id(id).await?;
        if existing.owner_id != caller.id {
            return Err(Error::Forbidden(
                "Not authorized to edit this company".into(),
            ));
        }

        let company = sqlx::query_as::<_, Company>(&format!(
            r#"
            UPDATE companies
            SET name = $2, description = $3, image_url = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COMPANY_COLUMNS
        ))
        .bind(id)
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(&payload.image_url)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(company_id = %id, user_id = %caller.id, "company updated");
        Ok(company)
    }

    /// Owners delete their own companies; admins may delete any.
    pub async fn delete(&self, id: Uuid, caller: &AuthUser) -> Result<()> {
        let existing = self.get_by_id(id).await?;
        if existing.owner_id != caller.id && !caller.is_admin() {
            return Err(Error::Forbidden(
                "Not authorized to delete this company".into(),
            ));
        }
        sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        tracing::info!(company_id = %id, user_id = %caller.id, "company deleted");
        Ok(())
    }

    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies WHERE owner_id = $1 ORDER BY name ASC",
            COMPANY_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(companies)
    }

    pub async fn list_all(&self) -> Result<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies ORDER BY name ASC",
            COMPANY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(companies)
    }
}
