use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::dto::application_dto::{ApplicationFilterQuery, ApplicationPayload};
use crate::dto::job_dto::escape_like;
use crate::error::{Error, Result};
use crate::middleware::auth::AuthUser;
use crate::models::application::{ApplicationStatus, ApplicationWithJob, JobApplication};
use crate::services::storage_service::{resume_id_from_url, Bucket};

const APPLICATION_COLUMNS: &str = "id, job_vacancy_id, user_id, applicant_name, email, phone, cover_letter, resume_url, status, created_at, updated_at";

const WITH_JOB_SELECT: &str = r#"
    SELECT a.id, a.job_vacancy_id, a.user_id, a.applicant_name, a.email, a.phone,
           a.cover_letter, a.resume_url, a.status, a.created_at, a.updated_at,
           j.title AS job_title, j.is_active AS job_is_active, c.name AS company_name
    FROM job_applications a
    JOIN job_vacancies j ON j.id = a.job_vacancy_id
    JOIN companies c ON c.id = j.company_id
"#;

#[derive(Clone)]
pub struct ApplicationService {
    pool: PgPool,
}

/// Which applications a listing covers.
#[derive(Debug, Clone, Copy)]
pub enum ApplicationScope {
    /// Applications to jobs authored by this user.
    JobsAuthoredBy(Uuid),
    All,
}

pub fn push_application_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    scope: ApplicationScope,
    filter: &ApplicationFilterQuery,
) {
    qb.push(" WHERE TRUE");
    if let ApplicationScope::JobsAuthoredBy(author_id) = scope {
        qb.push(" AND j.author_id = ").push_bind(author_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND a.status = ").push_bind(status);
    }
    if let Some(name) = filter.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        qb.push(" AND a.applicant_name ILIKE ")
            .push_bind(format!("%{}%", escape_like(name)));
    }
}

impl ApplicationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Option<Uuid>,
        payload: ApplicationPayload,
    ) -> Result<JobApplication> {
        let active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM job_vacancies WHERE id = $1")
                .bind(payload.job_vacancy_id)
                .fetch_optional(&self.pool)
                .await?;
        if active != Some(true) {
            return Err(Error::NotFound("Job not found".into()));
        }

        let resume_file_id = match payload.resume_url.as_deref() {
            Some(url) => Some(self.resolve_resume(user_id, url).await?),
            None => None,
        };

        let application = sqlx::query_as::<_, JobApplication>(&format!(
            r#"
            INSERT INTO job_applications (
                job_vacancy_id, user_id, applicant_name, email, phone, cover_letter,
                resume_url, resume_file_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            APPLICATION_COLUMNS
        ))
        .bind(payload.job_vacancy_id)
        .bind(user_id)
        .bind(&payload.full_name)
        .bind(&payload.email)
        .bind(&payload.phone)
        .bind(&payload.cover_letter)
        .bind(&payload.resume_url)
        .bind(resume_file_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            application_id = %application.id,
            job_id = %application.job_vacancy_id,
            "application submitted"
        );
        Ok(application)
    }

    /// Resumes uploaded while signed in can only be attached by their uploader.
    async fn resolve_resume(&self, user_id: Option<Uuid>, url: &str) -> Result<Uuid> {
        let file_id =
            resume_id_from_url(url).ok_or_else(|| Error::BadRequest("Invalid resume URL".into()))?;
        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT owner_id FROM stored_files WHERE id = $1 AND bucket = $2")
                .bind(file_id)
                .bind(Bucket::Resumes.as_str())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| Error::NotFound("Resume not found".into()))?;
        match owner {
            Some(owner) if Some(owner) != user_id => {
                tracing::warn!(%file_id, "application references another user's resume");
                Err(Error::Forbidden("Not authorized to use this resume".into()))
            }
            _ => Ok(file_id),
        }
    }

    pub async fn list(
        &self,
        scope: ApplicationScope,
        filter: &ApplicationFilterQuery,
    ) -> Result<Vec<ApplicationWithJob>> {
        let mut qb = QueryBuilder::<Postgres>::new(WITH_JOB_SELECT);
        push_application_filters(&mut qb, scope, filter);
        qb.push(" ORDER BY a.created_at DESC");
        let rows = qb
            .build_query_as::<ApplicationWithJob>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_mine(&self, user_id: Uuid) -> Result<Vec<ApplicationWithJob>> {
        let rows = sqlx::query_as::<_, ApplicationWithJob>(&format!(
            "{} WHERE a.user_id = $1 ORDER BY a.created_at DESC",
            WITH_JOB_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Job author of the application's vacancy, or an admin.
    async fn ensure_reviewer(&self, id: Uuid, caller: &AuthUser) -> Result<()> {
        let author: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT j.author_id
            FROM job_applications a
            JOIN job_vacancies j ON j.id = a.job_vacancy_id
            WHERE a.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match author {
            None => Err(Error::NotFound("Application not found".into())),
            Some(author) if author == caller.id || caller.is_admin() => Ok(()),
            Some(_) => {
                tracing::warn!(application_id = %id, user_id = %caller.id, "application access denied");
                Err(Error::Forbidden(
                    "Not authorized to manage this application".into(),
                ))
            }
        }
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        caller: &AuthUser,
        status: ApplicationStatus,
    ) -> Result<JobApplication> {
        self.ensure_reviewer(id, caller).await?;
        let application = sqlx::query_as::<_, JobApplication>(&format!(
            "UPDATE job_applications SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(
            application_id = %id,
            user_id = %caller.id,
            status = status.as_str(),
            "application status changed"
        );
        Ok(application)
    }

    pub async fn delete(&self, id: Uuid, caller: &AuthUser) -> Result<()> {
        self.ensure_reviewer(id, caller).await?;
        sqlx::query("DELETE FROM job_applications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        tracing::info!(application_id = %id, user_id = %caller.id, "application deleted");
        Ok(())
    }

    /// Whether `user_id` authored a job that received an application pointing at `resume_url`.
    pub async fn author_received_resume(&self, user_id: Uuid, file_id: Uuid) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM job_applications a
                JOIN job_vacancies j ON j.id = a.job_vacancy_id
                WHERE j.author_id = $1 AND a.resume_file_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(file_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }
}
