use std::collections::HashMap;

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::dto::job_dto::{JobFilterQuery, JobInput};
use crate::error::{Error, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    company::Company,
    job::{JobSkill, JobVacancy},
};

const JOB_COLUMNS: &str = "id, title, description, company_id, author_id, job_type, experience_level, employment_type, working_type, payment_from, payment_to, valid_until, is_active, created_at, updated_at";

/// A vacancy together with its company and skill names.
#[derive(Debug, Clone)]
pub struct JobDetails {
    pub job: JobVacancy,
    pub company: Option<Company>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JobPage {
    pub items: Vec<JobDetails>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Clone)]
pub struct JobService {
    pool: PgPool,
}

/// Appends the `WHERE` clause of the public listing.
pub fn push_public_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &JobFilterQuery) {
    qb.push(" WHERE j.is_active = TRUE");

    if let Some(pattern) = filter.title_pattern() {
        qb.push(" AND j.title ILIKE ").push_bind(pattern);
    }
    if !filter.job_type.is_empty() {
        let values: Vec<String> = filter.job_type.iter().map(|v| v.as_str().to_string()).collect();
        qb.push(" AND j.job_type::text = ANY(").push_bind(values).push(")");
    }
    if !filter.employment_type.is_empty() {
        let values: Vec<String> = filter
            .employment_type
            .iter()
            .map(|v| v.as_str().to_string())
            .collect();
        qb.push(" AND j.employment_type::text = ANY(")
            .push_bind(values)
            .push(")");
    }
    if !filter.working_type.is_empty() {
        let values: Vec<String> = filter
            .working_type
            .iter()
            .map(|v| v.as_str().to_string())
            .collect();
        qb.push(" AND j.working_type::text = ANY(")
            .push_bind(values)
            .push(")");
    }
    if !filter.experience_level.is_empty() {
        let values: Vec<String> = filter
            .experience_level
            .iter()
            .map(|v| v.as_str().to_string())
            .collect();
        qb.push(" AND j.experience_level::text = ANY(")
            .push_bind(values)
            .push(")");
    }
    let skills = filter.normalized_skills();
    if !skills.is_empty() {
        qb.push(" AND EXISTS (SELECT 1 FROM job_skills s WHERE s.job_vacancy_id = j.id AND s.skill = ANY(")
            .push_bind(skills)
            .push("))");
    }
}

impl JobService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_company_owner(&self, company_id: Uuid, caller: &AuthUser) -> Result<()> {
        let owner: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM companies WHERE id = $1")
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;
        match owner {
            None => Err(Error::NotFound("Company not found".into())),
            Some(owner) if owner != caller.id => Err(Error::Forbidden(
                "Not authorized to post jobs for this company".into(),
            )),
            Some(_) => Ok(()),
        }
    }

    async fn replace_skills(
        tx: &mut Transaction<'_, Postgres>,
        job_id: Uuid,
        skills: &[String],
    ) -> Result<()> {
        sqlx::query("DELETE FROM job_skills WHERE job_vacancy_id = $1")
            .bind(job_id)
            .execute(&mut **tx)
            .await?;
        if !skills.is_empty() {
            sqlx::query(
                "INSERT INTO job_skills (job_vacancy_id, skill) SELECT $1, UNNEST($2::text[])",
            )
            .bind(job_id)
            .bind(skills)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<JobVacancy> {
        sqlx::query_as::<_, JobVacancy>(&format!(
            "SELECT {} FROM job_vacancies WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Job not found".into()))
    }

    async fn find_authored(&self, id: Uuid, caller: &AuthUser, denied: &str) -> Result<JobVacancy> {
        let job = self.find(id).await?;
        if job.author_id != caller.id {
            tracing::warn!(job_id = %id, user_id = %caller.id, "job access denied");
            return Err(Error::Forbidden(denied.to_string()));
        }
        Ok(job)
    }

    /// Loads companies and skills for a batch of jobs with one query each.
    async fn with_details(&self, jobs: Vec<JobVacancy>) -> Result<Vec<JobDetails>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        let job_ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
        let company_ids: Vec<Uuid> = jobs.iter().map(|j| j.company_id).collect();

        let companies = sqlx::query_as::<_, Company>(
            "SELECT id, name, description, image_url, owner_id, created_at, updated_at FROM companies WHERE id = ANY($1)",
        )
        .bind(&company_ids)
        .fetch_all(&self.pool)
        .await?;
        let companies: HashMap<Uuid, Company> =
            companies.into_iter().map(|c| (c.id, c)).collect();

        let skills = sqlx::query_as::<_, JobSkill>(
            "SELECT id, job_vacancy_id, skill FROM job_skills WHERE job_vacancy_id = ANY($1) ORDER BY skill",
        )
        .bind(&job_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut skills_by_job: HashMap<Uuid, Vec<String>> = HashMap::new();
        for skill in skills {
            skills_by_job
                .entry(skill.job_vacancy_id)
                .or_default()
                .push(skill.skill);
        }

        Ok(jobs
            .into_iter()
            .map(|job| JobDetails {
                company: companies.get(&job.company_id).cloned(),
                skills: skills_by_job.remove(&job.id).unwrap_or_default(),
                job,
            })
            .collect())
    }

    async fn one_with_details(&self, job: JobVacancy) -> Result<JobDetails> {
        self.with_details(vec![job])
            .await?
            .pop()
            .ok_or_else(|| Error::Internal("job details missing".into()))
    }

    pub async fn create(&self, caller: &AuthUser, input: JobInput) -> Result<JobDetails> {
        self.ensure_company_owner(input.company_id, caller).await?;

        let mut tx = self.pool.begin().await?;
        let job = sqlx::query_as::<_, JobVacancy>(&format!(
            r#"
            INSERT INTO job_vacancies (
                title, description, company_id, author_id, job_type, experience_level,
                employment_type, working_type, payment_from, payment_to, valid_until, is_active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.company_id)
        .bind(caller.id)
        .bind(input.job_type)
        .bind(input.experience_level)
        .bind(input.employment_type)
        .bind(input.working_type)
        .bind(input.payment_from)
        .bind(input.payment_to)
        .bind(input.valid_until)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await?;
        Self::replace_skills(&mut tx, job.id, &input.skills).await?;
        tx.commit().await?;

        tracing::info!(job_id = %job.id, user_id = %caller.id, "job created");
        self.one_with_details(job).await
    }

    pub async fn update(&self, id: Uuid, caller: &AuthUser, input: JobInput) -> Result<JobDetails> {
        let existing = self
            .find_authored(id, caller, "Not authorized to edit this job")
            .await?;
        if existing.company_id != input.company_id {
            self.ensure_company_owner(input.company_id, caller).await?;
        }

        let mut tx = self.pool.begin().await?;
        let job = sqlx::query_as::<_, JobVacancy>(&format!(
            r#"
            UPDATE job_vacancies
            SET
                title = $2,
                description = $3,
                company_id = $4,
                job_type = $5,
                experience_level = $6,
                employment_type = $7,
                working_type = $8,
                payment_from = $9,
                payment_to = $10,
                valid_until = $11,
                is_active = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.company_id)
        .bind(input.job_type)
        .bind(input.experience_level)
        .bind(input.employment_type)
        .bind(input.working_type)
        .bind(input.payment_from)
        .bind(input.payment_to)
        .bind(input.valid_until)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await?;
        Self::replace_skills(&mut tx, job.id, &input.skills).await?;
        tx.commit().await?;

        tracing::info!(job_id = %job.id, user_id = %caller.id, "job updated");
        self.one_with_details(job).await
    }

    pub async fn delete(&self, id: Uuid, caller: &AuthUser) -> Result<()> {
        self.find_authored(id, caller, "Not authorized to delete this job")
            .await?;
        sqlx::query("DELETE FROM job_vacancies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        tracing::info!(job_id = %id, user_id = %caller.id, "job deleted");
        Ok(())
    }

    pub async fn get_owned(&self, id: Uuid, caller: &AuthUser) -> Result<JobDetails> {
        let job = self
            .find_authored(id, caller, "Not authorized to access this job")
            .await?;
        self.one_with_details(job).await
    }

    /// Copies a job and its skills as an inactive draft titled "<title> (Copy)".
    pub async fn duplicate(&self, id: Uuid, caller: &AuthUser) -> Result<JobDetails> {
        let source = self
            .find_authored(id, caller, "Not authorized to duplicate this job")
            .await?;

        let mut tx = self.pool.begin().await?;
        let job = sqlx::query_as::<_, JobVacancy>(&format!(
            r#"
            INSERT INTO job_vacancies (
                title, description, company_id, author_id, job_type, experience_level,
                employment_type, working_type, payment_from, payment_to, valid_until, is_active
            )
            SELECT title || ' (Copy)', description, company_id, author_id, job_type, experience_level,
                   employment_type, working_type, payment_from, payment_to, valid_until, FALSE
            FROM job_vacancies
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(source.id)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO job_skills (job_vacancy_id, skill) SELECT $2, skill FROM job_skills WHERE job_vacancy_id = $1",
        )
        .bind(source.id)
        .bind(job.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(job_id = %job.id, source_id = %source.id, "job duplicated");
        self.one_with_details(job).await
    }

    pub async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<JobDetails>> {
        let jobs = sqlx::query_as::<_, JobVacancy>(&format!(
            "SELECT {} FROM job_vacancies WHERE author_id = $1 ORDER BY title ASC",
            JOB_COLUMNS
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        self.with_details(jobs).await
    }

    pub async fn list_active_for_company(&self, company_id: Uuid) -> Result<Vec<JobDetails>> {
        let jobs = sqlx::query_as::<_, JobVacancy>(&format!(
            "SELECT {} FROM job_vacancies WHERE company_id = $1 AND is_active = TRUE ORDER BY valid_until DESC",
            JOB_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        self.with_details(jobs).await
    }

    pub async fn list_public(&self, filter: &JobFilterQuery) -> Result<JobPage> {
        let offset = filter.offset();
        let limit = filter.limit();

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM job_vacancies j");
        push_public_filters(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let columns = JOB_COLUMNS
            .split(", ")
            .map(|c| format!("j.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut items_qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM job_vacancies j", columns));
        push_public_filters(&mut items_qb, filter);
        items_qb
            .push(" ORDER BY j.valid_until DESC, j.id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let jobs = items_qb
            .build_query_as::<JobVacancy>()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(total, offset, limit, returned = jobs.len(), "public job listing");
        Ok(JobPage {
            items: self.with_details(jobs).await?,
            total,
            offset,
            limit,
        })
    }

    pub async fn get_public(&self, id: Uuid) -> Result<JobDetails> {
        let job = self.find(id).await?;
        if !job.is_active {
            return Err(Error::NotFound("Job not found".into()));
        }
        self.one_with_details(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{JobType, WorkingType};

    fn sql_for(filter: &JobFilterQuery) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM job_vacancies j");
        push_public_filters(&mut qb, filter);
        qb.sql().to_string()
    }

    #[test]
    fn no_filters_still_restricts_to_active_jobs() {
        let sql = sql_for(&JobFilterQuery::default());
        assert!(sql.ends_with("WHERE j.is_active = TRUE"));
    }

    #[test]
    fn each_present_filter_adds_one_bound_predicate() {
        let filter = JobFilterQuery {
            title: Some("rust".into()),
            job_type: vec![JobType::Developer, JobType::Tester],
            working_type: vec![WorkingType::Remote],
            skills: vec!["rust".into()],
            ..Default::default()
        };
        let sql = sql_for(&filter);
        assert!(sql.contains("j.title ILIKE $1"));
        assert!(sql.contains("j.job_type::text = ANY($2)"));
        assert!(sql.contains("j.working_type::text = ANY($3)"));
        assert!(sql.contains("s.skill = ANY($4)"));
        assert!(!sql.contains("employment_type"));
        assert!(!sql.contains("experience_level"));
    }

    #[test]
    fn blank_skill_lists_are_ignored() {
        let filter = JobFilterQuery {
            skills: vec!["  ".into()],
            ..Default::default()
        };
        assert!(!sql_for(&filter).contains("job_skills"));
    }
}
