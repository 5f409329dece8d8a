use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::company::Company;
use crate::models::job::{EmploymentType, ExperienceLevel, JobType, WorkingType};
use crate::services::job_service::{JobDetails, JobPage};

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Skills arrive either as one comma-separated string or as a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SkillsInput {
    Text(String),
    List(Vec<String>),
}

impl Default for SkillsInput {
    fn default() -> Self {
        SkillsInput::List(Vec::new())
    }
}

impl SkillsInput {
    /// Trimmed, upper-cased, non-empty and unique, keeping first-seen order.
    pub fn normalize(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            SkillsInput::Text(text) => text.split(',').collect(),
            SkillsInput::List(items) => items.iter().map(String::as_str).collect(),
        };
        let mut skills: Vec<String> = Vec::new();
        for skill in raw {
            let skill = skill.trim().to_uppercase();
            if !skill.is_empty() && !skills.contains(&skill) {
                skills.push(skill);
            }
        }
        skills
    }
}

/// Body of create and update requests. Every field is optional on the wire so that
/// missing values produce one readable message instead of a deserializer error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub company_id: Option<Uuid>,
    pub job_type: Option<JobType>,
    pub experience_level: Option<ExperienceLevel>,
    pub employment_type: Option<EmploymentType>,
    pub working_type: Option<WorkingType>,
    pub payment_from: Option<Decimal>,
    pub payment_to: Option<Decimal>,
    pub valid_until: Option<String>,
    pub is_active: Option<bool>,
    pub skills: Option<SkillsInput>,
}

/// A checked job payload ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInput {
    pub title: String,
    pub description: String,
    pub company_id: Uuid,
    pub job_type: JobType,
    pub experience_level: Option<ExperienceLevel>,
    pub employment_type: EmploymentType,
    pub working_type: WorkingType,
    pub payment_from: Decimal,
    pub payment_to: Decimal,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub skills: Vec<String>,
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (end of that day, UTC).
pub fn parse_valid_until(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| dt.and_utc())
}

fn required_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl JobPayload {
    pub fn into_input(self) -> Result<JobInput> {
        let missing = || Error::BadRequest("Missing required fields".into());

        let title = required_text(self.title).ok_or_else(missing)?;
        let description = required_text(self.description).ok_or_else(missing)?;
        let company_id = self.company_id.ok_or_else(missing)?;
        let job_type = self.job_type.ok_or_else(missing)?;
        let employment_type = self.employment_type.ok_or_else(missing)?;
        let working_type = self.working_type.ok_or_else(missing)?;

        let valid_until = self
            .valid_until
            .as_deref()
            .and_then(parse_valid_until)
            .ok_or_else(|| Error::BadRequest("Valid until date is invalid".into()))?;

        let payment_from = self.payment_from.unwrap_or(Decimal::ZERO);
        let payment_to = self.payment_to.unwrap_or(Decimal::ZERO);
        if payment_from.is_sign_negative() || payment_to.is_sign_negative() {
            return Err(Error::BadRequest("Payment must be a non-negative number".into()));
        }
        if payment_from > payment_to {
            return Err(Error::BadRequest(
                "Payment from must not exceed payment to".into(),
            ));
        }

        Ok(JobInput {
            title,
            description,
            company_id,
            job_type,
            experience_level: self.experience_level,
            employment_type,
            working_type,
            payment_from,
            payment_to,
            valid_until,
            is_active: self.is_active.unwrap_or(true),
            skills: self.skills.unwrap_or_default().normalize(),
        })
    }
}

/// Filters of the public job listing. Repeated keys (`job_type=DEVELOPER&job_type=TESTER`)
/// match any of the given values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobFilterQuery {
    pub title: Option<String>,
    pub job_type: Vec<JobType>,
    pub employment_type: Vec<EmploymentType>,
    pub working_type: Vec<WorkingType>,
    pub experience_level: Vec<ExperienceLevel>,
    pub skills: Vec<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl JobFilterQuery {
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn title_pattern(&self) -> Option<String> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| format!("%{}%", escape_like(t)))
    }

    pub fn normalized_skills(&self) -> Vec<String> {
        SkillsInput::List(self.skills.clone()).normalize()
    }
}

/// Escapes LIKE wildcards so user input matches literally.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCompany {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
}

impl From<Company> for JobCompany {
    fn from(value: Company) -> Self {
        Self {
            id: value.id,
            name: value.name,
            image_url: value.image_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub company_id: Uuid,
    pub author_id: Uuid,
    pub job_type: JobType,
    pub experience_level: Option<ExperienceLevel>,
    pub employment_type: EmploymentType,
    pub working_type: WorkingType,
    pub payment_from: Decimal,
    pub payment_to: Decimal,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub company: Option<JobCompany>,
    pub skills: Vec<String>,
}

impl From<JobDetails> for JobResponse {
    fn from(value: JobDetails) -> Self {
        let job = value.job;
        Self {
            id: job.id,
            title: job.title,
            description: job.description,
            company_id: job.company_id,
            author_id: job.author_id,
            job_type: job.job_type,
            experience_level: job.experience_level,
            employment_type: job.employment_type,
            working_type: job.working_type,
            payment_from: job.payment_from,
            payment_to: job.payment_to,
            valid_until: job.valid_until,
            is_active: job.is_active,
            created_at: job.created_at,
            updated_at: job.updated_at,
            company: value.company.map(JobCompany::from),
            skills: value.skills,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListResponse {
    pub items: Vec<JobResponse>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
    pub has_more: bool,
}

impl From<JobPage> for JobListResponse {
    fn from(value: JobPage) -> Self {
        let has_more = value.offset + (value.items.len() as i64) < value.total;
        Self {
            items: value.items.into_iter().map(JobResponse::from).collect(),
            total: value.total,
            offset: value.offset,
            limit: value.limit,
            has_more,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMutationResponse {
    pub success: String,
    pub data: JobResponse,
}
