use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::application::{ApplicationStatus, ApplicationWithJob, JobApplication};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApplicationPayload {
    #[validate(custom(function = "crate::utils::validation::not_blank"))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(custom(function = "crate::utils::validation::not_blank"))]
    pub cover_letter: String,
    pub resume_url: Option<String>,
    pub job_vacancy_id: Uuid,
}

impl ApplicationPayload {
    pub fn normalized(mut self) -> Self {
        self.full_name = self.full_name.trim().to_string();
        self.email = self.email.trim().to_string();
        self.phone = self
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self.resume_url = self
            .resume_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationFilterQuery {
    pub status: Option<ApplicationStatus>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: ApplicationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub job_vacancy_id: Uuid,
    pub user_id: Option<Uuid>,
    pub applicant_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub cover_letter: String,
    pub resume_url: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<JobApplication> for ApplicationResponse {
    fn from(value: JobApplication) -> Self {
        Self {
            id: value.id,
            job_vacancy_id: value.job_vacancy_id,
            user_id: value.user_id,
            applicant_name: value.applicant_name,
            email: value.email,
            phone: value.phone,
            cover_letter: value.cover_letter,
            resume_url: value.resume_url,
            status: value.status,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationJob {
    pub id: Uuid,
    pub title: String,
    pub is_active: bool,
    pub company_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationWithJobResponse {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub job: ApplicationJob,
}

impl From<ApplicationWithJob> for ApplicationWithJobResponse {
    fn from(value: ApplicationWithJob) -> Self {
        Self {
            job: ApplicationJob {
                id: value.job_vacancy_id,
                title: value.job_title,
                is_active: value.job_is_active,
                company_name: value.company_name,
            },
            application: ApplicationResponse {
                id: value.id,
                job_vacancy_id: value.job_vacancy_id,
                user_id: value.user_id,
                applicant_name: value.applicant_name,
                email: value.email,
                phone: value.phone,
                cover_letter: value.cover_letter,
                resume_url: value.resume_url,
                status: value.status,
                created_at: value.created_at,
                updated_at: value.updated_at,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationMutationResponse {
    pub success: String,
    pub data: ApplicationResponse,
}
