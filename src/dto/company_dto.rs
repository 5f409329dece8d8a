use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::dto::job_dto::JobResponse;
use crate::models::company::Company;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompanyPayload {
    #[validate(custom(function = "crate::utils::validation::not_blank"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom(function = "crate::utils::validation::image_url"))]
    pub image_url: Option<String>,
}

impl CompanyPayload {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.image_url = self.image_url.filter(|u| !u.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Company> for CompanyResponse {
    fn from(value: Company) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            image_url: value.image_url,
            owner_id: value.owner_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyDetailResponse {
    #[serde(flatten)]
    pub company: CompanyResponse,
    pub jobs: Vec<JobResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyMutationResponse {
    pub success: String,
    pub data: CompanyResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipResponse {
    pub is_owner: bool,
}
