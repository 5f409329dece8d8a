use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use axum_extra::extract::Query;
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::job_dto::{JobFilterQuery, JobListResponse, JobMutationResponse, JobPayload, JobResponse},
    error::Result,
    middleware::auth::AuthUser,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/jobs",
    request_body = JobPayload,
    responses(
        (status = 201, description = "Job created successfully", body = JobMutationResponse),
        (status = 400, description = "Missing required fields or invalid values"),
        (status = 403, description = "Company belongs to someone else"),
        (status = 404, description = "Company not found")
    )
)]
#[axum::debug_handler]
pub async fn create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<JobPayload>,
) -> Result<impl IntoResponse> {
    let input = payload.into_input()?;
    let job = state.job_service.create(&auth, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(JobMutationResponse {
            success: "Job created successfully".into(),
            data: job.into(),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    request_body = JobPayload,
    responses(
        (status = 200, description = "Job updated successfully", body = JobMutationResponse),
        (status = 400, description = "Missing required fields or invalid values"),
        (status = 403, description = "Not authorized to edit this job"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn update_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<JobPayload>,
) -> Result<impl IntoResponse> {
    let input = payload.into_input()?;
    let job = state.job_service.update(id, &auth, input).await?;
    Ok(Json(JobMutationResponse {
        success: "Job updated successfully".into(),
        data: job.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job deleted"),
        (status = 403, description = "Not authorized to delete this job"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.job_service.delete(id, &auth).await?;
    Ok(Json(json!({ "success": true })))
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job with company and skills", body = JobResponse),
        (status = 403, description = "Not authorized to access this job"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let job = state.job_service.get_owned(id, &auth).await?;
    Ok(Json(JobResponse::from(job)))
}

#[utoipa::path(
    post,
    path = "/api/jobs/{id}/duplicate",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 201, description = "Inactive copy created", body = JobMutationResponse),
        (status = 403, description = "Not authorized to duplicate this job"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn duplicate_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let job = state.job_service.duplicate(id, &auth).await?;
    Ok((
        StatusCode::CREATED,
        Json(JobMutationResponse {
            success: "Job duplicated successfully".into(),
            data: job.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/jobs/mine",
    responses(
        (status = 200, description = "Jobs authored by the caller, by title", body = [JobResponse]),
        (status = 401, description = "Not signed in")
    )
)]
#[axum::debug_handler]
pub async fn list_my_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let jobs = state.job_service.list_by_author(auth.id).await?;
    let items: Vec<JobResponse> = jobs.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/public/jobs",
    params(
        ("title" = Option<String>, Query, description = "Case-insensitive title substring"),
        ("job_type" = Option<Vec<String>>, Query, description = "Repeatable job type filter"),
        ("employment_type" = Option<Vec<String>>, Query, description = "Repeatable employment type filter"),
        ("working_type" = Option<Vec<String>>, Query, description = "Repeatable working type filter"),
        ("experience_level" = Option<Vec<String>>, Query, description = "Repeatable experience level filter"),
        ("skills" = Option<Vec<String>>, Query, description = "Job must list at least one of these skills"),
        ("offset" = Option<i64>, Query, description = "Number of jobs to skip"),
        ("limit" = Option<i64>, Query, description = "Page size, 1 to 100")
    ),
    responses(
        (status = 200, description = "Active jobs ordered by validity date", body = JobListResponse),
        (status = 400, description = "Unknown enum value in a filter")
    )
)]
#[axum::debug_handler]
pub async fn list_public_jobs(
    State(state): State<AppState>,
    Query(filter): Query<JobFilterQuery>,
) -> Result<impl IntoResponse> {
    let page = state.job_service.list_public(&filter).await?;
    Ok(Json(JobListResponse::from(page)))
}

#[utoipa::path(
    get,
    path = "/api/public/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Active job", body = JobResponse),
        (status = 404, description = "Job not found or inactive")
    )
)]
#[axum::debug_handler]
pub async fn get_public_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let job = state.job_service.get_public(id).await?;
    Ok(Json(JobResponse::from(job)))
}
