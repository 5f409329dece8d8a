use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        auth_dto::MessageResponse,
        company_dto::{
            CompanyDetailResponse, CompanyMutationResponse, CompanyPayload, CompanyResponse,
            OwnershipResponse,
        },
        job_dto::JobResponse,
    },
    error::Result,
    middleware::auth::AuthUser,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/companies",
    request_body = CompanyPayload,
    responses(
        (status = 201, description = "Company created successfully", body = CompanyMutationResponse),
        (status = 400, description = "Invalid fields"),
        (status = 401, description = "Not signed in")
    )
)]
#[axum::debug_handler]
pub async fn create_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CompanyPayload>,
) -> Result<impl IntoResponse> {
    let payload = payload.normalized();
    payload.validate()?;
    let company = state.company_service.create(auth.id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CompanyMutationResponse {
            success: "Company created successfully".into(),
            data: company.into(),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/companies/{id}",
    params(
        ("id" = Uuid, Path, description = "Company ID")
    ),
    request_body = CompanyPayload,
    responses(
        (status = 200, description = "Company updated successfully", body = CompanyMutationResponse),
        (status = 403, description = "Caller does not own the company"),
        (status = 404, description = "Company not found")
    )
)]
#[axum::debug_handler]
pub async fn update_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompanyPayload>,
) -> Result<impl IntoResponse> {
    let payload = payload.normalized();
    payload.validate()?;
    let company = state.company_service.update(id, &auth, payload).await?;
    Ok(Json(CompanyMutationResponse {
        success: "Company updated successfully".into(),
        data: company.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/companies/{id}",
    params(
        ("id" = Uuid, Path, description = "Company ID")
    ),
    responses(
        (status = 200, description = "Company deleted", body = MessageResponse),
        (status = 403, description = "Caller does not own the company"),
        (status = 404, description = "Company not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.company_service.delete(id, &auth).await?;
    Ok(Json(MessageResponse::new("Company deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/companies/mine",
    responses(
        (status = 200, description = "Companies owned by the caller", body = [CompanyResponse]),
        (status = 401, description = "Not signed in")
    )
)]
#[axum::debug_handler]
pub async fn list_my_companies(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let companies = state.company_service.list_by_owner(auth.id).await?;
    let items: Vec<CompanyResponse> = companies.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/public/companies/{id}",
    params(
        ("id" = Uuid, Path, description = "Company ID")
    ),
    responses(
        (status = 200, description = "Company with its active jobs", body = CompanyDetailResponse),
        (status = 404, description = "Company not found")
    )
)]
#[axum::debug_handler]
pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let company = state.company_service.get_by_id(id).await?;
    let jobs = state.job_service.list_active_for_company(id).await?;
    Ok(Json(CompanyDetailResponse {
        company: company.into(),
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/companies/{id}/owner",
    params(
        ("id" = Uuid, Path, description = "Company ID")
    ),
    responses(
        (status = 200, description = "Whether the caller owns the company", body = OwnershipResponse),
        (status = 401, description = "Not signed in")
    )
)]
#[axum::debug_handler]
pub async fn check_owner(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let is_owner = state.company_service.is_owner(id, auth.id).await?;
    Ok(Json(OwnershipResponse { is_owner }))
}
