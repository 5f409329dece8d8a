use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        application_dto::{
            ApplicationFilterQuery, ApplicationMutationResponse, ApplicationPayload,
            ApplicationResponse, ApplicationWithJobResponse, UpdateStatusPayload,
        },
        auth_dto::MessageResponse,
    },
    error::Result,
    middleware::auth::{AuthUser, MaybeAuthUser},
    services::application_service::ApplicationScope,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/applications",
    request_body = ApplicationPayload,
    responses(
        (status = 201, description = "Application created successfully", body = ApplicationMutationResponse),
        (status = 400, description = "Invalid fields or resume URL"),
        (status = 403, description = "Resume belongs to another user"),
        (status = 404, description = "Job or resume not found")
    )
)]
#[axum::debug_handler]
pub async fn create_application(
    State(state): State<AppState>,
    MaybeAuthUser(auth): MaybeAuthUser,
    Json(payload): Json<ApplicationPayload>,
) -> Result<impl IntoResponse> {
    let payload = payload.normalized();
    payload.validate()?;
    let application = state
        .application_service
        .create(auth.map(|a| a.id), payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationMutationResponse {
            success: "Application created successfully".into(),
            data: ApplicationResponse::from(application),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/applications/received",
    params(
        ("status" = Option<String>, Query, description = "Only applications in this status"),
        ("name" = Option<String>, Query, description = "Case-insensitive applicant name substring")
    ),
    responses(
        (status = 200, description = "Applications to the caller's jobs, newest first", body = [ApplicationWithJobResponse]),
        (status = 401, description = "Not signed in")
    )
)]
#[axum::debug_handler]
pub async fn list_received_applications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<ApplicationFilterQuery>,
) -> Result<impl IntoResponse> {
    let rows = state
        .application_service
        .list(ApplicationScope::JobsAuthoredBy(auth.id), &filter)
        .await?;
    let items: Vec<ApplicationWithJobResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/applications/mine",
    responses(
        (status = 200, description = "Applications submitted by the caller", body = [ApplicationWithJobResponse]),
        (status = 401, description = "Not signed in")
    )
)]
#[axum::debug_handler]
pub async fn list_my_applications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let rows = state.application_service.list_mine(auth.id).await?;
    let items: Vec<ApplicationWithJobResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    patch,
    path = "/api/applications/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status changed", body = ApplicationResponse),
        (status = 403, description = "Caller is neither the job author nor an admin"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn update_application_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse> {
    let application = state
        .application_service
        .update_status(id, &auth, payload.status)
        .await?;
    Ok(Json(ApplicationResponse::from(application)))
}

#[utoipa::path(
    delete,
    path = "/api/applications/{id}",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Application deleted", body = MessageResponse),
        (status = 403, description = "Caller is neither the job author nor an admin"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.application_service.delete(id, &auth).await?;
    Ok(Json(MessageResponse::new("Application deleted successfully")))
}
