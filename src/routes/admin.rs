use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::{
        application_dto::{ApplicationFilterQuery, ApplicationWithJobResponse},
        auth_dto::{MessageResponse, UpdateRolePayload, UserResponse},
        company_dto::CompanyResponse,
    },
    error::{Error, Result},
    middleware::auth::AuthUser,
    services::application_service::ApplicationScope,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/admin",
    responses(
        (status = 200, description = "Caller is an admin"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Caller is not an admin")
    )
)]
#[axum::debug_handler(state = AppState)]
pub async fn admin_status(auth: AuthUser) -> impl IntoResponse {
    Json(json!({ "ok": true, "user_id": auth.id }))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All users, newest first", body = [UserResponse]),
        (status = 403, description = "Caller is not an admin")
    )
)]
#[axum::debug_handler]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let users = state.user_service.list().await?;
    let items: Vec<UserResponse> = users.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/role",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateRolePayload,
    responses(
        (status = 200, description = "Role changed", body = UserResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    )
)]
#[axum::debug_handler]
pub async fn update_user_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRolePayload>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.update_role(id, payload.role).await?;
    tracing::info!(user_id = %id, admin_id = %auth.id, role = payload.role.as_str(), "user role changed");
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Admins cannot delete themselves"),
        (status = 404, description = "User not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    if id == auth.id {
        return Err(Error::BadRequest("You cannot delete your own account".into()));
    }
    if !state.user_service.delete(id).await? {
        return Err(Error::NotFound("User not found".into()));
    }
    tracing::info!(user_id = %id, admin_id = %auth.id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted")))
}

#[utoipa::path(
    get,
    path = "/api/admin/companies",
    responses(
        (status = 200, description = "All companies by name", body = [CompanyResponse]),
        (status = 403, description = "Caller is not an admin")
    )
)]
#[axum::debug_handler]
pub async fn list_companies(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let companies = state.company_service.list_all().await?;
    let items: Vec<CompanyResponse> = companies.into_iter().map(Into::into).collect();
    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/admin/applications",
    params(
        ("status" = Option<String>, Query, description = "Only applications in this status"),
        ("name" = Option<String>, Query, description = "Case-insensitive applicant name substring")
    ),
    responses(
        (status = 200, description = "All applications, newest first", body = [ApplicationWithJobResponse]),
        (status = 403, description = "Caller is not an admin")
    )
)]
#[axum::debug_handler]
pub async fn list_applications(
    State(state): State<AppState>,
    Query(filter): Query<ApplicationFilterQuery>,
) -> Result<impl IntoResponse> {
    let rows = state
        .application_service
        .list(ApplicationScope::All, &filter)
        .await?;
    let items: Vec<ApplicationWithJobResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(items))
}
