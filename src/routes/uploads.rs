use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    middleware::auth::{AuthUser, MaybeAuthUser},
    services::storage_service::{file_url, Bucket},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: Uuid,
    pub url: String,
}

/// Reads the `file` part of a multipart body.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let data = field.bytes().await?;
            return Ok((filename, data));
        }
    }
    Err(Error::BadRequest("Missing file field".into()))
}

#[utoipa::path(
    post,
    path = "/api/uploads/resumes",
    request_body(content = String, content_type = "multipart/form-data", description = "`file`: pdf, doc, docx, txt or rtf up to 10 MB"),
    responses(
        (status = 201, description = "Resume stored", body = UploadResponse),
        (status = 400, description = "Missing, empty, oversized or disallowed file")
    )
)]
#[axum::debug_handler]
pub async fn upload_resume(
    State(state): State<AppState>,
    MaybeAuthUser(auth): MaybeAuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (filename, data) = read_file_field(&mut multipart).await?;
    let stored = state
        .storage_service
        .save(Bucket::Resumes, auth.map(|a| a.id), &filename, data)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: stored.id,
            url: file_url(&stored),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/uploads/resumes/{id}",
    params(
        ("id" = Uuid, Path, description = "Stored file ID")
    ),
    responses(
        (status = 200, description = "Resume file contents"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Caller may not read this resume"),
        (status = 404, description = "File not found")
    )
)]
#[axum::debug_handler]
pub async fn download_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let file = state.storage_service.get(id, Bucket::Resumes).await?;

    let allowed = auth.is_admin()
        || file.owner_id == Some(auth.id)
        || state
            .application_service
            .author_received_resume(auth.id, file.id)
            .await?;
    if !allowed {
        tracing::warn!(file_id = %id, user_id = %auth.id, "resume access denied");
        return Err(Error::Forbidden("Not authorized to access this file".into()));
    }

    let data = state.storage_service.read(&file).await?;
    let disposition = format!(
        "inline; filename=\"{}\"",
        file.original_name.replace(['"', '\\', '\r', '\n'], "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}

#[utoipa::path(
    post,
    path = "/api/uploads/company-images",
    request_body(content = String, content_type = "multipart/form-data", description = "`file`: jpg, png or webp up to 5 MB"),
    responses(
        (status = 201, description = "Image stored and publicly served", body = UploadResponse),
        (status = 400, description = "Missing, empty, oversized or disallowed file"),
        (status = 401, description = "Not signed in")
    )
)]
#[axum::debug_handler]
pub async fn upload_company_image(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (filename, data) = read_file_field(&mut multipart).await?;
    let stored = state
        .storage_service
        .save(Bucket::CompanyImages, Some(auth.id), &filename, data)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: stored.id,
            url: file_url(&stored),
        }),
    ))
}
