use axum::Json;
use utoipa::OpenApi;

use crate::routes::{admin, applications, auth, companies, health, jobs, oauth, uploads};

#[derive(OpenApi)]
#[openapi(
    info(title = "Job board API", description = "Vacancies, companies, applications and accounts"),
    paths(
        health::health,
        auth::register,
        auth::login,
        auth::logout,
        auth::new_verification,
        auth::reset,
        auth::new_password,
        auth::me,
        auth::settings,
        oauth::oauth_login,
        oauth::oauth_callback,
        companies::create_company,
        companies::update_company,
        companies::delete_company,
        companies::list_my_companies,
        companies::get_company,
        companies::check_owner,
        jobs::create_job,
        jobs::update_job,
        jobs::delete_job,
        jobs::get_job,
        jobs::duplicate_job,
        jobs::list_my_jobs,
        jobs::list_public_jobs,
        jobs::get_public_job,
        applications::create_application,
        applications::list_received_applications,
        applications::list_my_applications,
        applications::update_application_status,
        applications::delete_application,
        uploads::upload_resume,
        uploads::download_resume,
        uploads::upload_company_image,
        admin::admin_status,
        admin::list_users,
        admin::update_user_role,
        admin::delete_user,
        admin::list_companies,
        admin::list_applications,
    ),
    tags(
        (name = "jobboard", description = "Job board backend")
    )
)]
pub struct ApiDoc;

#[axum::debug_handler]
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
