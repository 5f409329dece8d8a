pub mod admin;
pub mod applications;
pub mod auth;
pub mod companies;
pub mod docs;
pub mod health;
pub mod jobs;
pub mod oauth;
pub mod uploads;

use std::path::Path;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::{
    middleware::{
        auth::require_admin,
        cors::frontend_cors,
        rate_limit::{new_rps_state, rps_middleware},
        route_guard::route_guard,
    },
    error::Error,
    AppState,
};

const BODY_LIMIT_BYTES: usize = 12 * 1024 * 1024;

/// Builds the full application: API routers, static files, the route guard and
/// the shared tower layers.
pub fn app_router(state: AppState) -> Router {
    let config = state.config.clone();

    let base_routes = Router::new()
        .route("/health", get(health::health))
        .route("/api/openapi.json", get(docs::openapi_json));

    let public_api = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/new-verification", post(auth::new_verification))
        .route("/api/auth/reset", post(auth::reset))
        .route("/api/auth/new-password", post(auth::new_password))
        .route("/api/auth/:provider/login", get(oauth::oauth_login))
        .route("/api/auth/:provider/callback", get(oauth::oauth_callback))
        .route("/api/public/jobs", get(jobs::list_public_jobs))
        .route("/api/public/jobs/:id", get(jobs::get_public_job))
        .route("/api/public/companies/:id", get(companies::get_company))
        .layer(from_fn_with_state(
            new_rps_state(config.public_rps, config.trust_proxy),
            rps_middleware,
        ));

    let api = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/settings", patch(auth::settings))
        .route("/api/companies", post(companies::create_company))
        .route("/api/companies/mine", get(companies::list_my_companies))
        .route(
            "/api/companies/:id",
            axum::routing::put(companies::update_company).delete(companies::delete_company),
        )
        .route("/api/companies/:id/owner", get(companies::check_owner))
        .route("/api/jobs", post(jobs::create_job))
        .route("/api/jobs/mine", get(jobs::list_my_jobs))
        .route(
            "/api/jobs/:id",
            get(jobs::get_job)
                .put(jobs::update_job)
                .delete(jobs::delete_job),
        )
        .route("/api/jobs/:id/duplicate", post(jobs::duplicate_job))
        .route("/api/applications", post(applications::create_application))
        .route(
            "/api/applications/received",
            get(applications::list_received_applications),
        )
        .route("/api/applications/mine", get(applications::list_my_applications))
        .route(
            "/api/applications/:id",
            delete(applications::delete_application),
        )
        .route(
            "/api/applications/:id/status",
            patch(applications::update_application_status),
        )
        .route("/api/uploads/resumes", post(uploads::upload_resume))
        .route("/api/uploads/resumes/:id", get(uploads::download_resume))
        .route(
            "/api/uploads/company-images",
            post(uploads::upload_company_image),
        )
        .layer(from_fn_with_state(
            new_rps_state(config.api_rps, config.trust_proxy),
            rps_middleware,
        ));

    let admin_api = Router::new()
        .route("/api/admin", get(admin::admin_status))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id", delete(admin::delete_user))
        .route("/api/admin/users/:id/role", patch(admin::update_user_role))
        .route("/api/admin/companies", get(admin::list_companies))
        .route("/api/admin/companies/:id", delete(companies::delete_company))
        .route("/api/admin/applications", get(admin::list_applications))
        .route_layer(from_fn_with_state(state.clone(), require_admin))
        .layer(from_fn_with_state(
            new_rps_state(config.api_rps, config.trust_proxy),
            rps_middleware,
        ));

    let public_uploads = state.storage_service.public_dir();
    tracing::info!(path = %public_uploads.display(), "serving public uploads");

    let mut app = base_routes
        .merge(public_api)
        .merge(api)
        .merge(admin_api)
        .nest_service("/uploads/public", ServeDir::new(public_uploads));

    if let Some(dir) = config.frontend_dir.as_deref() {
        tracing::info!(path = dir, "serving frontend");
        let index = Path::new(dir).join("index.html");
        app = app.fallback_service(ServeDir::new(dir).not_found_service(ServeFile::new(index)));
    } else {
        app = app.fallback(not_found);
    }

    app.layer(from_fn_with_state(state.clone(), route_guard))
        .with_state(state)
        .layer(frontend_cors(&config.app_url))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
}

async fn not_found() -> Error {
    Error::NotFound("Not found".into())
}
