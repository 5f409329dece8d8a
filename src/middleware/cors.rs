use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any)
}

/// Credentialed CORS for the frontend origin so the session cookie is sent along.
pub fn frontend_cors(app_url: &str) -> CorsLayer {
    match HeaderValue::from_str(app_url.trim_end_matches('/')) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::PUT,
                Method::DELETE,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        Err(_) => {
            tracing::warn!(app_url, "APP_URL is not a valid origin, falling back to permissive CORS");
            permissive_cors()
        }
    }
}
