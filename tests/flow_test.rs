//! End-to-end flows against a real database. Skipped unless DATABASE_URL is set.

use std::env;

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, Request, StatusCode},
    Router,
};
use jobboard_backend::{
    config::Config,
    database::pool::create_pool,
    error::Error,
    middleware::auth::issue_session_token,
    routes::app_router,
    services::user_service::{UserService, OAUTH_ACCOUNT_NOT_LINKED},
    AppState,
};
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "flow_test_secret";
const BOUNDARY: &str = "jobboard-flow-boundary";

struct TestApp {
    router: Router,
    pool: PgPool,
}

async fn setup() -> Option<TestApp> {
    dotenvy::dotenv().ok();
    let database_url = env::var("DATABASE_URL").ok()?;

    let config = Config {
        server_address: "127.0.0.1:0".into(),
        database_url,
        jwt_secret: SECRET.into(),
        session_ttl_hours: 1,
        app_url: "http://localhost:3000".into(),
        public_rps: 1000,
        api_rps: 1000,
        trust_proxy: false,
        uploads_dir: env::temp_dir()
            .join(format!("jobboard-flow-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned(),
        frontend_dir: None,
        smtp: None,
        mail_from: "Job Board <no-reply@jobboard.local>".into(),
        github: None,
        google: None,
    };

    let pool = create_pool(&config).await.expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    let state = AppState::new(pool.clone(), config).expect("state");
    Some(TestApp {
        router: app_router(state),
        pool,
    })
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let (status, bytes) = self.call(req).await;
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    async fn call(&self, req: Request<Body>) -> (StatusCode, Bytes) {
        let res = self.router.clone().oneshot(req).await.expect("response");
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
        (status, bytes)
    }

    /// Uploads `cv.pdf` to the resume bucket.
    async fn upload_resume(&self, token: Option<&str>, contents: &str) -> (StatusCode, JsonValue) {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cv.pdf\"\r\nContent-Type: application/pdf\r\n\r\n{contents}\r\n--{b}--\r\n",
            b = BOUNDARY,
        );
        let mut builder = Request::post("/api/uploads/resumes").header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let (status, bytes) = self
            .call(builder.body(Body::from(body)).expect("request"))
            .await;
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    async fn download(&self, uri: &str, token: &str) -> (StatusCode, Bytes) {
        let req = Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .expect("request");
        self.call(req).await
    }

    /// Creates a company and an active job owned by the caller, returning the job id.
    async fn posted_job(&self, token: &str, title: &str) -> String {
        let (status, company) = self
            .send(
                "POST",
                "/api/companies",
                Some(token),
                Some(json!({ "name": format!("{} Inc", title) })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", company);
        let (status, job) = self
            .send(
                "POST",
                "/api/jobs",
                Some(token),
                Some(json!({
                    "title": title,
                    "description": "Ship things",
                    "company_id": company["data"]["id"],
                    "job_type": "DEVELOPER",
                    "employment_type": "B2B",
                    "working_type": "REMOTE",
                    "payment_from": 1000,
                    "payment_to": 2000,
                    "valid_until": "2099-01-01",
                    "skills": ["rust"],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", job);
        job["data"]["id"].as_str().expect("job id").to_string()
    }

    async fn set_role(&self, user_id: &str, role: &str) {
        sqlx::query("UPDATE users SET role = $2::user_role WHERE id = $1")
            .bind(Uuid::parse_str(user_id).expect("uuid"))
            .bind(role)
            .execute(&self.pool)
            .await
            .expect("role update");
    }

    async fn verification_token(&self, email: &str) -> String {
        sqlx::query_scalar("SELECT token FROM verification_tokens WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .expect("verification token")
    }

    /// Registers, verifies and signs in a fresh account, returning (user id, session token).
    async fn signed_in_user(&self, label: &str) -> (String, String) {
        let email = format!("{}_{}@example.com", label, Uuid::new_v4().simple());
        let password = "hunter22";

        let (status, _) = self
            .send(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "email": email, "password": password, "name": label })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let token = self.verification_token(&email).await;
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/new-verification",
                None,
                Some(json!({ "token": token })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let (status, body) = self
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        (
            body["user"]["id"].as_str().expect("user id").to_string(),
            body["token"].as_str().expect("session token").to_string(),
        )
    }
}

#[tokio::test]
async fn unverified_login_resends_confirmation_and_verification_unlocks_it() {
    let Some(app) = setup().await else { return };
    let email = format!("verify_{}@example.com", Uuid::new_v4().simple());

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": "hunter22", "name": "Ver" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": "hunter22", "name": "Ver" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already in use");

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], "Confirmation email sent");
    assert!(body.get("token").is_none());

    let token = app.verification_token(&email).await;
    let (status, _) = app
        .send(
            "POST",
            "/api/auth/new-verification",
            None,
            Some(json!({ "token": token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/new-verification",
            None,
            Some(json!({ "token": token })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Token does not exist!");

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect_to"], "/panel/jobs");
    let session = body["token"].as_str().expect("token").to_string();

    let (status, me) = app.send("GET", "/api/auth/me", Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], email.as_str());
    assert!(me["email_verified"].is_string());
}

#[tokio::test]
async fn two_factor_login_requires_the_mailed_code() {
    let Some(app) = setup().await else { return };
    let (_, session) = app.signed_in_user("twofactor").await;

    let (status, body) = app
        .send(
            "PATCH",
            "/api/auth/settings",
            Some(&session),
            Some(json!({ "is_two_factor_enabled": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], "Settings Updated!");

    let (_, me) = app.send("GET", "/api/auth/me", Some(&session), None).await;
    assert_eq!(me["is_two_factor_enabled"], true);
    let email = me["email"].as_str().expect("email").to_string();

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "two_factor": true }));

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "hunter22", "code": "000000x" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid code!");

    let code: String = sqlx::query_scalar("SELECT token FROM two_factor_tokens WHERE email = $1")
        .bind(&email)
        .fetch_one(&app.pool)
        .await
        .expect("two factor token");
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "hunter22", "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["token"].is_string());

    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM two_factor_tokens WHERE email = $1")
            .bind(&email)
            .fetch_one(&app.pool)
            .await
            .expect("count");
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn jobs_are_owned_filtered_and_duplicated() {
    let Some(app) = setup().await else { return };
    let (author_id, author) = app.signed_in_user("author").await;
    let (_, stranger) = app.signed_in_user("stranger").await;
    let skill = format!("skill{}", Uuid::new_v4().simple());

    let (status, company) = app
        .send(
            "POST",
            "/api/companies",
            Some(&author),
            Some(json!({ "name": "  Ferris Labs ", "description": "Crabs" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", company);
    let company_id = company["data"]["id"].as_str().expect("company id").to_string();
    assert_eq!(company["data"]["name"], "Ferris Labs");

    let job_body = json!({
        "title": "Backend engineer",
        "description": "Build services",
        "company_id": company_id,
        "job_type": "DEVELOPER",
        "experience_level": "SENIOR",
        "employment_type": "B2B",
        "working_type": "REMOTE",
        "payment_from": 9000,
        "payment_to": 12000,
        "valid_until": "2099-12-31",
        "skills": format!("rust, {} ,rust", skill),
    });

    let (status, body) = app
        .send("POST", "/api/jobs", Some(&stranger), Some(job_body.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized to post jobs for this company");

    let (status, created) = app
        .send("POST", "/api/jobs", Some(&author), Some(job_body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    let job = &created["data"];
    let job_id = job["id"].as_str().expect("job id").to_string();
    assert_eq!(job["author_id"], author_id.as_str());
    assert_eq!(job["is_active"], true);
    assert_eq!(job["skills"], json!(["RUST", skill.to_uppercase()]));
    assert_eq!(job["company"]["name"], "Ferris Labs");

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/jobs/{}", job_id),
            Some(&stranger),
            Some(job_body.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized to edit this job");

    let (status, copy) = app
        .send(
            "POST",
            &format!("/api/jobs/{}/duplicate", job_id),
            Some(&author),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", copy);
    assert_eq!(copy["data"]["title"], "Backend engineer (Copy)");
    assert_eq!(copy["data"]["is_active"], false);
    assert_eq!(copy["data"]["skills"], job["skills"]);

    let (status, page) = app
        .send(
            "GET",
            &format!(
                "/api/public/jobs?skills={}&working_type=REMOTE&working_type=HYBRID&limit=5",
                skill
            ),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 5);
    assert_eq!(page["has_more"], false);
    assert_eq!(page["items"][0]["id"], job_id.as_str());

    let (status, page) = app
        .send(
            "GET",
            &format!("/api/public/jobs?skills={}&working_type=OFFICE", skill),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);

    let (status, mine) = app.send("GET", "/api/jobs/mine", Some(&author), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().expect("list").len(), 2);

    let (status, detail) = app
        .send(
            "GET",
            &format!("/api/public/companies/{}", company_id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["jobs"].as_array().expect("jobs").len(), 1);

    let copy_id = copy["data"]["id"].as_str().expect("copy id").to_string();
    let (status, _) = app
        .send("GET", &format!("/api/public/jobs/{}", copy_id), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(
            "DELETE",
            &format!("/api/jobs/{}", copy_id),
            Some(&author),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn applications_reach_the_job_author() {
    let Some(app) = setup().await else { return };
    let (_, author) = app.signed_in_user("recruiter").await;
    let (_, applicant) = app.signed_in_user("applicant").await;

    let (_, company) = app
        .send(
            "POST",
            "/api/companies",
            Some(&author),
            Some(json!({ "name": "Hiring Co" })),
        )
        .await;
    let company_id = company["data"]["id"].as_str().expect("company id").to_string();
    let (status, created) = app
        .send(
            "POST",
            "/api/jobs",
            Some(&author),
            Some(json!({
                "title": "QA engineer",
                "description": "Break things",
                "company_id": company_id,
                "job_type": "TESTER",
                "employment_type": "CONTRACT_OF_WORK",
                "working_type": "OFFICE",
                "payment_from": 4000,
                "payment_to": 6000,
                "valid_until": "2099-01-01T00:00:00Z",
                "skills": ["selenium"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    let job_id = created["data"]["id"].as_str().expect("job id").to_string();

    let (status, applied) = app
        .send(
            "POST",
            "/api/applications",
            Some(&applicant),
            Some(json!({
                "full_name": " Ada Lovelace ",
                "email": "ada@example.com",
                "cover_letter": "I like breaking things",
                "job_vacancy_id": job_id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", applied);
    let application_id = applied["data"]["id"].as_str().expect("id").to_string();
    assert_eq!(applied["data"]["status"], "NEW");
    assert_eq!(applied["data"]["applicant_name"], "Ada Lovelace");

    let (status, received) = app
        .send(
            "GET",
            "/api/applications/received?name=ada",
            Some(&author),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let received = received.as_array().expect("list");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["job"]["title"], "QA engineer");
    assert_eq!(received[0]["job"]["company_name"], "Hiring Co");

    let (status, _) = app
        .send(
            "PATCH",
            &format!("/api/applications/{}/status", application_id),
            Some(&applicant),
            Some(json!({ "status": "ACCEPTED" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .send(
            "PATCH",
            &format!("/api/applications/{}/status", application_id),
            Some(&author),
            Some(json!({ "status": "STARRED" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "STARRED");

    let (status, starred) = app
        .send(
            "GET",
            "/api/applications/received?status=STARRED",
            Some(&author),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(starred.as_array().expect("list").len(), 1);

    let (status, mine) = app
        .send("GET", "/api/applications/mine", Some(&applicant), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine[0]["status"], "STARRED");

    let (status, _) = app
        .send(
            "DELETE",
            &format!("/api/applications/{}", application_id),
            Some(&author),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_access_follows_the_stored_role() {
    let Some(app) = setup().await else { return };
    let (admin_id, admin) = app.signed_in_user("admin").await;
    let (_, user) = app.signed_in_user("plain").await;

    let (status, _) = app.send("GET", "/api/admin", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The token was issued while the account was still a plain user.
    app.set_role(&admin_id, "ADMIN").await;
    let (status, body) = app.send("GET", "/api/admin", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let (status, users) = app.send("GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(users.as_array().expect("users").len() >= 2);

    app.set_role(&admin_id, "USER").await;
    let (status, body) = app.send("GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(Uuid::parse_str(&admin_id).expect("uuid"))
        .execute(&app.pool)
        .await
        .expect("delete");
    let (status, body) = app.send("GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "User not found");
    let (status, _) = app.send("GET", "/api/auth/me", Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn job_creation_reports_missing_fields() {
    let Some(app) = setup().await else { return };
    let (_, session) = app.signed_in_user("hasty").await;

    let (status, body) = app
        .send(
            "POST",
            "/api/jobs",
            Some(&session),
            Some(json!({ "title": "Rust developer" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");
}

#[tokio::test]
async fn expired_two_factor_codes_are_rejected() {
    let Some(app) = setup().await else { return };
    let (_, session) = app.signed_in_user("slowcode").await;
    let (status, _) = app
        .send(
            "PATCH",
            "/api/auth/settings",
            Some(&session),
            Some(json!({ "is_two_factor_enabled": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, me) = app.send("GET", "/api/auth/me", Some(&session), None).await;
    let email = me["email"].as_str().expect("email").to_string();

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["two_factor"], true);

    let code: String = sqlx::query_scalar(
        "UPDATE two_factor_tokens SET expires = NOW() - INTERVAL '1 minute' WHERE email = $1 RETURNING token",
    )
    .bind(&email)
    .fetch_one(&app.pool)
    .await
    .expect("two factor token");

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "hunter22", "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Code expired!");
}

#[tokio::test]
async fn password_reset_replaces_the_password() {
    let Some(app) = setup().await else { return };
    let (_, session) = app.signed_in_user("forgetful").await;
    let (_, me) = app.send("GET", "/api/auth/me", Some(&session), None).await;
    let email = me["email"].as_str().expect("email").to_string();

    let (status, body) = app
        .send("POST", "/api/auth/reset", None, Some(json!({ "email": email })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], "Reset email sent!");

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/new-password",
            None,
            Some(json!({ "token": "no-such-token", "password": "brandnew1" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid token!");

    let stale: String = sqlx::query_scalar(
        "UPDATE password_reset_tokens SET expires = NOW() - INTERVAL '1 minute' WHERE email = $1 RETURNING token",
    )
    .bind(&email)
    .fetch_one(&app.pool)
    .await
    .expect("reset token");
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/new-password",
            None,
            Some(json!({ "token": stale, "password": "brandnew1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Token has expired!");

    let (status, _) = app
        .send("POST", "/api/auth/reset", None, Some(json!({ "email": email })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let fresh: String =
        sqlx::query_scalar("SELECT token FROM password_reset_tokens WHERE email = $1")
            .bind(&email)
            .fetch_one(&app.pool)
            .await
            .expect("reset token");
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/new-password",
            None,
            Some(json!({ "token": fresh, "password": "brandnew1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], "Password updated!");

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "brandnew1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn settings_confirm_new_addresses_and_guard_credentials() {
    let Some(app) = setup().await else { return };
    let (user_id, session) = app.signed_in_user("mover").await;
    let new_email = format!("moved_{}@example.com", Uuid::new_v4().simple());

    let (status, body) = app
        .send(
            "PATCH",
            "/api/auth/settings",
            Some(&session),
            Some(json!({ "password": "not-my-password", "new_password": "brandnew1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Incorrect current password");

    let (status, body) = app
        .send(
            "PATCH",
            "/api/auth/settings",
            Some(&session),
            Some(json!({ "role": "ADMIN" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only administrators can change roles");

    let (status, body) = app
        .send(
            "PATCH",
            "/api/auth/settings",
            Some(&session),
            Some(json!({ "email": new_email })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(
        body["success"],
        "Verification email sent! Please confirm your new address."
    );

    let owner: Option<Uuid> =
        sqlx::query_scalar("SELECT user_id FROM verification_tokens WHERE email = $1")
            .bind(&new_email)
            .fetch_one(&app.pool)
            .await
            .expect("verification token");
    assert_eq!(owner, Some(Uuid::parse_str(&user_id).expect("uuid")));

    let token = app.verification_token(&new_email).await;
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/new-verification",
            None,
            Some(json!({ "token": token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, me) = app.send("GET", "/api/auth/me", Some(&session), None).await;
    assert_eq!(me["email"], new_email.as_str());
    assert_eq!(me["role"], "USER");
}

#[tokio::test]
async fn oauth_sessions_ignore_credential_fields_in_settings() {
    let Some(app) = setup().await else { return };
    let (user_id, _) = app.signed_in_user("oauthish").await;
    let user = UserService::new(app.pool.clone())
        .get_by_id(Uuid::parse_str(&user_id).expect("uuid"))
        .await
        .expect("lookup")
        .expect("user");
    let session = issue_session_token(SECRET, 1, &user, true).expect("token");

    let (status, body) = app
        .send(
            "PATCH",
            "/api/auth/settings",
            Some(&session),
            Some(json!({ "name": "Renamed", "email": "not-an-email", "password": "1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], "Settings Updated!");

    let (_, me) = app.send("GET", "/api/auth/me", Some(&session), None).await;
    assert_eq!(me["name"], "Renamed");
    assert_eq!(me["email"], user.email.as_str());
}

#[tokio::test]
async fn oauth_sign_in_never_claims_an_existing_account() {
    let Some(app) = setup().await else { return };
    let email = format!("claimed_{}@example.com", Uuid::new_v4().simple());
    let (status, _) = app
        .send(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": "squatter1", "name": "Squatter" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let users = UserService::new(app.pool.clone());
    let account_id = Uuid::new_v4().to_string();
    let err = users
        .find_or_create_oauth_user("google", &account_id, &email, Some("Owner"), None)
        .await
        .expect_err("existing e-mail must not be linked");
    assert!(matches!(err, Error::Conflict(ref code) if code == OAUTH_ACCOUNT_NOT_LINKED));

    let existing = users.get_by_email(&email).await.expect("lookup").expect("user");
    assert!(existing.email_verified.is_none());
    let linked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE user_id = $1")
        .bind(existing.id)
        .fetch_one(&app.pool)
        .await
        .expect("count");
    assert_eq!(linked, 0);

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "squatter1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], "Confirmation email sent");

    let fresh_email = format!("fresh_{}@example.com", Uuid::new_v4().simple());
    let created = users
        .find_or_create_oauth_user("github", &account_id, &fresh_email, Some("Fresh"), None)
        .await
        .expect("new oauth user");
    assert!(created.email_verified.is_some());
    assert!(created.password_hash.is_none());
    let again = users
        .find_or_create_oauth_user("github", &account_id, &fresh_email, Some("Fresh"), None)
        .await
        .expect("linked oauth user");
    assert_eq!(again.id, created.id);
}

#[tokio::test]
async fn companies_are_changed_by_their_owner_or_removed_by_admins() {
    let Some(app) = setup().await else { return };
    let (_, owner) = app.signed_in_user("founder").await;
    let (_, stranger) = app.signed_in_user("meddler").await;
    let (admin_id, admin) = app.signed_in_user("moderator").await;
    app.set_role(&admin_id, "ADMIN").await;

    let mut ids = Vec::new();
    for name in ["First Co", "Second Co"] {
        let (status, company) = app
            .send("POST", "/api/companies", Some(&owner), Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(company["data"]["id"].as_str().expect("id").to_string());
    }

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/companies/{}", ids[0]),
            Some(&stranger),
            Some(json!({ "name": "Hijacked" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized to edit this company");

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/companies/{}", ids[0]),
            Some(&owner),
            Some(json!({ "name": "First Company" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "First Company");

    let (status, body) = app
        .send("DELETE", &format!("/api/companies/{}", ids[0]), Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized to delete this company");

    let (status, body) = app
        .send("DELETE", &format!("/api/companies/{}", ids[0]), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], "Company deleted successfully");

    let (status, _) = app
        .send(
            "DELETE",
            &format!("/api/admin/companies/{}", ids[1]),
            Some(&stranger),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send("DELETE", &format!("/api/admin/companies/{}", ids[1]), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send("GET", &format!("/api/public/companies/{}", ids[1]), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resumes_are_readable_by_owner_admin_and_receiving_author() {
    let Some(app) = setup().await else { return };
    let (_, applicant) = app.signed_in_user("candidate").await;
    let (_, author) = app.signed_in_user("hirer").await;
    let (_, stranger) = app.signed_in_user("snoop").await;
    let (admin_id, admin) = app.signed_in_user("auditor").await;
    app.set_role(&admin_id, "ADMIN").await;

    let (status, upload) = app.upload_resume(Some(&applicant), "%PDF-1.4 my cv").await;
    assert_eq!(status, StatusCode::CREATED, "{}", upload);
    let url = upload["url"].as_str().expect("url").to_string();
    assert_eq!(url, format!("/api/uploads/resumes/{}", upload["id"].as_str().unwrap()));

    let (status, bytes) = app.download(&url, &applicant).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..], b"%PDF-1.4 my cv");
    let (status, _) = app.download(&url, &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.download(&url, &author).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let job_id = app.posted_job(&author, "Platform engineer").await;
    let (status, applied) = app
        .send(
            "POST",
            "/api/applications",
            Some(&applicant),
            Some(json!({
                "full_name": "Grace Hopper",
                "email": "grace@example.com",
                "cover_letter": "Compilers",
                "resume_url": url,
                "job_vacancy_id": job_id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", applied);

    let (status, bytes) = app.download(&url, &author).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..], b"%PDF-1.4 my cv");
    let (status, body) = app.download(&url, &stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{:?}", body);

    let (status, anonymous_upload) = app.upload_resume(None, "%PDF-1.4 walk-in").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app
        .send(
            "POST",
            "/api/applications",
            None,
            Some(json!({
                "full_name": "Walk In",
                "email": "walkin@example.com",
                "cover_letter": "Hello",
                "resume_url": anonymous_upload["url"],
                "job_vacancy_id": job_id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let (status, _) = app
        .download(anonymous_upload["url"].as_str().expect("url"), &author)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn applications_cannot_borrow_someone_elses_resume() {
    let Some(app) = setup().await else { return };
    let (_, victim) = app.signed_in_user("victim").await;
    let (_, attacker) = app.signed_in_user("attacker").await;

    let (status, upload) = app.upload_resume(Some(&victim), "%PDF-1.4 secret cv").await;
    assert_eq!(status, StatusCode::CREATED);
    let url = upload["url"].as_str().expect("url").to_string();

    let job_id = app.posted_job(&attacker, "Bait role").await;
    for token in [Some(attacker.as_str()), None] {
        let (status, body) = app
            .send(
                "POST",
                "/api/applications",
                token,
                Some(json!({
                    "full_name": "Victim",
                    "email": "victim@example.com",
                    "cover_letter": "Not really me",
                    "resume_url": url,
                    "job_vacancy_id": job_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);
        assert_eq!(body["error"], "Not authorized to use this resume");
    }

    let (status, _) = app.download(&url, &attacker).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let unknown = format!("/api/uploads/resumes/{}", Uuid::new_v4());
    for (resume_url, expected) in [
        ("https://cdn.example.com/cv.pdf", StatusCode::BAD_REQUEST),
        (unknown.as_str(), StatusCode::NOT_FOUND),
    ] {
        let (status, body) = app
            .send(
                "POST",
                "/api/applications",
                Some(&attacker),
                Some(json!({
                    "full_name": "Someone",
                    "email": "someone@example.com",
                    "cover_letter": "Hi",
                    "resume_url": resume_url,
                    "job_vacancy_id": job_id,
                })),
            )
            .await;
        assert_eq!(status, expected, "{}", body);
    }
}
