pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    application_service::ApplicationService,
    auth_service::AuthService,
    company_service::CompanyService,
    job_service::JobService,
    mail_service::{MailService, Mailer},
    oauth_service::OAuthService,
    storage_service::StorageService,
    token_service::TokenService,
    user_service::UserService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub user_service: UserService,
    pub token_service: TokenService,
    pub auth_service: AuthService,
    pub company_service: CompanyService,
    pub job_service: JobService,
    pub application_service: ApplicationService,
    pub storage_service: StorageService,
    pub oauth_service: OAuthService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Result<Self> {
        let mailer = Mailer::from_config(&config)?;
        let mail_service = MailService::new(mailer, config.app_url.clone());

        let user_service = UserService::new(pool.clone());
        let token_service = TokenService::new(pool.clone());
        let auth_service =
            AuthService::new(user_service.clone(), token_service.clone(), mail_service);
        let company_service = CompanyService::new(pool.clone());
        let job_service = JobService::new(pool.clone());
        let application_service = ApplicationService::new(pool.clone());
        let storage_service = StorageService::new(pool.clone(), config.uploads_dir.clone());
        let oauth_service = OAuthService::new(&config, user_service.clone())?;

        Ok(Self {
            pool,
            config: Arc::new(config),
            user_service,
            token_service,
            auth_service,
            company_service,
            job_service,
            application_service,
            storage_service,
            oauth_service,
        })
    }
}
