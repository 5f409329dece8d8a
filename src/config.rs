use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub app_url: String,
    pub public_rps: u32,
    pub api_rps: u32,
    pub trust_proxy: bool,
    pub uploads_dir: String,
    pub frontend_dir: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    pub github: Option<OAuthClientConfig>,
    pub google: Option<OAuthClientConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let smtp = match env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()) {
            Some(host) => Some(SmtpConfig {
                host,
                port: get_env_parse_or("SMTP_PORT", 587)?,
                username: env::var("SMTP_USER").ok(),
                password: env::var("SMTP_PASS").ok(),
            }),
            None => None,
        };

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            session_ttl_hours: get_env_parse_or("SESSION_TTL_HOURS", 24)?,
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            public_rps: get_env_parse_or("PUBLIC_RPS", 100)?,
            api_rps: get_env_parse_or("API_RPS", 100)?,
            trust_proxy: get_env_parse_or("TRUST_PROXY", false)?,
            uploads_dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            frontend_dir: env::var("FRONTEND_DIR").ok().filter(|d| !d.is_empty()),
            smtp,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Job Board <no-reply@jobboard.local>".to_string()),
            github: oauth_client("GITHUB"),
            google: oauth_client("GOOGLE"),
        })
    }
}

fn oauth_client(prefix: &str) -> Option<OAuthClientConfig> {
    let client_id = env::var(format!("{}_CLIENT_ID", prefix)).ok()?;
    let client_secret = env::var(format!("{}_CLIENT_SECRET", prefix)).ok()?;
    if client_id.is_empty() || client_secret.is_empty() {
        return None;
    }
    Some(OAuthClientConfig {
        client_id,
        client_secret,
    })
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
