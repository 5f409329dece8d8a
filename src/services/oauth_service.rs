use std::str::FromStr;
use std::time::Duration;

use reqwest::{header, Client};
use serde::Deserialize;
use url::Url;

use crate::config::{Config, OAuthClientConfig};
use crate::dto::auth_dto::normalize_email;
use crate::error::{Error, Result};
use crate::models::user::User;
use crate::services::user_service::UserService;

const USER_AGENT: &str = "jobboard-backend";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Github,
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "github",
            OAuthProvider::Google => "google",
        }
    }

    fn authorize_endpoint(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "https://github.com/login/oauth/authorize",
            OAuthProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
        }
    }

    fn token_endpoint(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "https://github.com/login/oauth/access_token",
            OAuthProvider::Google => "https://oauth2.googleapis.com/token",
        }
    }

    fn scope(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "read:user user:email",
            OAuthProvider::Google => "openid email profile",
        }
    }
}

impl FromStr for OAuthProvider {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "github" => Ok(OAuthProvider::Github),
            "google" => Ok(OAuthProvider::Google),
            _ => Err(Error::NotFound("Unknown provider".into())),
        }
    }
}

/// Identity returned by a provider after a successful code exchange.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider_account_id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Clone)]
pub struct OAuthService {
    http: Client,
    app_url: String,
    github: Option<OAuthClientConfig>,
    google: Option<OAuthClientConfig>,
    users: UserService,
}

impl OAuthService {
    pub fn new(config: &Config, users: UserService) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            app_url: config.app_url.trim_end_matches('/').to_string(),
            github: config.github.clone(),
            google: config.google.clone(),
            users,
        })
    }

    fn client(&self, provider: OAuthProvider) -> Result<&OAuthClientConfig> {
        match provider {
            OAuthProvider::Github => self.github.as_ref(),
            OAuthProvider::Google => self.google.as_ref(),
        }
        .ok_or_else(|| Error::NotFound("Provider is not configured".into()))
    }

    pub fn redirect_uri(&self, provider: OAuthProvider) -> String {
        format!("{}/api/auth/{}/callback", self.app_url, provider.as_str())
    }

    pub fn authorize_url(&self, provider: OAuthProvider, state: &str) -> Result<String> {
        let client = self.client(provider)?;
        let url = Url::parse_with_params(
            provider.authorize_endpoint(),
            &[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", self.redirect_uri(provider).as_str()),
                ("response_type", "code"),
                ("scope", provider.scope()),
                ("state", state),
            ],
        )
        .map_err(|e| Error::Internal(format!("invalid authorize url: {}", e)))?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, provider: OAuthProvider, code: &str) -> Result<String> {
        let client = self.client(provider)?;
        let redirect_uri = self.redirect_uri(provider);
        let response: TokenResponse = self
            .http
            .post(provider.token_endpoint())
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .json()
            .await?;

        match response.access_token {
            Some(token) => Ok(token),
            None => {
                tracing::warn!(
                    provider = provider.as_str(),
                    error = ?response.error,
                    description = ?response.error_description,
                    "oauth code exchange failed"
                );
                Err(Error::Unauthorized("OAuth sign-in failed".into()))
            }
        }
    }

    async fn github_profile(&self, token: &str) -> Result<OAuthProfile> {
        let user: GithubUser = self
            .http
            .get("https://api.github.com/user")
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let email = match user.email.filter(|e| !e.is_empty()) {
            Some(email) => email,
            None => {
                let emails: Vec<GithubEmail> = self
                    .http
                    .get("https://api.github.com/user/emails")
                    .bearer_auth(token)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                emails
                    .into_iter()
                    .filter(|e| e.verified)
                    .max_by_key(|e| e.primary)
                    .map(|e| e.email)
                    .ok_or_else(|| {
                        Error::Unauthorized("No verified e-mail on the GitHub account".into())
                    })?
            }
        };

        Ok(OAuthProfile {
            provider_account_id: user.id.to_string(),
            email,
            name: user.name.or(Some(user.login)),
            image: user.avatar_url,
        })
    }

    async fn google_profile(&self, token: &str) -> Result<OAuthProfile> {
        let user: GoogleUser = self
            .http
            .get("https://openidconnect.googleapis.com/v1/userinfo")
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let email = user
            .email
            .filter(|_| user.email_verified.unwrap_or(false))
            .ok_or_else(|| Error::Unauthorized("No verified e-mail on the Google account".into()))?;

        Ok(OAuthProfile {
            provider_account_id: user.sub,
            email,
            name: user.name,
            image: user.picture,
        })
    }

    /// Exchanges the callback code and links the identity to a local user.
    pub async fn sign_in(&self, provider: OAuthProvider, code: &str) -> Result<User> {
        let token = self.exchange_code(provider, code).await?;
        let profile = match provider {
            OAuthProvider::Github => self.github_profile(&token).await?,
            OAuthProvider::Google => self.google_profile(&token).await?,
        };

        let email = normalize_email(&profile.email);
        self.users
            .find_or_create_oauth_user(
                provider.as_str(),
                &profile.provider_account_id,
                &email,
                profile.name.as_deref(),
                profile.image.as_deref(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn config(with_github: bool) -> Config {
        Config {
            server_address: "127.0.0.1:0".into(),
            database_url: "postgres://localhost/jobboard".into(),
            jwt_secret: "secret".into(),
            session_ttl_hours: 24,
            app_url: "http://localhost:3000/".into(),
            public_rps: 100,
            api_rps: 100,
            trust_proxy: false,
            uploads_dir: "./uploads".into(),
            frontend_dir: None,
            smtp: None,
            mail_from: "no-reply@example.com".into(),
            github: with_github.then(|| OAuthClientConfig {
                client_id: "gh-client".into(),
                client_secret: "gh-secret".into(),
            }),
            google: None,
        }
    }

    fn service(with_github: bool) -> OAuthService {
        let cfg = config(with_github);
        let pool = PgPoolOptions::new()
            .connect_lazy(&cfg.database_url)
            .unwrap();
        OAuthService::new(&cfg, UserService::new(pool)).unwrap()
    }

    #[test]
    fn providers_parse_from_path_segments() {
        assert_eq!("github".parse::<OAuthProvider>().unwrap(), OAuthProvider::Github);
        assert_eq!("google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
        assert!(matches!(
            "gitlab".parse::<OAuthProvider>(),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn authorize_url_carries_client_state_and_callback() {
        let svc = service(true);
        let url = Url::parse(&svc.authorize_url(OAuthProvider::Github, "abc123").unwrap()).unwrap();
        assert_eq!(url.host_str(), Some("github.com"));
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "gh-client");
        assert_eq!(params["state"], "abc123");
        assert_eq!(
            params["redirect_uri"],
            "http://localhost:3000/api/auth/github/callback"
        );
    }

    #[tokio::test]
    async fn unconfigured_provider_is_not_found() {
        let svc = service(false);
        assert!(matches!(
            svc.authorize_url(OAuthProvider::Google, "s"),
            Err(Error::NotFound(_))
        ));
    }
}
