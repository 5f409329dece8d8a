use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::user::{User, UserRole};

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterPayload {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[validate(custom(function = "crate::utils::validation::not_blank"))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginPayload {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResetPayload {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPasswordPayload {
    pub token: Option<String>,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVerificationPayload {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "passwords_given_together"))]
pub struct SettingsPayload {
    pub name: Option<String>,
    pub is_two_factor_enabled: Option<bool>,
    pub role: Option<UserRole>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6))]
    pub password: Option<String>,
    #[validate(length(min = 6))]
    pub new_password: Option<String>,
}

fn passwords_given_together(payload: &SettingsPayload) -> Result<(), ValidationError> {
    if payload.password.is_some() != payload.new_password.is_some() {
        let mut err = ValidationError::new("password_pair");
        err.message = Some("Both password and new password are required together.".into());
        return Err(err);
    }
    Ok(())
}

impl SettingsPayload {
    /// Credentials and two-factor settings belong to the identity provider for OAuth users.
    pub fn strip_credential_fields(&mut self) {
        self.email = None;
        self.password = None;
        self.new_password = None;
        self.is_two_factor_enabled = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoginResponse {
    TwoFactor {
        two_factor: bool,
    },
    Message {
        success: String,
    },
    SignedIn {
        success: String,
        redirect_to: String,
        token: String,
        user: UserResponse,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub email_verified: Option<DateTime<Utc>>,
    pub image: Option<String>,
    pub role: UserRole,
    pub is_two_factor_enabled: bool,
    #[serde(default)]
    pub is_oauth: bool,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn with_oauth(mut self, is_oauth: bool) -> Self {
        self.is_oauth = is_oauth;
        self
    }
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
            email_verified: value.email_verified,
            image: value.image,
            role: value.role,
            is_two_factor_enabled: value.is_two_factor_enabled,
            is_oauth: false,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRolePayload {
    pub role: UserRole,
}
