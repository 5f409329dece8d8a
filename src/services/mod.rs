pub mod application_service;
pub mod auth_service;
pub mod company_service;
pub mod job_service;
pub mod mail_service;
pub mod oauth_service;
pub mod storage_service;
pub mod token_service;
pub mod user_service;
