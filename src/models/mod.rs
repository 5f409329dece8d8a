pub mod application;
pub mod company;
pub mod job;
pub mod stored_file;
pub mod token;
pub mod user;
