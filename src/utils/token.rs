use rand::{distributions::Alphanumeric, thread_rng, Rng};
use uuid::Uuid;

/// Opaque token for e-mail verification and password reset links.
pub fn generate_link_token() -> String {
    Uuid::new_v4().to_string()
}

/// Six-digit numeric code for the two-factor step, never starting with zero.
pub fn generate_two_factor_code() -> String {
    thread_rng().gen_range(100_000..1_000_000).to_string()
}

pub fn generate_state(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
