use chrono::{DateTime, Duration, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn expires_in(ttl: Duration) -> DateTime<Utc> {
    now() + ttl
}
