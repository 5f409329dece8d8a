use validator::ValidationError;

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Absolute http(s) URL, or a path to a file served from the public uploads directory.
pub fn image_url(value: &str) -> Result<(), ValidationError> {
    if value.starts_with("/uploads/public/") && !value.contains("..") {
        return Ok(());
    }
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("url")),
    }
}
