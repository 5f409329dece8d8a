use std::path::{Path, PathBuf};

use bytes::Bytes;
use sqlx::PgPool;
use tokio::fs;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::stored_file::StoredFile;

pub const RESUME_URL_PREFIX: &str = "/api/uploads/resumes";
pub const PUBLIC_URL_PREFIX: &str = "/uploads/public";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Private; served through an access check.
    Resumes,
    /// Served as static files under `/uploads/public/company-images`.
    CompanyImages,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Resumes => "resumes",
            Bucket::CompanyImages => "company-images",
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            Bucket::Resumes => 10 * 1024 * 1024,
            Bucket::CompanyImages => 5 * 1024 * 1024,
        }
    }

    fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            Bucket::Resumes => &["pdf", "doc", "docx", "txt", "rtf"],
            Bucket::CompanyImages => &["jpg", "jpeg", "png", "webp"],
        }
    }

    /// Directory below the uploads root.
    fn relative_dir(&self) -> PathBuf {
        match self {
            Bucket::Resumes => PathBuf::from("resumes"),
            Bucket::CompanyImages => PathBuf::from("public").join("company-images"),
        }
    }
}

fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain; charset=utf-8",
        "rtf" => "application/rtf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn content_matches(ext: &str, data: &[u8]) -> bool {
    match ext {
        "pdf" => data.starts_with(b"%PDF"),
        "jpg" | "jpeg" => data.starts_with(&[0xFF, 0xD8, 0xFF]),
        "png" => data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
        "webp" => data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP",
        _ => true,
    }
}

/// Checks name, size and leading bytes of an upload; returns the normalized extension.
pub fn check_upload(bucket: Bucket, filename: &str, data: &[u8]) -> Result<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !bucket.allowed_extensions().contains(&ext.as_str()) {
        return Err(Error::BadRequest(format!(
            "File type not allowed. Allowed: {}",
            bucket.allowed_extensions().join(", ")
        )));
    }
    if data.is_empty() {
        return Err(Error::BadRequest("File is empty".into()));
    }
    if data.len() > bucket.max_bytes() {
        return Err(Error::BadRequest(format!(
            "File is too large. Maximum size is {} MB",
            bucket.max_bytes() / (1024 * 1024)
        )));
    }
    if !content_matches(&ext, data) {
        return Err(Error::BadRequest(format!("Invalid .{} file content", ext)));
    }
    Ok(ext)
}

#[derive(Clone)]
pub struct StorageService {
    pool: PgPool,
    root: PathBuf,
}

impl StorageService {
    pub fn new(pool: PgPool, root: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            root: root.into(),
        }
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.join("public")
    }

    pub async fn save(
        &self,
        bucket: Bucket,
        owner_id: Option<Uuid>,
        filename: &str,
        data: Bytes,
    ) -> Result<StoredFile> {
        let ext = check_upload(bucket, filename, &data)?;

        let id = Uuid::new_v4();
        let relative = bucket.relative_dir().join(format!("{}.{}", id, ext));
        let dir = self.root.join(bucket.relative_dir());
        fs::create_dir_all(&dir).await?;
        fs::write(self.root.join(&relative), &data).await.map_err(|e| {
            tracing::error!(error = %e, bucket = bucket.as_str(), "failed to write upload");
            Error::Io(e)
        })?;

        let stored = sqlx::query_as::<_, StoredFile>(
            r#"
            INSERT INTO stored_files (id, bucket, owner_id, original_name, content_type, size_bytes, storage_path)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, bucket, owner_id, original_name, content_type, size_bytes, storage_path, created_at
            "#,
        )
        .bind(id)
        .bind(bucket.as_str())
        .bind(owner_id)
        .bind(filename)
        .bind(content_type_for(&ext))
        .bind(data.len() as i64)
        .bind(relative.to_string_lossy().to_string())
        .fetch_one(&self.pool)
        .await;
        let stored = match stored {
            Ok(stored) => stored,
            Err(e) => {
                self.discard(&relative).await;
                return Err(e.into());
            }
        };

        tracing::info!(file_id = %stored.id, bucket = bucket.as_str(), size = stored.size_bytes, "file stored");
        Ok(stored)
    }

    /// Removes a file whose metadata row could not be written.
    async fn discard(&self, relative: &Path) {
        if let Err(e) = fs::remove_file(self.root.join(relative)).await {
            tracing::warn!(error = %e, path = %relative.display(), "failed to remove orphaned upload");
        }
    }

    pub async fn get(&self, id: Uuid, bucket: Bucket) -> Result<StoredFile> {
        sqlx::query_as::<_, StoredFile>(
            "SELECT id, bucket, owner_id, original_name, content_type, size_bytes, storage_path, created_at FROM stored_files WHERE id = $1 AND bucket = $2",
        )
        .bind(id)
        .bind(bucket.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("File not found".into()))
    }

    pub async fn read(&self, file: &StoredFile) -> Result<Vec<u8>> {
        match fs::read(self.root.join(&file.storage_path)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(file_id = %file.id, "stored file missing on disk");
                Err(Error::NotFound("File not found".into()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// URL under which a stored file is reachable.
pub fn file_url(file: &StoredFile) -> String {
    if file.bucket == Bucket::Resumes.as_str() {
        format!("{}/{}", RESUME_URL_PREFIX, file.id)
    } else {
        let name = Path::new(&file.storage_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{}/{}/{}", PUBLIC_URL_PREFIX, file.bucket, name)
    }
}

/// Stored file id behind a `/api/uploads/resumes/<id>` URL.
pub fn resume_id_from_url(url: &str) -> Option<Uuid> {
    url.strip_prefix(RESUME_URL_PREFIX)?
        .strip_prefix('/')?
        .parse()
        .ok()
}
