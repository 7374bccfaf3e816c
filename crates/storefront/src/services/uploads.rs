//! Product image storage on the local filesystem.
//!
//! Files are written to the configured upload directory as
//! `{timestamp}-{sanitized original name}`. The path stored on the product is
//! `images/<file>`, which the router serves from `/images`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

/// MIME types accepted for product images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpg", "image/jpeg"];

/// URL and stored-path prefix for uploaded images.
pub const IMAGE_PATH_PREFIX: &str = "images";

/// Errors that can occur while storing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The file is missing or not one of [`ALLOWED_IMAGE_TYPES`].
    #[error("attached file is not an image")]
    NotAnImage,

    /// Writing the file failed.
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// An image received from a multipart form, not yet written to disk.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Accept `bytes` only when the declared type is an allowed image type
    /// and the part is non-empty.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::NotAnImage` otherwise.
    pub fn new(
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Self, UploadError> {
        let content_type = content_type
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| is_allowed_image_type(ct))
            .ok_or(UploadError::NotAnImage)?;

        if bytes.is_empty() {
            return Err(UploadError::NotAnImage);
        }

        Ok(Self {
            file_name: file_name.unwrap_or("upload").to_string(),
            content_type,
            bytes,
        })
    }
}

/// Whether `content_type` may be stored as a product image.
#[must_use]
pub fn is_allowed_image_type(content_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&content_type)
}

/// Image storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write an upload and return its stored path (`images/<file>`).
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Io` if the directory or file cannot be written.
    pub async fn save(&self, upload: &ImageUpload) -> Result<String, UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = stored_file_name(&upload.file_name, Utc::now());
        tokio::fs::write(self.dir.join(&file_name), &upload.bytes).await?;

        tracing::info!(
            file = %file_name,
            content_type = %upload.content_type,
            size = upload.bytes.len(),
            "Stored product image"
        );
        Ok(format!("{IMAGE_PATH_PREFIX}/{file_name}"))
    }

    /// Delete a previously stored image. Failures are logged, never returned.
    pub async fn delete(&self, stored_path: &str) {
        let Some(path) = self.resolve(stored_path) else {
            tracing::warn!(stored_path, "Refusing to delete image outside upload directory");
            return;
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete image");
        }
    }

    /// Map a stored path back to a file inside the upload directory.
    fn resolve(&self, stored_path: &str) -> Option<PathBuf> {
        let relative = stored_path
            .trim_start_matches('/')
            .strip_prefix(IMAGE_PATH_PREFIX)?
            .strip_prefix('/')?;

        let only_name = Path::new(relative).file_name()?;
        if only_name != std::ffi::OsStr::new(relative) {
            return None;
        }

        Some(self.dir.join(only_name))
    }
}

/// Build the on-disk name `{RFC 3339 timestamp}-{sanitized name}`.
#[must_use]
pub fn stored_file_name(original: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        now.to_rfc3339_opts(SecondsFormat::Millis, true),
        sanitize_file_name(original)
    )
}

/// Keep ASCII letters, digits, `.`, `-` and `_`; replace everything else.
fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_allowed_image_types() {
        assert!(ImageUpload::new(Some("a.png"), Some("image/png"), vec![1]).is_ok());
        assert!(ImageUpload::new(Some("a.jpg"), Some("IMAGE/JPEG"), vec![1]).is_ok());
        assert!(ImageUpload::new(Some("a.jpg"), Some("image/jpg"), vec![1]).is_ok());
        assert!(matches!(
            ImageUpload::new(Some("a.gif"), Some("image/gif"), vec![1]),
            Err(UploadError::NotAnImage)
        ));
        assert!(ImageUpload::new(Some("a.png"), None, vec![1]).is_err());
        assert!(ImageUpload::new(Some("a.png"), Some("image/png"), Vec::new()).is_err());
    }

    #[test]
    fn test_stored_file_name() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).unwrap();
        assert_eq!(
            stored_file_name("blue mug.png", now),
            "2026-03-01T10:30:00.000Z-blue_mug.png"
        );
        assert_eq!(
            stored_file_name("../../etc/passwd", now),
            "2026-03-01T10:30:00.000Z-passwd"
        );
        assert_eq!(stored_file_name("...", now), "2026-03-01T10:30:00.000Z-upload");
    }

    #[test]
    fn test_resolve_stays_inside_upload_dir() {
        let store = ImageStore::new("/srv/images");
        assert_eq!(
            store.resolve("images/2026-x-mug.png"),
            Some(PathBuf::from("/srv/images/2026-x-mug.png"))
        );
        assert_eq!(store.resolve("/images/mug.png"), Some(PathBuf::from("/srv/images/mug.png")));
        assert_eq!(store.resolve("images/../secret"), None);
        assert_eq!(store.resolve("static/app.css"), None);
        assert_eq!(store.resolve("images/"), None);
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let dir = std::env::temp_dir().join(format!("bazaar-upload-{}", uuid::Uuid::new_v4()));
        let store = ImageStore::new(&dir);
        let upload = ImageUpload::new(Some("mug.png"), Some("image/png"), vec![0x89, b'P']).unwrap();

        let stored = store.save(&upload).await.unwrap();
        assert!(stored.starts_with("images/"));
        assert!(stored.ends_with("-mug.png"));

        let on_disk = store.resolve(&stored).unwrap();
        assert_eq!(tokio::fs::read(&on_disk).await.unwrap(), vec![0x89, b'P']);

        store.delete(&stored).await;
        assert!(!on_disk.exists());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
