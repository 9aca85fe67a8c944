//! Media storage for uploaded videos, thumbnails and avatars.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::{AppError, AppResult};

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding stored files.
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
    /// URL prefix the files are served under.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            base_url: default_base_url(),
        }
    }
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_base_url() -> String {
    "/files".to_string()
}

/// Kind of media being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// A video file.
    Video,
    /// A still image shown before playback.
    Thumbnail,
    /// A user's profile picture.
    Avatar,
}

impl MediaKind {
    /// Directory prefix for keys of this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Video => "videos",
            Self::Thumbnail => "thumbnails",
            Self::Avatar => "avatars",
        }
    }

    /// Check a client-declared MIME type against this kind.
    pub fn check_content_type(self, content_type: &str) -> AppResult<()> {
        let expected = match self {
            Self::Video => "video/",
            Self::Thumbnail | Self::Avatar => "image/",
        };
        if content_type.starts_with(expected) {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Expected {expected}* content type, got {content_type}"
            )))
        }
    }
}

/// Uploaded file metadata.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Storage key (relative path).
    pub key: String,
    /// Public URL to access the file.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
    /// MD5 hash of the file.
    pub md5: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Upload a file.
    async fn upload(&self, key: &str, data: &[u8], content_type: &str)
    -> AppResult<UploadedFile>;

    /// Delete a file. Deleting a missing file is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public URL for a key.
    fn public_url(&self, key: &str) -> String;

    /// Check if a file exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    /// Create a backend from the `[storage]` config section.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.base_path.clone(), config.base_url.clone())
    }

    /// Directory the files live in.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a key onto the filesystem, refusing anything that escapes the base path.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(AppError::BadRequest(format!("Invalid storage key: {key}")));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<UploadedFile> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write file: {e}")))?;

        let md5 = format!("{:x}", md5::compute(data));
        tracing::debug!(key = %key, size = data.len(), "Stored file");

        Ok(UploadedFile {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5,
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {e}"))),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.resolve(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to stat file: {e}")))
    }
}

/// Generate a unique storage key for an uploaded file.
///
/// Keys look like `videos/2024/05/01/{user_id}/{ulid}.mp4`. Only a short
/// alphanumeric extension survives from the client-supplied name.
#[must_use]
pub fn generate_storage_key(kind: MediaKind, user_id: &str, original_name: &str) -> String {
    use chrono::Utc;

    let date_path = Utc::now().format("%Y/%m/%d");

    let extension = original_name
        .rfind('.')
        .filter(|&pos| pos > 0 && pos < original_name.len() - 1)
        .map(|pos| &original_name[pos + 1..])
        .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase);

    format!(
        "{}/{date_path}/{user_id}/{}.{extension}",
        kind.prefix(),
        ulid::Ulid::new().to_string().to_lowercase()
    )
}
