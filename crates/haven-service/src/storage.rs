//! Object storage for media assets.
//!
//! Uploads return a stable public URL; deletes are best-effort and only
//! logged when they fail.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use haven_core::{new_key, Caller};
use serde::Serialize;

use crate::authz;
use crate::error::{Result, ServiceError};

/// Folders uploads may land in.
pub const UPLOAD_FOLDERS: &[&str] = &[
    "avatars",
    "banners",
    "blogs",
    "counselors",
    "materials",
    "reels",
    "team",
    "testimonials",
    "videos",
];

/// Trait for object storage backends.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `folder` and return the public URL.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the upload fails.
    async fn upload(&self, bytes: Vec<u8>, folder: &str, content_type: &str) -> Result<String>;

    /// Remove the object behind `url`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Storage` if the URL is foreign or the delete fails.
    async fn delete(&self, url: &str) -> Result<()>;
}

/// Delete an object, logging instead of failing.
pub async fn delete_best_effort(storage: &dyn ObjectStorage, url: &str) {
    if let Err(e) = storage.delete(url).await {
        tracing::warn!(url = %url, error = %e, "Failed to delete stored object");
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "application/pdf" => ".pdf",
        _ => "",
    }
}

/// S3-backed object storage.
#[derive(Debug, Clone)]
pub struct S3ObjectStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3ObjectStorage {
    /// Create a storage backend from an existing client.
    #[must_use]
    pub fn new(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a storage backend using credentials from the environment.
    pub async fn from_env(bucket: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket, public_base_url)
    }

    fn key_for(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn upload(&self, bytes: Vec<u8>, folder: &str, content_type: &str) -> Result<String> {
        let key = format!("{folder}/{}{}", new_key(), extension_for(content_type));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ServiceError::Storage(format!("upload of {key} failed: {e}")))?;

        tracing::debug!(bucket = %self.bucket, key = %key, "Uploaded object");

        Ok(format!("{}/{key}", self.public_base_url))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let key = self
            .key_for(url)
            .ok_or_else(|| ServiceError::Storage(format!("not a bucket URL: {url}")))?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| ServiceError::Storage(format!("delete of {key} failed: {e}")))?;

        tracing::debug!(bucket = %self.bucket, key = %key, "Deleted object");
        Ok(())
    }
}

/// Object storage that keeps nothing, for deployments without a bucket.
#[derive(Debug, Clone, Default)]
pub struct NoopObjectStorage;

#[async_trait]
impl ObjectStorage for NoopObjectStorage {
    async fn upload(&self, _bytes: Vec<u8>, folder: &str, content_type: &str) -> Result<String> {
        tracing::warn!(folder = %folder, "NoopObjectStorage: upload called but no bucket configured");
        Ok(format!("noop://{folder}/{}{}", new_key(), extension_for(content_type)))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        tracing::warn!(url = %url, "NoopObjectStorage: delete called but no bucket configured");
        Ok(())
    }
}

/// Object storage that remembers deletes, for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingObjectStorage {
    deleted: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingObjectStorage {
    /// URLs deleted so far.
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl ObjectStorage for RecordingObjectStorage {
    async fn upload(&self, _bytes: Vec<u8>, folder: &str, content_type: &str) -> Result<String> {
        Ok(format!("memory://{folder}/{}{}", new_key(), extension_for(content_type)))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        self.deleted.lock().push(url.to_string());
        Ok(())
    }
}

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedObject {
    /// Public URL of the stored object.
    pub url: String,
    /// Folder the object was stored in.
    pub folder: String,
    /// Size in bytes.
    pub size: usize,
}

/// Staff-only uploads into a fixed set of folders.
#[derive(Clone)]
pub struct UploadService {
    storage: Arc<dyn ObjectStorage>,
}

impl UploadService {
    /// Create an upload service.
    #[must_use]
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Store an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-staff callers, `Validation` for unknown
    /// folders, empty bodies or unsupported content types, and `Storage`
    /// when the backend fails.
    pub async fn upload(
        &self,
        caller: &Caller,
        folder: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedObject> {
        authz::require_staff(caller)?;

        if !UPLOAD_FOLDERS.contains(&folder) {
            return Err(ServiceError::Validation(format!("unknown upload folder: {folder}")));
        }
        if bytes.is_empty() {
            return Err(ServiceError::Validation("upload body is empty".into()));
        }
        if extension_for(content_type).is_empty() {
            return Err(ServiceError::Validation(format!(
                "unsupported content type: {content_type}"
            )));
        }

        let size = bytes.len();
        let url = self.storage.upload(bytes, folder, content_type).await?;

        tracing::info!(folder = %folder, size, user_id = %caller.user_id, "Stored upload");

        Ok(UploadedObject {
            url,
            folder: folder.to_string(),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::{Role, UserId};

    fn staff() -> Caller {
        Caller::new(UserId::generate(), Role::Counselor)
    }

    #[tokio::test]
    async fn upload_validates_input() {
        let uploads = UploadService::new(Arc::new(RecordingObjectStorage::default()));

        let stored = uploads
            .upload(&staff(), "blogs", "image/png", vec![1, 2, 3])
            .await
            .unwrap();
        assert!(stored.url.starts_with("memory://blogs/"));
        assert!(stored.url.ends_with(".png"));
        assert_eq!(stored.size, 3);

        assert!(matches!(
            uploads.upload(&staff(), "secrets", "image/png", vec![1]).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            uploads.upload(&staff(), "blogs", "image/png", vec![]).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            uploads
                .upload(&staff(), "blogs", "application/x-sh", vec![1])
                .await,
            Err(ServiceError::Validation(_))
        ));

        let user = Caller::new(UserId::generate(), Role::User);
        assert!(matches!(
            uploads.upload(&user, "blogs", "image/png", vec![1]).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn best_effort_delete_records() {
        let storage = RecordingObjectStorage::default();
        delete_best_effort(&storage, "memory://blogs/x.png").await;
        assert_eq!(storage.deleted(), vec!["memory://blogs/x.png".to_string()]);
    }

    #[test]
    fn extensions() {
        assert_eq!(extension_for("image/jpeg"), ".jpg");
        assert_eq!(extension_for("application/pdf"), ".pdf");
        assert_eq!(extension_for("text/html"), "");
    }
}
