//! sg-storage: Object storage behind a narrow trait.
//!
//! [`ObjectStore`] covers the three calls the pipelines need. [`gcs`] talks
//! to the GCS JSON API, [`memory`] keeps objects in a map for tests, and
//! [`publisher`] writes the mapping hand-off document.

pub mod gcs;
pub mod memory;
pub mod publisher;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GCP authentication failed: {0}")]
    Auth(String),
    #[error("storage API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Bucket + object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.key)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, location: &ObjectLocation) -> Result<bool, StorageError>;

    /// Deleting a missing object is not an error.
    async fn delete(&self, location: &ObjectLocation) -> Result<(), StorageError>;

    async fn put(
        &self,
        location: &ObjectLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
