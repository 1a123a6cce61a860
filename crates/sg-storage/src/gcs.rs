//! Google Cloud Storage over the JSON API.
//!
//! Bearer tokens come from a [`TokenProvider`] on every call, so Application
//! Default Credentials are refreshed before they expire.

use crate::{ObjectLocation, ObjectStore, StorageError};
use async_trait::async_trait;
use gcp_auth::TokenProvider;
use reqwest::StatusCode;
use std::sync::Arc;

pub const GCS_API: &str = "https://storage.googleapis.com";

const GCS_SCOPES: &[&str] = &["https://www.googleapis.com/auth/devstorage.read_write"];

#[derive(Clone)]
pub struct GcsStore {
    http: reqwest::Client,
    base_url: String,
    token_provider: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for GcsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsStore")
            .field("base_url", &self.base_url)
            .field("token_provider", &"<TokenProvider>")
            .finish()
    }
}

impl GcsStore {
    pub fn new(token_provider: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_url(GCS_API, token_provider)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_provider,
        }
    }

    async fn access_token(&self) -> Result<String, StorageError> {
        let token = self
            .token_provider
            .token(GCS_SCOPES)
            .await
            .map_err(|e| StorageError::Auth(e.to_string()))?;
        Ok(token.as_str().to_string())
    }
}

fn object_url(base_url: &str, location: &ObjectLocation) -> String {
    format!(
        "{base_url}/storage/v1/b/{}/o/{}",
        urlencoding::encode(&location.bucket),
        urlencoding::encode(&location.key)
    )
}

fn upload_url(base_url: &str, location: &ObjectLocation) -> String {
    format!(
        "{base_url}/upload/storage/v1/b/{}/o",
        urlencoding::encode(&location.bucket)
    )
}

async fn api_error(response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    StorageError::Api { status, message }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn exists(&self, location: &ObjectLocation) -> Result<bool, StorageError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(object_url(&self.base_url, location))
            .bearer_auth(&token)
            .query(&[("fields", "name")])
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(api_error(response).await),
        }
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<(), StorageError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .delete(object_url(&self.base_url, location))
            .bearer_auth(&token)
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            s if s.is_success() => Ok(()),
            _ => Err(api_error(response).await),
        }
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        tracing::debug!(%location, size = bytes.len(), "uploading object");
        let token = self.access_token().await?;
        let response = self
            .http
            .post(upload_url(&self.base_url, location))
            .bearer_auth(&token)
            .query(&[("uploadType", "media"), ("name", location.key.as_str())])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(api_error(response).await)
        }
    }
}
