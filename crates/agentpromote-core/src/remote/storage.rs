//! Cloud Storage client
//!
//! Minimal JSON-API client for the three object-store operations the
//! pipeline needs: bucket existence, bucket creation and blob download.

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;

use super::{BlobStore, RemoteError};

const DEFAULT_BASE_URL: &str = "https://storage.googleapis.com";

/// HTTP client for the Cloud Storage JSON API
pub struct CloudStorageClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    /// Project that owns lazily-created buckets
    project_id: String,
}

impl CloudStorageClient {
    /// Create a client using the public API endpoint
    pub fn new(token: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, token, project_id)
    }

    /// Create a client against a different endpoint (emulators, tests)
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("agentpromote/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
            project_id: project_id.into(),
        }
    }
}

/// Object names used by this pipeline are flat (`{env}-{date}.zip`), so
/// only the characters that would break a URL path segment need escaping.
fn encode_object_name(object: &str) -> String {
    object.replace('/', "%2F").replace('+', "%2B")
}

#[async_trait]
impl BlobStore for CloudStorageClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, RemoteError> {
        let url = format!("{}/storage/v1/b/{}", self.base_url, bucket);
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;

        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(RemoteError::Status {
                context: format!("bucket lookup for {bucket}"),
                status,
            }),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), RemoteError> {
        let url = format!(
            "{}/storage/v1/b?project={}",
            self.base_url, self.project_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "name": bucket }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                context: format!("bucket creation for {bucket}"),
                status: status.as_u16(),
            });
        }
        tracing::info!(bucket, "bucket created");
        Ok(())
    }

    async fn download(
        &self,
        bucket: &str,
        object: &str,
        destination: &Path,
    ) -> Result<(), RemoteError> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.base_url,
            bucket,
            encode_object_name(object)
        );
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                context: format!("download of {object} from {bucket}"),
                status: status.as_u16(),
            });
        }

        let content = response.bytes().await?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, &content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_names_with_path_separators_are_escaped() {
        assert_eq!(encode_object_name("devAgent-2024-01-01.zip"), "devAgent-2024-01-01.zip");
        assert_eq!(encode_object_name("exports/dev.zip"), "exports%2Fdev.zip");
    }
}
