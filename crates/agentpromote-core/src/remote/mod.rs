//! Remote collaborators
//!
//! Capability traits for the two external services the pipeline talks to:
//! the agent-configuration service (export/import of whole agents, both
//! long-running) and the object store holding export blobs.
//!
//! The pipeline depends only on these traits. Long-running operations are
//! exposed as an [`Operation`] whose `wait` resolves to success or a typed
//! failure; how completion is observed (polling, in the HTTP
//! implementations) stays behind the seam.

mod dialogflow;
mod error;
mod storage;
#[cfg(test)]
pub(crate) mod testing;

pub use dialogflow::DialogflowClient;
pub use error::RemoteError;
pub use storage::CloudStorageClient;

use async_trait::async_trait;
use std::path::Path;

/// Interval between completion polls of the HTTP operation handles
pub const POLL_INTERVAL_MS: u64 = 2000;

/// A long-running remote task
///
/// The only thing the pipeline may do with one is await its completion.
#[async_trait]
pub trait Operation: Send {
    /// Wait until the operation resolves, consuming the handle
    async fn wait(self: Box<Self>) -> Result<(), RemoteError>;
}

/// The remote agent-configuration service
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Start exporting the project's agent to `destination_uri`
    /// (an object-store URI such as `gs://bucket/name.zip`)
    async fn export_agent(
        &self,
        project_id: &str,
        destination_uri: &str,
    ) -> Result<Box<dyn Operation>, RemoteError>;

    /// Start importing a base64-encoded agent bundle into the project
    async fn import_agent(
        &self,
        project_id: &str,
        agent_content: &str,
    ) -> Result<Box<dyn Operation>, RemoteError>;
}

/// The object store export blobs pass through
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether the named bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, RemoteError>;

    /// Create the named bucket
    async fn create_bucket(&self, bucket: &str) -> Result<(), RemoteError>;

    /// Download an object into a local file
    async fn download(
        &self,
        bucket: &str,
        object: &str,
        destination: &Path,
    ) -> Result<(), RemoteError>;
}
