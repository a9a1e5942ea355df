//! Bundle export
//!
//! Asks the remote service to export an environment's current agent into
//! an object-store blob, waits for the long-running export to finish,
//! downloads the blob and unpacks it into the run's working directory.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::archive::{self, ArchiveError};
use crate::environment::Environment;
use crate::remote::{AgentService, BlobStore, RemoteError};

/// Errors from the export stage
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of exporting one environment
#[derive(Debug, Clone)]
pub struct ExportedBundle {
    /// Downloaded export archive (the environment's state at export time)
    pub archive: PathBuf,
    /// Directory the archive was unpacked into
    pub tree: PathBuf,
}

/// Exports environment bundles through the remote service and object store
pub struct Exporter {
    agents: Arc<dyn AgentService>,
    store: Arc<dyn BlobStore>,
    bucket: String,
}

impl Exporter {
    /// Create an exporter using the given remote collaborators
    pub fn new(agents: Arc<dyn AgentService>, store: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        Self {
            agents,
            store,
            bucket: bucket.into(),
        }
    }

    /// Create the export bucket if it does not exist yet
    pub async fn ensure_bucket(&self) -> Result<(), RemoteError> {
        if !self.store.bucket_exists(&self.bucket).await? {
            self.store.create_bucket(&self.bucket).await?;
        }
        Ok(())
    }

    /// Export `env` into `work_dir`
    ///
    /// On success `{work_dir}/{env.name}/` holds the unpacked current
    /// configuration of the environment. Any pre-existing tree for the
    /// environment under `work_dir` is removed first.
    pub async fn export_environment(
        &self,
        env: &Environment,
        work_dir: &Path,
    ) -> Result<ExportedBundle, ExportError> {
        self.ensure_bucket().await?;

        let blob = format!("{}-{}.zip", env.name, Utc::now().format("%Y-%m-%d"));
        let destination_uri = format!("gs://{}/{}", self.bucket, blob);

        tracing::info!(environment = %env.name, blob = %blob, "exporting agent");
        let operation = self
            .agents
            .export_agent(&env.project_id, &destination_uri)
            .await?;
        operation.wait().await?;

        let archive_path = work_dir.join(&blob);
        tracing::info!(environment = %env.name, path = %archive_path.display(), "downloading export blob");
        self.store
            .download(&self.bucket, &blob, &archive_path)
            .await?;

        let tree = work_dir.join(&env.name);
        if tree.exists() {
            fs::remove_dir_all(&tree)?;
        }
        archive::unpack(&archive_path, &tree)?;
        tracing::info!(environment = %env.name, tree = %tree.display(), "export unpacked");

        Ok(ExportedBundle {
            archive: archive_path,
            tree,
        })
    }
}
