//! Bundle import
//!
//! Reads an assembled bundle, base64-encodes it and submits it to the
//! remote service as an agent import for the destination environment,
//! then waits for the long-running import to finish. Failures propagate;
//! an import that did not complete must never look like one that did.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::environment::Environment;
use crate::remote::{AgentService, RemoteError};

/// Errors from the import stage
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Imports assembled bundles into a destination environment
pub struct Importer {
    agents: Arc<dyn AgentService>,
}

impl Importer {
    /// Create an importer using the given remote service
    pub fn new(agents: Arc<dyn AgentService>) -> Self {
        Self { agents }
    }

    /// Import the archive at `archive_path` into `to`
    pub async fn import_bundle(
        &self,
        archive_path: &Path,
        to: &Environment,
    ) -> Result<(), ImportError> {
        tracing::info!(archive = %archive_path.display(), environment = %to.name, "importing bundle");
        let content = tokio::fs::read(archive_path).await?;
        let encoded = STANDARD.encode(&content);

        let operation = self.agents.import_agent(&to.project_id, &encoded).await?;
        operation.wait().await?;
        tracing::info!(environment = %to.name, "import complete");
        Ok(())
    }
}
