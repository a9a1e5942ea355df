//! Promotion orchestration
//!
//! Sequences one promotion: export the source, export the destination,
//! diff the two trees, assemble a minimal bundle, import it into the
//! destination. Each promotion runs through an explicit state machine and
//! any stage failure halts the pipeline with the originating stage
//! attached.

mod history;
mod orchestrator;

pub use history::{PromotionHistory, PromotionRecord};
pub use orchestrator::{PromotionReport, Promoter};

use serde::Serialize;
use thiserror::Error;

use crate::bundle::{AssembleError, ExportError, ImportError};

/// Pipeline stage a failure originated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Exporting the source environment
    ExportSource,
    /// Exporting the destination environment
    ExportDestination,
    /// Comparing the two exported trees
    Diff,
    /// Assembling the promotion bundle
    Assemble,
    /// Importing the bundle into the destination
    Import,
}

/// State of one promotion instance
///
/// `Done` and `Failed` are terminal; there is no resume. A fresh
/// promotion restarts from the beginning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PromotionState {
    /// Nothing started yet
    Idle,
    /// Exporting the source environment
    ExportingSource,
    /// Exporting the destination environment
    ExportingDestination,
    /// Diffing the exported trees
    Diffing,
    /// Assembling the bundle
    Assembling,
    /// Importing into the destination
    Importing,
    /// Promotion completed
    Done,
    /// Promotion failed at `stage`
    Failed {
        /// Stage the failure originated in
        stage: Stage,
        /// Human-readable cause
        reason: String,
    },
}

/// Errors from the promotion orchestrator
#[derive(Error, Debug)]
pub enum PromotionError {
    #[error("another promotion into {destination} is already in flight")]
    AlreadyRunning { destination: String },

    #[error("export of source {environment} failed: {source}")]
    ExportSource {
        environment: String,
        #[source]
        source: ExportError,
    },

    #[error("export of destination {environment} failed: {source}")]
    ExportDestination {
        environment: String,
        #[source]
        source: ExportError,
    },

    #[error("diff failed: {0}")]
    Diff(#[source] std::io::Error),

    #[error("assembly failed: {0}")]
    Assemble(#[from] AssembleError),

    #[error("import into {environment} failed: {source}")]
    Import {
        environment: String,
        #[source]
        source: ImportError,
    },

    #[error("no exported tree for {environment}; run an export or promotion first")]
    NoLocalExport { environment: String },

    #[error("no successful promotion into {destination} to roll back to")]
    NothingToRollBack { destination: String },

    #[error("workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("history error: {0}")]
    History(#[source] std::io::Error),
}

impl PromotionError {
    /// Stage the error belongs to, when it maps to one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PromotionError::ExportSource { .. } => Some(Stage::ExportSource),
            PromotionError::ExportDestination { .. } => Some(Stage::ExportDestination),
            PromotionError::Diff(_) => Some(Stage::Diff),
            PromotionError::Assemble(_) => Some(Stage::Assemble),
            PromotionError::Import { .. } => Some(Stage::Import),
            _ => None,
        }
    }
}
