//! # agentpromote Core Library
//!
//! Core functionality for promoting conversational-agent configurations
//! across dev, test and prod environments.

#![warn(missing_docs)]

//!
//! This library provides:
//! - Environment descriptors and configuration loading
//! - Bundle export from a remote agent-configuration service
//! - Structural diffing of two exported configuration trees
//! - Selective repackaging of changes into an importable bundle
//! - Bundle import into the destination environment
//! - A promotion orchestrator sequencing the above, with a persistent
//!   promotion history used for rollback
//!
//! ## Example
//!
//! ```rust,ignore
//! use agentpromote_core::prelude::*;
//!
//! let config = PromoteConfig::load("agentpromote.json")?;
//! let promoter = Promoter::from_config(&config)?;
//!
//! // Promote the dev agent into the test environment
//! let report = promoter.deploy_dev_to_test().await?;
//! println!("promoted {} file(s)", report.changed_files);
//! ```

pub mod bundle;
pub mod config;
pub mod diff;
pub mod environment;
pub mod promote;
pub mod remote;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bundle::{Assembler, Exporter, Importer};
    pub use crate::config::PromoteConfig;
    pub use crate::diff::{ChangeSet, DiffEntry, DiffState};
    pub use crate::environment::{Environment, EnvironmentSet};
    pub use crate::promote::{
        PromotionError, PromotionHistory, PromotionRecord, PromotionReport, PromotionState,
        Promoter, Stage,
    };
    pub use crate::remote::{AgentService, BlobStore, Operation, RemoteError};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
