//! Bundle handling
//!
//! An agent bundle is the zip representation of one environment's
//! configuration: a top-level `agent.json` manifest plus `entities/` and
//! `intents/` subfolders. This module exports bundles from the remote
//! service, assembles minimal bundles out of diff results, and imports
//! assembled bundles into a destination environment.

pub mod archive;
mod assembler;
mod exporter;
mod importer;

pub use archive::ArchiveError;
pub use assembler::{AssembleError, Assembler};
pub use exporter::{ExportError, ExportedBundle, Exporter};
pub use importer::{ImportError, Importer};

/// Name of the manifest file carried at the root of every bundle
pub const MANIFEST_FILE: &str = "agent.json";

/// Subfolders every importable bundle is expected to carry
pub const BUNDLE_FOLDERS: [&str; 2] = ["entities", "intents"];

/// OS metadata artifacts that must never end up in a bundle
pub const METADATA_ARTIFACTS: [&str; 2] = [".DS_Store", "Thumbs.db"];
