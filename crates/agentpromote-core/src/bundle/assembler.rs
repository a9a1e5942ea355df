//! Bundle assembly
//!
//! Builds a minimal importable bundle out of a [`ChangeSet`]: a staging
//! directory is recreated from scratch, the source-only files are copied
//! in at their relative paths, the destination's manifest is carried over
//! verbatim, and the whole tree is zipped.
//!
//! The staging directory is removed and remade on every run so nothing
//! from a previous promotion can leak into a new bundle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::archive::{self, ArchiveError};
use super::{BUNDLE_FOLDERS, MANIFEST_FILE, METADATA_ARTIFACTS};
use crate::diff::ChangeSet;

/// Errors from the assembly stage
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("destination manifest not found at {0}")]
    MissingManifest(PathBuf),
}

/// Assembles promotion bundles in a staging directory
pub struct Assembler {
    staging: PathBuf,
}

impl Assembler {
    /// Create an assembler staging under the given directory
    pub fn new(staging: impl Into<PathBuf>) -> Self {
        Self {
            staging: staging.into(),
        }
    }

    /// Staging directory this assembler rebuilds on every run
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Assemble a bundle from `changes`, writing the archive to `output`
    ///
    /// `destination_tree` is the unpacked export of the destination
    /// environment; its `agent.json` is always staged verbatim, so even an
    /// empty change set yields a manifest-only bundle.
    pub fn assemble(
        &self,
        changes: &ChangeSet,
        destination_tree: &Path,
        output: &Path,
    ) -> Result<PathBuf, AssembleError> {
        self.reset_staging()?;

        let mut staged = 0usize;
        for entry in changes.iter() {
            let Some(source) = entry.left.as_deref() else {
                // Present only on the destination: a removal. Removals are
                // not reconciled yet, so surface them instead of silently
                // dropping the entry.
                tracing::warn!(
                    path = %entry.relative.display(),
                    "destination-only file ignored (removals are not promoted)"
                );
                continue;
            };

            if METADATA_ARTIFACTS.contains(&entry.name.as_str()) {
                tracing::debug!(path = %entry.relative.display(), "skipping OS metadata artifact");
                continue;
            }

            let target = self.staging.join(&entry.relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(source, &target)?;
            staged += 1;
        }

        let manifest = destination_tree.join(MANIFEST_FILE);
        if !manifest.exists() {
            return Err(AssembleError::MissingManifest(manifest));
        }
        fs::copy(&manifest, self.staging.join(MANIFEST_FILE))?;

        tracing::info!(staged, archive = %output.display(), "packing bundle");
        let archive = archive::pack(&self.staging, output)?;
        Ok(archive)
    }

    /// Remove and recreate the staging tree with its required subfolders
    fn reset_staging(&self) -> io::Result<()> {
        if self.staging.exists() {
            fs::remove_dir_all(&self.staging)?;
        }
        fs::create_dir_all(&self.staging)?;
        for folder in BUNDLE_FOLDERS {
            fs::create_dir_all(self.staging.join(folder))?;
        }
        Ok(())
    }
}
