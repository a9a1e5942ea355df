//! Tree comparison
//!
//! Compares two unpacked configuration trees file-by-file and reduces the
//! result to the set of changes selected for promotion.
//!
//! Comparison uses size equality first and full content equality second.
//! Files named exactly `agent.json` or `package.json` carry deployment
//! metadata rather than agent semantics and are excluded entirely.
//!
//! The returned [`ChangeSet`] keeps only entries present on one side
//! (`LeftOnly` / `RightOnly`). Files that exist on both sides but differ
//! (`Distinct`) are deliberately NOT selected: the promotion policy moves
//! wholly new files only, never modifications in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File names excluded from comparison regardless of content
pub const EXCLUDED_FILES: [&str; 2] = ["agent.json", "package.json"];

/// Comparison state of one path pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffState {
    /// Present on both sides with identical content
    Equal,
    /// Present on both sides with differing content
    Distinct,
    /// Present only on the left (source) side
    LeftOnly,
    /// Present only on the right (destination) side
    RightOnly,
}

/// One compared path pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Path relative to either tree root
    pub relative: PathBuf,
    /// File name component
    pub name: String,
    /// Absolute path on the left side, if present there
    pub left: Option<PathBuf>,
    /// Absolute path on the right side, if present there
    pub right: Option<PathBuf>,
    /// Size in bytes of whichever side exists (left wins when both do)
    pub size: u64,
    /// Comparison state
    pub state: DiffState,
}

/// Row shape pushed to the operator interface for diff previews
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Relative path of the changed file
    pub name: String,
    /// Comparison state as a wire string
    pub status: DiffState,
    /// File size in bytes
    pub size: u64,
}

/// The filtered list of differences selected for promotion
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    entries: Vec<DiffEntry>,
}

impl ChangeSet {
    /// True when nothing was selected for promotion
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of selected entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over the selected entries in path order
    pub fn iter(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter()
    }

    /// Summaries for the operator interface
    pub fn summaries(&self) -> Vec<ChangeSummary> {
        self.entries
            .iter()
            .map(|e| ChangeSummary {
                name: e.relative.display().to_string(),
                status: e.state,
                size: e.size,
            })
            .collect()
    }
}

/// Compare two trees and return every path pair considered
///
/// Entries come back sorted by relative path. Either root may be missing,
/// in which case it contributes no files.
pub fn diff_trees(left_root: &Path, right_root: &Path) -> io::Result<Vec<DiffEntry>> {
    let left_files = collect_files(left_root)?;
    let right_files = collect_files(right_root)?;

    let all: BTreeSet<&PathBuf> = left_files.union(&right_files).collect();

    let mut entries = Vec::with_capacity(all.len());
    for relative in all {
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if EXCLUDED_FILES.contains(&name.as_str()) {
            continue;
        }

        let on_left = left_files.contains(relative);
        let on_right = right_files.contains(relative);
        let left_path = left_root.join(relative);
        let right_path = right_root.join(relative);

        let (state, size) = match (on_left, on_right) {
            (true, true) => {
                let state = if files_equal(&left_path, &right_path)? {
                    DiffState::Equal
                } else {
                    DiffState::Distinct
                };
                (state, fs::metadata(&left_path)?.len())
            }
            (true, false) => (DiffState::LeftOnly, fs::metadata(&left_path)?.len()),
            (false, true) => (DiffState::RightOnly, fs::metadata(&right_path)?.len()),
            (false, false) => unreachable!("path came from the union of both sides"),
        };

        entries.push(DiffEntry {
            relative: relative.clone(),
            name,
            left: on_left.then(|| left_path.clone()),
            right: on_right.then(|| right_path.clone()),
            size,
            state,
        });
    }

    Ok(entries)
}

/// Compare two trees and keep only the one-side-only entries
pub fn changes(left_root: &Path, right_root: &Path) -> io::Result<ChangeSet> {
    let entries = diff_trees(left_root, right_root)?
        .into_iter()
        .filter(|e| e.state != DiffState::Equal && e.state != DiffState::Distinct)
        .collect();
    Ok(ChangeSet { entries })
}

/// Recursively collect relative file paths under a root
fn collect_files(root: &Path) -> io::Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    if root.is_dir() {
        collect_into(root, root, &mut files)?;
    }
    Ok(files)
}

fn collect_into(root: &Path, dir: &Path, files: &mut BTreeSet<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_into(root, &path, files)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .expect("walked path is under its root")
                .to_path_buf();
            files.insert(relative);
        }
    }
    Ok(())
}

/// Size check first, byte comparison only when sizes match
fn files_equal(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}
