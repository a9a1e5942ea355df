//! Zip packing and unpacking of bundle trees

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Errors while packing or unpacking an archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Pack a directory tree into a zip archive
///
/// Entry names are relative to `source` with forward slashes, so the
/// archive unpacks to the same layout on any platform. Empty directories
/// are preserved as directory entries.
pub fn pack(source: &Path, archive_path: &Path) -> Result<PathBuf, ArchiveError> {
    let file = fs::File::create(archive_path)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    pack_dir(&mut writer, source, source, options)?;

    writer.finish()?;
    Ok(archive_path.to_path_buf())
}

fn pack_dir(
    writer: &mut ZipWriter<fs::File>,
    root: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> Result<(), ArchiveError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry_name(root, &path);

        if path.is_dir() {
            writer.add_directory(name, options)?;
            pack_dir(writer, root, &path, options)?;
        } else {
            writer.start_file(name, options)?;
            let mut source = fs::File::open(&path)?;
            io::copy(&mut source, writer)?;
        }
    }
    Ok(())
}

fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .expect("walked path is under its root")
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Unpack a zip archive into a directory, creating it if needed
pub fn unpack(archive_path: &Path, destination: &Path) -> Result<(), ArchiveError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    fs::create_dir_all(destination)?;
    archive.extract(destination)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pack_then_unpack_preserves_tree() {
        let source = TempDir::new().unwrap();
        fs::create_dir_all(source.path().join("intents")).unwrap();
        fs::create_dir_all(source.path().join("entities")).unwrap();
        fs::write(source.path().join("agent.json"), "{\"lang\":\"en\"}").unwrap();
        fs::write(source.path().join("intents/greet.json"), "{}").unwrap();

        let out = TempDir::new().unwrap();
        let archive = out.path().join("bundle.zip");
        pack(source.path(), &archive).unwrap();
        assert!(archive.exists());

        let unpacked = out.path().join("unpacked");
        unpack(&archive, &unpacked).unwrap();

        assert_eq!(
            fs::read_to_string(unpacked.join("agent.json")).unwrap(),
            "{\"lang\":\"en\"}"
        );
        assert!(unpacked.join("intents/greet.json").exists());
        assert!(unpacked.join("entities").is_dir());
    }

    #[test]
    fn unpack_of_missing_archive_fails() {
        let out = TempDir::new().unwrap();
        assert!(unpack(&out.path().join("absent.zip"), &out.path().join("x")).is_err());
    }
}
