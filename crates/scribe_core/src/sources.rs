//! Acquisition sources: file selection and folder enumeration
//!
//! The camera source lives in [`crate::camera`]. Both sources here only work
//! out *which* files to load; decoding happens on the worker.

use crate::error::{Result, ScribeError};
use crate::imaging::ImageCodec;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// What a file selection turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The dialog was cancelled or nothing was picked
    Empty,
    /// One file: decoded and loaded as the current image
    Single(PathBuf),
    /// Several files: processed as a batch job, in the given order
    Batch(Vec<PathBuf>),
}

impl Selection {
    pub fn from_paths(mut paths: Vec<PathBuf>) -> Self {
        match paths.len() {
            0 => Selection::Empty,
            1 => Selection::Single(paths.remove(0)),
            _ => Selection::Batch(paths),
        }
    }
}

/// List the recognized image files directly inside `dir`
///
/// Entries come back in directory-listing order; subdirectories are not
/// descended into. Unreadable entries are skipped with a warning.
pub fn enumerate_folder(dir: &Path, codec: &ImageCodec) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ScribeError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.depth() == 0 {
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                    return Err(ScribeError::io(dir, source));
                }
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && codec.is_supported(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!(dir = %dir.display(), count = files.len(), "enumerated folder");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_selection_from_paths() {
        assert_eq!(Selection::from_paths(vec![]), Selection::Empty);
        assert_eq!(
            Selection::from_paths(vec![PathBuf::from("a.png")]),
            Selection::Single(PathBuf::from("a.png"))
        );
        assert_eq!(
            Selection::from_paths(vec![PathBuf::from("b.png"), PathBuf::from("a.png")]),
            Selection::Batch(vec![PathBuf::from("b.png"), PathBuf::from("a.png")])
        );
    }

    #[test]
    fn test_enumerate_folder_filters_extensions() {
        let dir = TempDir::new().unwrap();
        for name in ["one.PNG", "two.jpeg", "three.gif", "notes.txt", "archive.tif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let files = enumerate_folder(dir.path(), &ImageCodec::default()).unwrap();
        let names: HashSet<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        let expected: HashSet<String> = ["one.PNG", "two.jpeg", "three.gif"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_enumerate_folder_matches_listing_order() {
        let dir = TempDir::new().unwrap();
        for name in ["c.png", "a.png", "b.bmp"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let listing: Vec<PathBuf> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();

        let files = enumerate_folder(dir.path(), &ImageCodec::default()).unwrap();
        assert_eq!(files, listing);
    }

    #[test]
    fn test_enumerate_missing_folder() {
        let result = enumerate_folder(Path::new("/nonexistent/scans"), &ImageCodec::default());
        assert!(matches!(result, Err(ScribeError::Io { .. })));
    }

    #[test]
    fn test_enumerate_empty_folder() {
        let dir = TempDir::new().unwrap();
        assert!(enumerate_folder(dir.path(), &ImageCodec::default())
            .unwrap()
            .is_empty());
    }
}
