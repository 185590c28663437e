//! Input discovery: `NAME=PATH` group specs resolved to sorted file lists.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Invalid group '{0}': expected NAME=PATH")]
    InvalidSpec(String),
    #[error("Input path not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No input files under {0}")]
    Empty(PathBuf),
}

/// A named group of inputs, e.g. `native=logs/native`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for GroupSpec {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => Ok(Self {
                name: name.trim().to_string(),
                path: PathBuf::from(path.trim()),
            }),
            _ => Err(SourceError::InvalidSpec(s.to_string())),
        }
    }
}

impl fmt::Display for GroupSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.path.display())
    }
}

/// Files making up a group: the path itself, or every visible regular file
/// directly inside it, sorted by name.
pub fn discover(path: &Path) -> Result<Vec<PathBuf>, SourceError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    let read_err = |source| SourceError::ReadDir {
        path: path.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(path).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let file = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if file.is_file() && !hidden {
            files.push(file);
        }
    }

    if files.is_empty() {
        return Err(SourceError::Empty(path.to_path_buf()));
    }
    files.sort();
    Ok(files)
}
