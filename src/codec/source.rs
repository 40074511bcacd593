//! Where package text comes from.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::error::LoadError;

/// Resolves a package path to its text.
pub trait PackageSource {
    fn read(&self, path: &str) -> Result<String, LoadError>;
}

/// Package texts held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }
}

impl PackageSource for MemorySource {
    fn read(&self, path: &str) -> Result<String, LoadError> {
        self.files.get(path).cloned().ok_or_else(|| LoadError::Source {
            path: path.to_owned(),
            reason: "no such package".to_owned(),
        })
    }
}

/// Packages on disk. Paths are resolved against `root`.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PackageSource for FsSource {
    fn read(&self, path: &str) -> Result<String, LoadError> {
        fs::read_to_string(self.root.join(path)).map_err(|err| LoadError::Source {
            path: path.to_owned(),
            reason: err.to_string(),
        })
    }
}
