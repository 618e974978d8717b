//! External graphic resources.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Source for resources referenced by a style document.
pub trait AssetSource: Send + Sync {
    /// Read the resource at `path`, relative to the document.
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Filesystem resources relative to a base directory.
#[derive(Clone, Debug)]
pub struct FsAssets {
    base: PathBuf,
}

impl FsAssets {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Assets next to a style document.
    pub fn for_document(document: &Path) -> Self {
        let base = document.parent().map(Path::to_path_buf).unwrap_or_default();
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl AssetSource for FsAssets {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        // Local URLs are resolved like plain relative paths.
        let path = path.strip_prefix("file://").unwrap_or(path);
        fs::read(self.base.join(path))
    }
}
