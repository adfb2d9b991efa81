//! Filesystem provider used by discovery, indexing and token extraction.
//!
//! [`LocalFs`] reads the real disk through `tokio::fs`. [`MemoryFs`] keeps a
//! file map in memory; directories are implied by the files beneath them.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::BoxFuture;

/// Errors from filesystem access.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            FsError::NotFound(path.to_path_buf())
        } else {
            FsError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub is_dir: bool,
    pub len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Async filesystem access.
///
/// Returns boxed futures so the provider can be shared as
/// `Arc<dyn FileSystem>`.
pub trait FileSystem: Send + Sync {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool>;

    fn stat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<FileStat, FsError>>;

    fn read_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, FsError>>;

    /// Immediate children of `path`, sorted by path.
    fn read_directory<'a>(&'a self, path: &'a Path)
    -> BoxFuture<'a, Result<Vec<DirEntry>, FsError>>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(async move { tokio::fs::try_exists(path).await.unwrap_or(false) })
    }

    fn stat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<FileStat, FsError>> {
        Box::pin(async move {
            let meta = tokio::fs::metadata(path)
                .await
                .map_err(|e| FsError::from_io(path, e))?;
            Ok(FileStat {
                is_file: meta.is_file(),
                is_dir: meta.is_dir(),
                len: meta.len(),
            })
        })
    }

    fn read_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, FsError>> {
        Box::pin(async move {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| FsError::from_io(path, e))
        })
    }

    fn read_directory<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<DirEntry>, FsError>> {
        Box::pin(async move {
            let mut dir = tokio::fs::read_dir(path)
                .await
                .map_err(|e| FsError::from_io(path, e))?;
            let mut entries = Vec::new();
            while let Some(entry) = dir
                .next_entry()
                .await
                .map_err(|e| FsError::from_io(path, e))?
            {
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(false);
                entries.push(DirEntry {
                    path: entry.path(),
                    is_dir,
                });
            }
            entries.sort();
            Ok(entries)
        })
    }
}

/// In-memory filesystem for tests and fuzzing.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RwLock<BTreeMap<PathBuf, String>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), contents.into());
        }
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.files
            .write()
            .map(|mut files| files.remove(path).is_some())
            .unwrap_or(false)
    }

    fn is_dir(files: &BTreeMap<PathBuf, String>, path: &Path) -> bool {
        files
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }
}

impl FileSystem for MemoryFs {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            self.files
                .read()
                .map(|files| files.contains_key(path) || Self::is_dir(&files, path))
                .unwrap_or(false)
        })
    }

    fn stat<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<FileStat, FsError>> {
        Box::pin(async move {
            let files = self
                .files
                .read()
                .map_err(|_| FsError::NotFound(path.to_path_buf()))?;
            if let Some(contents) = files.get(path) {
                return Ok(FileStat {
                    is_file: true,
                    is_dir: false,
                    len: contents.len() as u64,
                });
            }
            if Self::is_dir(&files, path) {
                return Ok(FileStat {
                    is_file: false,
                    is_dir: true,
                    len: 0,
                });
            }
            Err(FsError::NotFound(path.to_path_buf()))
        })
    }

    fn read_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, FsError>> {
        Box::pin(async move {
            self.files
                .read()
                .ok()
                .and_then(|files| files.get(path).cloned())
                .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
        })
    }

    fn read_directory<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<DirEntry>, FsError>> {
        Box::pin(async move {
            let files = self
                .files
                .read()
                .map_err(|_| FsError::NotFound(path.to_path_buf()))?;
            if files.contains_key(path) {
                return Err(FsError::NotADirectory(path.to_path_buf()));
            }

            let mut entries = BTreeSet::new();
            for file in files.keys() {
                let Ok(rest) = file.strip_prefix(path) else {
                    continue;
                };
                let mut parts = rest.components();
                let Some(first) = parts.next() else {
                    continue;
                };
                entries.insert(DirEntry {
                    path: path.join(first),
                    is_dir: parts.next().is_some(),
                });
            }
            if entries.is_empty() {
                return Err(FsError::NotFound(path.to_path_buf()));
            }
            Ok(entries.into_iter().collect())
        })
    }
}
