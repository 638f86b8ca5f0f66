//! Storage Fixtures
//!
//! One interface for staging files into, and fetching files out of, the
//! storage backend the service reads from. Test bodies take a
//! `&dyn StorageFixture` and never learn which backend they run against.

pub mod backend;
pub mod local;
pub mod object;

pub use backend::BackendHandle;
pub use local::LocalStorageFixture;
pub use object::ObjectStoreFixture;

use crate::error::{HarnessError, HarnessResult};
use async_trait::async_trait;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Which backend a fixture talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Local,
    ObjectStore,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Local => write!(f, "local"),
            StorageKind::ObjectStore => write!(f, "s3"),
        }
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "s3" | "object" | "object-store" => Ok(StorageKind::ObjectStore),
            other => Err(format!("unknown storage backend '{other}' (expected local or s3)")),
        }
    }
}

/// Backend address of a staged file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageLocation {
    /// Path relative to the local storage root
    Local(PathBuf),
    /// Object in an S3-compatible bucket
    Object { bucket: String, key: String },
}

impl StorageLocation {
    /// Parse an `s3://bucket/key` URL; anything else is a local relative path
    pub fn parse(raw: &str) -> HarnessResult<Self> {
        if raw.contains("://") {
            let url = url::Url::parse(raw).map_err(|e| HarnessError::invalid_location(raw, e.to_string()))?;
            if url.scheme() != "s3" {
                return Err(HarnessError::invalid_location(raw, format!("unsupported scheme '{}'", url.scheme())));
            }
            let bucket = url
                .host_str()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| HarnessError::invalid_location(raw, "missing bucket"))?
                .to_string();
            let key = url.path().trim_start_matches('/').to_string();
            if key.is_empty() {
                return Err(HarnessError::invalid_location(raw, "missing object key"));
            }
            return Ok(StorageLocation::Object { bucket, key });
        }
        Ok(StorageLocation::Local(checked_relative(Path::new(raw))?))
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            StorageLocation::Local(_) => StorageKind::Local,
            StorageLocation::Object { .. } => StorageKind::ObjectStore,
        }
    }

    /// Final path segment of the location
    pub fn basename(&self) -> Option<&str> {
        match self {
            StorageLocation::Local(path) => path.file_name().and_then(|n| n.to_str()),
            StorageLocation::Object { key, .. } => key.rsplit('/').next().filter(|s| !s.is_empty()),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Local(path) => write!(f, "{}", path.display()),
            StorageLocation::Object { bucket, key } => write!(f, "s3://{bucket}/{key}"),
        }
    }
}

/// Stage and retrieve files in a storage backend
#[async_trait]
pub trait StorageFixture: Send + Sync {
    fn kind(&self) -> StorageKind;

    /// Location `local_path` would be staged at, without staging it
    fn location_for(&self, local_path: &Path) -> HarnessResult<StorageLocation>;

    /// Copy a local file into the backend and return where it landed
    async fn copy_to_storage(&self, local_path: &Path) -> HarnessResult<StorageLocation>;

    /// Resolve a backend location to a local file the test may read
    async fn get_from_storage(&self, location: &StorageLocation) -> HarnessResult<PathBuf>;
}

/// Basename of `path` as UTF-8, the unit every backend keys files by
pub(crate) fn file_basename(path: &Path) -> HarnessResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| HarnessError::invalid_location(path.display(), "path has no file name"))
}

/// Reject absolute paths and `..` so a location cannot escape its root
pub(crate) fn checked_relative(path: &Path) -> HarnessResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(HarnessError::invalid_location(path.display(), "empty path"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(HarnessError::invalid_location(
                    path.display(),
                    "must be relative and stay inside the storage root",
                ));
            }
        }
    }
    Ok(path.to_path_buf())
}
