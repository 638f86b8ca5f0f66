//! Local filesystem storage fixture
//!
//! The service reads inputs from, and writes outputs to, an allowed
//! directory on the same host, so staging is a plain copy and retrieval is
//! a path join.

use super::{StorageFixture, StorageKind, StorageLocation, checked_relative, file_basename};
use crate::error::{HarnessError, HarnessResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalStorageFixture {
    root: PathBuf,
}

impl LocalStorageFixture {
    /// Fixture over an existing storage root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `parts` joined under the storage root
    pub fn storage_path<I, P>(&self, parts: I) -> PathBuf
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        parts.into_iter().fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

#[async_trait]
impl StorageFixture for LocalStorageFixture {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    fn location_for(&self, local_path: &Path) -> HarnessResult<StorageLocation> {
        Ok(StorageLocation::Local(PathBuf::from(file_basename(local_path)?)))
    }

    async fn copy_to_storage(&self, local_path: &Path) -> HarnessResult<StorageLocation> {
        let location = self.location_for(local_path)?;
        let StorageLocation::Local(relative) = &location else {
            return Err(HarnessError::invalid_location(&location, "not a local location"));
        };
        let destination = self.root.join(relative);
        if same_file(local_path, &destination).await {
            debug!("{} is already in storage", local_path.display());
            return Ok(location);
        }
        debug!("Copying {} to {}", local_path.display(), destination.display());
        tokio::fs::copy(local_path, &destination)
            .await
            .map_err(|source| HarnessError::Storage {
                operation: "copy",
                path: local_path.to_path_buf(),
                source,
            })?;
        Ok(location)
    }

    async fn get_from_storage(&self, location: &StorageLocation) -> HarnessResult<PathBuf> {
        match location {
            StorageLocation::Local(relative) => Ok(self.root.join(checked_relative(relative)?)),
            other => Err(HarnessError::invalid_location(other, "local storage cannot resolve remote locations")),
        }
    }
}

/// True when both paths resolve to one existing file; copying a file onto
/// itself truncates it
async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
