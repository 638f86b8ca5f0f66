//! Storage scenarios
//!
//! Written against `&dyn StorageFixture` so each one runs unchanged on
//! every backend.

use super::ensure;
use crate::error::{HarnessError, HarnessResult};
use crate::runtime::SuiteContext;
use crate::storage::{BackendHandle, StorageFixture};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Scratch directory for staged inputs, inside the suite workspace
fn scratch_dir(context: &SuiteContext, label: &str) -> HarnessResult<PathBuf> {
    let dir = context.workspace.base().join(format!("{label}-{}", Uuid::new_v4().simple()));
    std::fs::create_dir(&dir).map_err(|source| HarnessError::Workspace {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}

async fn write_input(path: &Path, contents: &[u8]) -> HarnessResult<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| HarnessError::Storage {
            operation: "write",
            path: path.to_path_buf(),
            source,
        })
}

/// Staged then retrieved file is byte-identical to the original
pub async fn roundtrip(context: &SuiteContext, fixture: &dyn StorageFixture) -> HarnessResult<()> {
    const NAME: &str = "storage_roundtrip";

    let dir = scratch_dir(context, "roundtrip")?;
    let input = dir.join(format!("input-{}.bin", Uuid::new_v4().simple()));
    let contents: Vec<u8> = (0..=255u8).cycle().take(64 * 1024 + 17).collect();
    write_input(&input, &contents).await?;

    let location = fixture.copy_to_storage(&input).await?;
    let retrieved = fixture.get_from_storage(&location).await?;
    let read_back = tokio::fs::read(&retrieved).await.map_err(|source| HarnessError::Storage {
        operation: "read",
        path: retrieved.clone(),
        source,
    })?;

    info!("🔁 {} -> {} -> {}", input.display(), location, retrieved.display());
    ensure(
        read_back == contents,
        NAME,
        format!("{} differs from {}", retrieved.display(), input.display()),
    )
}

/// Same basename always maps to the same location, and re-staging is fine
pub async fn stable_location(context: &SuiteContext, fixture: &dyn StorageFixture) -> HarnessResult<()> {
    const NAME: &str = "stable_location";

    let basename = format!("stable-{}.txt", Uuid::new_v4().simple());
    let first = scratch_dir(context, "stable-a")?.join(&basename);
    let second = scratch_dir(context, "stable-b")?.join(&basename);
    write_input(&first, b"first upload\n").await?;
    write_input(&second, b"second upload\n").await?;

    let predicted = fixture.location_for(&first)?;
    let first_location = fixture.copy_to_storage(&first).await?;
    let second_location = fixture.copy_to_storage(&second).await?;

    ensure(
        predicted == first_location,
        NAME,
        format!("predicted {predicted} but staged at {first_location}"),
    )?;
    ensure(
        first_location == second_location,
        NAME,
        format!("{first_location} and {second_location} differ for one basename"),
    )?;

    let retrieved = fixture.get_from_storage(&second_location).await?;
    let read_back = tokio::fs::read(&retrieved).await?;
    ensure(read_back == b"second upload\n", NAME, "later upload did not replace the earlier one")
}

/// Creating an existing bucket succeeds and leaves exactly one of it
pub async fn bucket_idempotent(backend: &BackendHandle) -> HarnessResult<()> {
    const NAME: &str = "bucket_idempotent";

    let BackendHandle::ObjectStore { fixture, .. } = backend else {
        info!("⏭️ No buckets on {} storage, nothing to check", backend.kind());
        return Ok(());
    };

    fixture.create_bucket_if_missing().await?;
    fixture.create_bucket_if_missing().await?;
    fixture.ensure_bucket().await?;

    let count = fixture.bucket_count().await?;
    ensure(
        count == 1,
        NAME,
        format!("expected one bucket named '{}', found {count}", fixture.bucket()),
    )
}
