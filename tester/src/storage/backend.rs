//! Backend selection
//!
//! Builds the fixture for a chosen [`StorageKind`] on top of a ready suite.
//! The object store backend also owns the emulator it runs against and
//! stops it on release.

use super::{LocalStorageFixture, ObjectStoreFixture, StorageFixture, StorageKind};
use crate::error::HarnessResult;
use crate::runtime::container::{ContainerWatcher, DockerRuntime};
use crate::runtime::emulator::ObjectStoreEmulator;
use crate::runtime::process::resolve_binary;
use crate::runtime::suite::{SuiteContext, SuiteLifecycle};
use std::sync::Arc;
use tracing::warn;

pub enum BackendHandle {
    Local(LocalStorageFixture),
    ObjectStore {
        fixture: ObjectStoreFixture,
        emulator: ObjectStoreEmulator,
        watcher: ContainerWatcher,
    },
}

impl BackendHandle {
    pub async fn open(kind: StorageKind, suite: &SuiteLifecycle, context: &SuiteContext) -> HarnessResult<Self> {
        let workspace = &context.workspace;
        match kind {
            StorageKind::Local => Ok(BackendHandle::Local(LocalStorageFixture::new(workspace.storage_dir()))),
            StorageKind::ObjectStore => {
                let settings = suite.settings();
                let runtime_binary = resolve_binary(&settings.container_runtime)?;
                let watcher =
                    ContainerWatcher::new(Arc::new(DockerRuntime::connect()?)).with_interval(settings.poll_interval);
                let emulator = ObjectStoreEmulator::launch(
                    suite.supervisor(),
                    &watcher,
                    &runtime_binary,
                    &settings.object_store,
                    workspace.storage_dir(),
                )
                .await?;

                let fixture =
                    ObjectStoreFixture::connect(&settings.object_store, workspace.dir_name(), workspace.output_dir())
                        .await;
                if let Err(err) = fixture.ensure_bucket().await {
                    if let Err(stop_err) = emulator.shutdown(suite.supervisor(), &watcher).await {
                        warn!("⚠️ Emulator did not stop cleanly: {}", stop_err);
                    }
                    return Err(err);
                }

                Ok(BackendHandle::ObjectStore {
                    fixture,
                    emulator,
                    watcher,
                })
            }
        }
    }

    pub fn kind(&self) -> StorageKind {
        self.fixture().kind()
    }

    pub fn fixture(&self) -> &dyn StorageFixture {
        match self {
            BackendHandle::Local(fixture) => fixture,
            BackendHandle::ObjectStore { fixture, .. } => fixture,
        }
    }

    /// Stop anything the backend started
    pub async fn release(self, suite: &SuiteLifecycle) -> HarnessResult<()> {
        match self {
            BackendHandle::Local(_) => Ok(()),
            BackendHandle::ObjectStore { emulator, watcher, .. } => emulator.shutdown(suite.supervisor(), &watcher).await,
        }
    }
}
