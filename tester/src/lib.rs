//! Funnel Integration Test Harness
//!
//! Starts the task-execution service against a throwaway workspace, stages
//! files through a local or S3-compatible storage backend, and tears
//! everything down again.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tester::*;
//!
//! # async fn demo() -> HarnessResult<()> {
//! let suite = SuiteLifecycle::new(HarnessSettings::from_env()?);
//! suite
//!     .run(|context| async move {
//!         let fixture = LocalStorageFixture::new(context.workspace.storage_dir());
//!         let location = fixture.copy_to_storage("input.txt".as_ref()).await?;
//!         let path = fixture.get_from_storage(&location).await?;
//!         assert!(path.exists());
//!         Ok(())
//!     })
//!     .await
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod poll;
pub mod runtime;
pub mod scenarios;
pub mod settings;
pub mod storage;

// Main interfaces - re-exported at crate root for convenience
pub use config::{ServiceConfigBuilder, materialize};
pub use error::{HarnessError, HarnessResult};
pub use poll::{PollCondition, wait_for};
pub use runtime::{CheckpointClient, ContainerWatcher, ProcessSupervisor, SuiteContext, SuiteLifecycle};
pub use settings::{HarnessSettings, ObjectStoreSettings};
pub use storage::{LocalStorageFixture, ObjectStoreFixture, StorageFixture, StorageKind, StorageLocation};

// Supporting types
pub use runtime::{ContainerLookup, ContainerRuntime, LaunchCommand, ManagedProcess};
pub use scenarios::{ScenarioOutcome, TestScenarios};
