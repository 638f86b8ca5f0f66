//! Shared types for the task-service integration harness
//!
//! Holds the contract with the service under test: the configuration schema
//! it reads at startup, plus the error and logging conventions every harness
//! crate uses.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::duration::{NO_TIMEOUT, config_seconds};
pub use config::{LocalStorage, S3Storage, ServiceConfig, StorageBackendRef, StorageDescriptor, WorkerConfig};
pub use errors::*;
