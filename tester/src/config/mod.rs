//! Configuration Management
//!
//! Builders for the service config plus the materializer that writes it to disk.

pub mod builder;
pub mod materialize;

// Re-export main types
pub use builder::ServiceConfigBuilder;
pub use materialize::{load, materialize, materialize_in};
