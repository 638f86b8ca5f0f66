//! Runtime Management
//!
//! Processes, containers and the suite lifecycle built on top of them.

pub mod checkpoint;
pub mod container;
pub mod emulator;
pub mod process;
pub mod suite;

// Re-export main types
pub use checkpoint::CheckpointClient;
pub use container::{ContainerLookup, ContainerRuntime, ContainerWatcher, DockerRuntime, Expectation};
pub use emulator::ObjectStoreEmulator;
pub use process::{LaunchCommand, ManagedProcess, ProcessSupervisor, resolve_binary};
pub use suite::{SuiteContext, SuiteLifecycle, SuiteState, SuiteWorkspace};
