//! Container Watching
//!
//! Waits for a named container to appear or disappear. Lookups return an
//! explicit [`ContainerLookup`] and [`Expectation::is_met_by`] decides which
//! outcomes satisfy a wait, so the handling of runtime errors is a visible
//! policy instead of a catch-all.

use crate::error::{HarnessError, HarnessResult};
use crate::poll::{DEFAULT_INTERVAL, PollCondition};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::InspectContainerOptions;
use bollard::errors::Error as DockerError;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of asking the runtime about one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerLookup {
    Found,
    NotFound,
    /// The runtime could not answer (daemon down, socket error, ...)
    TransientError(String),
}

/// What a wait is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Running,
    Stopped,
}

impl Expectation {
    /// A failed lookup counts the same as "not found": it never satisfies
    /// `Running` and always satisfies `Stopped`.
    pub fn is_met_by(self, lookup: &ContainerLookup) -> bool {
        match (self, lookup) {
            (Expectation::Running, ContainerLookup::Found) => true,
            (Expectation::Running, _) => false,
            (Expectation::Stopped, ContainerLookup::Found) => false,
            (Expectation::Stopped, ContainerLookup::NotFound) => true,
            (Expectation::Stopped, ContainerLookup::TransientError(_)) => true,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Expectation::Running => "running",
            Expectation::Stopped => "stopped",
        }
    }
}

/// Container runtime introspection seam
#[mockall::automock]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Look a container up by name
    async fn lookup(&self, name: &str) -> ContainerLookup;
}

/// Docker Engine API client
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform's default socket
    pub fn connect() -> HarnessResult<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| HarnessError::ContainerRuntime {
            message: e.to_string(),
        })?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn lookup(&self, name: &str) -> ContainerLookup {
        match self.docker.inspect_container(name, None::<InspectContainerOptions>).await {
            Ok(_) => ContainerLookup::Found,
            Err(DockerError::DockerResponseServerError { status_code: 404, .. }) => ContainerLookup::NotFound,
            Err(e) => ContainerLookup::TransientError(e.to_string()),
        }
    }
}

/// Polls a [`ContainerRuntime`] until a container reaches an expected state
#[derive(Clone)]
pub struct ContainerWatcher {
    runtime: Arc<dyn ContainerRuntime>,
    interval: Duration,
}

impl ContainerWatcher {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Wait until the runtime reports the container
    pub async fn await_running(&self, name: &str, timeout: Duration) -> HarnessResult<Duration> {
        self.await_state(name, Expectation::Running, timeout).await
    }

    /// Wait until the runtime no longer reports the container
    pub async fn await_stopped(&self, name: &str, timeout: Duration) -> HarnessResult<Duration> {
        self.await_state(name, Expectation::Stopped, timeout).await
    }

    pub async fn await_state(&self, name: &str, expectation: Expectation, timeout: Duration) -> HarnessResult<Duration> {
        let condition = PollCondition::new(
            format!("container '{name}' to be {}", expectation.label()),
            timeout,
            self.interval.min(timeout),
        )?;

        let elapsed = condition
            .wait(|| {
                let runtime = Arc::clone(&self.runtime);
                let name = name.to_string();
                async move {
                    let lookup = runtime.lookup(&name).await;
                    if let ContainerLookup::TransientError(ref message) = lookup {
                        debug!(container = %name, "Runtime lookup failed: {}", message);
                    }
                    Ok::<_, Infallible>(expectation.is_met_by(&lookup))
                }
            })
            .await?;

        info!(container = %name, "🐳 Container {} after {:?}", expectation.label(), elapsed);
        Ok(elapsed)
    }
}
