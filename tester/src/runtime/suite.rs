//! Suite Lifecycle
//!
//! One [`SuiteLifecycle`] per suite run owns the workspace, the materialized
//! config and the service process. Test bodies receive a [`SuiteContext`]
//! from it instead of reaching for globals.
//!
//! Setup is lazy and happens once. Teardown is idempotent and runs whether
//! the body succeeds, fails or is interrupted by a signal.

use crate::config::{ServiceConfigBuilder, materialize_in};
use crate::error::{HarnessError, HarnessResult};
use crate::poll::PollCondition;
use crate::runtime::process::{LaunchCommand, ManagedProcess, ProcessSupervisor, resolve_binary};
use crate::settings::HarnessSettings;
use shared::ServiceConfig;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Exit code used when a signal ends the run
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Per-run directories, all freshly created and never reused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteWorkspace {
    base: PathBuf,
    storage_dir: PathBuf,
    work_dir: PathBuf,
    output_dir: PathBuf,
    dir_name: String,
}

impl SuiteWorkspace {
    /// Create `<root>/<prefix><uuid>` and its `.storage`, `.work-dir` and
    /// `.output` siblings
    pub fn create(root: &Path, prefix: &str) -> HarnessResult<Self> {
        let dir_name = format!("{prefix}{}", Uuid::new_v4().simple());
        let base = root.join(&dir_name);
        let storage_dir = root.join(format!("{dir_name}.storage"));
        let work_dir = root.join(format!("{dir_name}.work-dir"));
        let output_dir = root.join(format!("{dir_name}.output"));

        for dir in [&base, &storage_dir, &work_dir, &output_dir] {
            std::fs::create_dir(dir).map_err(|source| HarnessError::Workspace {
                path: dir.clone(),
                source,
            })?;
        }

        info!("📁 Suite workspace at {}", base.display());
        Ok(Self {
            base,
            storage_dir,
            work_dir,
            output_dir,
            dir_name,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Root the service is allowed to read and write through local storage
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Where retrieved objects are downloaded to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Basename of the base directory; unique per run
    pub fn dir_name(&self) -> &str {
        &self.dir_name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteState {
    Unstarted,
    Ready,
    TornDown,
}

impl fmt::Display for SuiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuiteState::Unstarted => write!(f, "unstarted"),
            SuiteState::Ready => write!(f, "ready"),
            SuiteState::TornDown => write!(f, "torn down"),
        }
    }
}

/// What a test body gets to see of a ready suite
#[derive(Debug, Clone)]
pub struct SuiteContext {
    pub workspace: SuiteWorkspace,
    pub config: ServiceConfig,
    pub config_path: PathBuf,
    pub service_url: String,
    pub service_pid: u32,
}

struct SuiteInner {
    state: SuiteState,
    context: Option<Arc<SuiteContext>>,
    service: Option<ManagedProcess>,
}

pub struct SuiteLifecycle {
    settings: HarnessSettings,
    supervisor: ProcessSupervisor,
    inner: Mutex<SuiteInner>,
}

impl SuiteLifecycle {
    pub fn new(settings: HarnessSettings) -> Self {
        let supervisor = ProcessSupervisor::new().with_grace_period(settings.termination_grace);
        Self {
            settings,
            supervisor,
            inner: Mutex::new(SuiteInner {
                state: SuiteState::Unstarted,
                context: None,
                service: None,
            }),
        }
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub async fn state(&self) -> SuiteState {
        self.inner.lock().await.state
    }

    /// Prepare the workspace and start the service, once
    ///
    /// Later calls return the same context. A failed setup leaves nothing
    /// running and may be retried; setup after teardown is refused.
    pub async fn setup(&self) -> HarnessResult<Arc<SuiteContext>> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SuiteState::Ready => {
                if let Some(context) = &inner.context {
                    return Ok(Arc::clone(context));
                }
            }
            SuiteState::TornDown => {
                return Err(HarnessError::SuiteState {
                    state: inner.state.to_string(),
                    action: "set up".to_string(),
                });
            }
            SuiteState::Unstarted => {}
        }

        let (context, service) = self.start().await?;
        let context = Arc::new(context);
        inner.context = Some(Arc::clone(&context));
        inner.service = Some(service);
        inner.state = SuiteState::Ready;
        Ok(context)
    }

    /// Stop the service; calling it again is a no-op
    ///
    /// The workspace is left on disk for inspection.
    pub async fn teardown(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == SuiteState::TornDown {
            return;
        }
        if let Some(mut service) = inner.service.take() {
            info!("🧹 Tearing down suite");
            self.supervisor.terminate(&mut service).await;
        }
        inner.state = SuiteState::TornDown;
        if let Some(context) = &inner.context {
            info!("📁 Workspace kept at {}", context.workspace.base().display());
        }
    }

    /// Set up, run `body`, and tear down whatever happened
    ///
    /// A SIGINT or SIGTERM during setup or the body aborts the run with
    /// [`HarnessError::Interrupted`].
    pub async fn run<F, Fut, T>(&self, body: F) -> HarnessResult<T>
    where
        F: FnOnce(Arc<SuiteContext>) -> Fut,
        Fut: Future<Output = HarnessResult<T>>,
    {
        // A half-finished setup is dropped on interrupt; its process handle
        // kills the service group on drop.
        let result = tokio::select! {
            result = async { body(self.setup().await?).await } => result,
            signal = shutdown_signal() => {
                warn!("🛑 Received {}, aborting suite", signal);
                Err(HarnessError::Interrupted { signal: signal.to_string() })
            }
        };

        self.teardown().await;
        result
    }

    async fn start(&self) -> HarnessResult<(SuiteContext, ManagedProcess)> {
        let settings = &self.settings;
        let workspace = SuiteWorkspace::create(&settings.temp_root, &settings.workspace_prefix)?;
        let config = self.service_config(&workspace);
        let config_path = materialize_in(&config, workspace.base())?;

        let binary = resolve_binary(&settings.service_binary)?;
        let command = LaunchCommand::new(binary)
            .arg("server")
            .arg("--config")
            .arg(config_path.display().to_string())
            .current_dir(workspace.work_dir());

        info!("🚀 Starting service: {}", command);
        let mut service = self.supervisor.spawn(&command)?;
        let service_url = settings.service_url(config.http_port);

        if let Err(err) = self.await_service(&mut service, &service_url).await {
            error!("❌ Service failed to become ready: {}", err);
            self.supervisor.terminate(&mut service).await;
            return Err(err);
        }

        let context = SuiteContext {
            service_pid: service.pid(),
            workspace,
            config,
            config_path,
            service_url,
        };
        Ok((context, service))
    }

    fn service_config(&self, workspace: &SuiteWorkspace) -> ServiceConfig {
        let settings = &self.settings;
        let store = &settings.object_store;
        let mut builder = ServiceConfigBuilder::new()
            .host_name(settings.host_name.clone())
            .work_dir(workspace.work_dir())
            .log_level(settings.service_log_level.clone())
            .rate(settings.service_rate)
            .local_storage([workspace.storage_dir()])
            .s3_storage(&store.endpoint, &store.access_key, &store.secret_key);
        builder = if settings.random_ports {
            builder.random_ports()
        } else {
            builder.http_port(settings.http_port).rpc_port(settings.rpc_port)
        };
        builder.build()
    }

    /// Poll the HTTP port until anything answers, failing fast if the
    /// service exits first
    async fn await_service(&self, service: &mut ManagedProcess, service_url: &str) -> HarnessResult<Duration> {
        let readiness_url = format!("{}{}", service_url, self.settings.readiness_path);
        let client = reqwest::Client::builder()
            .timeout(self.settings.poll_interval.max(Duration::from_secs(1)))
            .build()?;
        let condition = PollCondition::new(
            format!("service at {readiness_url}"),
            self.settings.readiness_timeout,
            self.settings.poll_interval,
        )?;

        let mut exited = None;
        let elapsed = condition
            .wait(|| {
                if exited.is_none() {
                    exited = service.try_exit_status();
                }
                let done = exited.is_some();
                let request = client.get(&readiness_url);
                async move {
                    if done {
                        return Ok(true);
                    }
                    request.send().await.map(|_| true)
                }
            })
            .await?;

        if let Some(status) = exited {
            return Err(HarnessError::ServiceExited {
                command: service.command().to_string(),
                status: status.to_string(),
            });
        }
        info!("✅ Service ready at {} after {:?}", service_url, elapsed);
        Ok(elapsed)
    }
}

/// Resolve when the process receives SIGINT or SIGTERM
pub async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            },
            Err(e) => {
                warn!("⚠️ Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                "SIGINT"
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "SIGINT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_layout() {
        let root = tempfile::tempdir().unwrap();
        let workspace = SuiteWorkspace::create(root.path(), "funnel-tests-").unwrap();

        assert!(workspace.dir_name().starts_with("funnel-tests-"));
        assert_eq!(workspace.base(), root.path().join(workspace.dir_name()));
        assert_eq!(
            workspace.storage_dir(),
            root.path().join(format!("{}.storage", workspace.dir_name()))
        );
        assert!(workspace.work_dir().to_string_lossy().ends_with(".work-dir"));
        for dir in [workspace.base(), workspace.storage_dir(), workspace.work_dir(), workspace.output_dir()] {
            assert!(dir.is_dir());
        }
    }

    #[test]
    fn test_workspaces_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let first = SuiteWorkspace::create(root.path(), "funnel-tests-").unwrap();
        let second = SuiteWorkspace::create(root.path(), "funnel-tests-").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_service_config_uses_workspace() {
        let root = tempfile::tempdir().unwrap();
        let workspace = SuiteWorkspace::create(root.path(), "funnel-tests-").unwrap();
        let suite = SuiteLifecycle::new(HarnessSettings::default());

        let config = suite.service_config(&workspace);
        assert_eq!(config.work_dir, workspace.work_dir());
        assert_eq!(config.schedule_rate.as_nanos(), 50_000_000);
        assert_eq!(config.storage.len(), 2);
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_teardown_before_setup_blocks_setup() {
        let suite = SuiteLifecycle::new(HarnessSettings::default());
        suite.teardown().await;
        suite.teardown().await;
        assert_eq!(suite.state().await, SuiteState::TornDown);

        let err = suite.setup().await.unwrap_err();
        assert!(matches!(err, HarnessError::SuiteState { .. }));
    }
}
