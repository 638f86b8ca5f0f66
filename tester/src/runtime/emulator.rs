//! S3 Emulator Management
//!
//! Runs a MinIO container that serves the suite's storage root over the S3
//! API. The container is launched through `docker run` under the process
//! supervisor. The container itself belongs to the daemon rather than the
//! launcher's process group, so it is removed by name: before launch (a
//! leftover from an earlier run), on shutdown, and from `Drop` when the
//! emulator is abandoned by a timeout or an interrupt.

use crate::error::{HarnessError, HarnessResult};
use crate::poll::PollCondition;
use crate::runtime::container::ContainerWatcher;
use crate::runtime::process::{LaunchCommand, ManagedProcess, ProcessSupervisor};
use crate::settings::ObjectStoreSettings;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Path the storage root is mounted at inside the container
pub const EXPORT_PATH: &str = "/export";

/// A running storage emulator
///
/// Dropping an emulator that was not shut down removes its container.
#[derive(Debug)]
pub struct ObjectStoreEmulator {
    settings: ObjectStoreSettings,
    runtime_binary: PathBuf,
    process: ManagedProcess,
    released: bool,
}

impl ObjectStoreEmulator {
    /// The `docker run` invocation for the emulator
    pub fn launch_command(runtime_binary: &Path, settings: &ObjectStoreSettings, storage_root: &Path) -> LaunchCommand {
        LaunchCommand::new(runtime_binary)
            .arg("run")
            .arg("-p")
            .arg(format!("{0}:{0}", settings.port))
            .arg("--rm")
            .arg("--name")
            .arg(settings.container_name.clone())
            .arg("-e")
            .arg(format!("MINIO_ACCESS_KEY={}", settings.access_key))
            .arg("-e")
            .arg(format!("MINIO_SECRET_KEY={}", settings.secret_key))
            .arg("-v")
            .arg(format!("{}:{EXPORT_PATH}", storage_root.display()))
            .arg(settings.image.clone())
            .arg("server")
            .arg(EXPORT_PATH)
    }

    /// Start the emulator and wait until both the container and its port are up
    ///
    /// A container left over under the same name is removed first. If the
    /// launcher exits before the endpoint answers, launch fails with its
    /// exit status instead of trusting whatever else holds the name or port.
    pub async fn launch(
        supervisor: &ProcessSupervisor,
        watcher: &ContainerWatcher,
        runtime_binary: &Path,
        settings: &ObjectStoreSettings,
        storage_root: &Path,
    ) -> HarnessResult<Self> {
        let name = settings.container_name.as_str();
        run_runtime(runtime_binary, &["rm", "-fv", name]).await;
        watcher.await_stopped(name, settings.startup_timeout).await?;

        let command = Self::launch_command(runtime_binary, settings, storage_root);
        info!("🪣 Starting storage emulator: {}", command);
        let mut emulator = Self {
            settings: settings.clone(),
            runtime_binary: runtime_binary.to_path_buf(),
            process: supervisor.spawn(&command)?,
            released: false,
        };

        if let Err(err) = emulator.await_ready(watcher).await {
            emulator.shutdown(supervisor, watcher).await.ok();
            return Err(err);
        }

        info!("✅ Storage emulator '{}' ready at {}", name, settings.endpoint);
        Ok(emulator)
    }

    async fn await_ready(&mut self, watcher: &ContainerWatcher) -> HarnessResult<()> {
        let settings = &self.settings;
        watcher
            .await_running(&settings.container_name, settings.startup_timeout)
            .await?;

        let address = strip_scheme(&settings.endpoint).to_string();
        let process = &mut self.process;
        let mut exited = None;
        PollCondition::with_default_interval(format!("{address} to accept connections"), settings.startup_timeout)?
            .wait(|| {
                if exited.is_none() {
                    exited = process.try_exit_status();
                }
                let done = exited.is_some();
                let address = address.clone();
                async move {
                    if done {
                        return Ok(true);
                    }
                    TcpStream::connect(&address).await.map(|_| true)
                }
            })
            .await?;

        match exited {
            Some(status) => Err(HarnessError::ServiceExited {
                command: self.process.command().to_string(),
                status: status.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn settings(&self) -> &ObjectStoreSettings {
        &self.settings
    }

    pub fn process(&self) -> &ManagedProcess {
        &self.process
    }

    /// Stop the launcher, force-remove the container, and wait for it to vanish
    ///
    /// Every step is best effort; only a container that never disappears is
    /// reported.
    pub async fn shutdown(mut self, supervisor: &ProcessSupervisor, watcher: &ContainerWatcher) -> HarnessResult<()> {
        let name = self.settings.container_name.clone();
        info!("🛑 Stopping storage emulator '{}'", name);
        supervisor.terminate(&mut self.process).await;

        run_runtime(&self.runtime_binary, &["kill", &name]).await;
        run_runtime(&self.runtime_binary, &["rm", "-fv", &name]).await;
        self.released = true;

        watcher.await_stopped(&name, self.settings.startup_timeout).await?;
        Ok(())
    }
}

impl Drop for ObjectStoreEmulator {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let name = &self.settings.container_name;
        warn!("🚨 Emergency cleanup: removing container '{}'", name);
        let result = std::process::Command::new(&self.runtime_binary)
            .args(["rm", "-fv", name.as_str()])
            .stdin(Stdio::null())
            .output();
        match result {
            Ok(output) if output.status.success() => {}
            Ok(output) => warn!(
                "⚠️ {} rm -fv {} exited with {}",
                self.runtime_binary.display(),
                name,
                output.status
            ),
            Err(e) => warn!("⚠️ Failed to run {}: {}", self.runtime_binary.display(), e),
        }
    }
}

/// Run a container runtime subcommand, logging instead of failing
async fn run_runtime(runtime_binary: &Path, args: &[&str]) {
    debug!("Running {} {}", runtime_binary.display(), args.join(" "));
    match Command::new(runtime_binary).args(args).stdin(Stdio::null()).output().await {
        Ok(output) if output.status.success() => {}
        Ok(output) => debug!(
            "{} {} exited with {}: {}",
            runtime_binary.display(),
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
        Err(e) => warn!("⚠️ Failed to run {}: {}", runtime_binary.display(), e),
    }
}

/// Wait until a TCP connection to `endpoint` (host:port, optional scheme) succeeds
pub async fn wait_for_port(endpoint: &str, timeout: Duration) -> HarnessResult<Duration> {
    let address = strip_scheme(endpoint).to_string();
    PollCondition::with_default_interval(format!("{address} to accept connections"), timeout)?
        .wait(|| {
            let address = address.clone();
            async move { TcpStream::connect(&address).await.map(|_| true) }
        })
        .await
}

fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(endpoint)
        .trim_end_matches('/')
}
