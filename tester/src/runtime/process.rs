//! Process Supervision
//!
//! Launches external programs as leaders of their own process group so a
//! single signal reaches everything they fork (including `docker run`
//! children), and tears the group down on request. Termination is best
//! effort: a group that is already gone is not an error.

use crate::error::{HarnessError, HarnessResult};
use shared::{resource_debug, resource_info, resource_warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// How long a group gets to exit after SIGTERM before it is killed
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Program, arguments and environment of a process to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A running process group owned by the harness
///
/// Dropping a handle that was never terminated kills the group outright.
#[derive(Debug)]
pub struct ManagedProcess {
    pid: u32,
    pgid: i32,
    command: String,
    working_dir: PathBuf,
    child: Option<Child>,
    exit_status: Option<ExitStatus>,
}

impl ManagedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Process-group id; equal to the pid since the process leads its group
    pub fn pgid(&self) -> i32 {
        self.pgid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// True once the supervisor has terminated this process
    pub fn is_terminated(&self) -> bool {
        self.child.is_none()
    }

    /// Exit status if the leader has exited, without blocking
    pub fn try_exit_status(&mut self) -> Option<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Some(status);
        }
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                resource_warn!(self.command, "⚠️ Error checking process status: {}", e);
                None
            }
        }
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if self.exit_status.is_none() {
                resource_warn!(self.command, "🚨 Emergency cleanup: killing process group {}", self.pgid);
                signal_group(self.pgid, GroupSignal::Kill);
                let _ = child.start_kill();
            }
        }
    }
}

/// Spawns and terminates process groups
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    grace_period: Duration,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Launch `command` as the leader of a new process group
    ///
    /// Returns as soon as the process exists; readiness is up to the caller.
    pub fn spawn(&self, command: &LaunchCommand) -> HarnessResult<ManagedProcess> {
        let shown = command.to_string();
        let working_dir = match &command.current_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(false);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| HarnessError::SpawnFailed {
            command: shown.clone(),
            source,
        })?;
        let pid = child.id().ok_or_else(|| HarnessError::SpawnFailed {
            command: shown.clone(),
            source: std::io::Error::other("process exited before its pid was read"),
        })?;

        resource_info!(shown, "🚀 Spawned pid {} in its own process group", pid);

        Ok(ManagedProcess {
            pid,
            pgid: pid as i32,
            command: shown,
            working_dir,
            child: Some(child),
            exit_status: None,
        })
    }

    /// Signal the whole group and wait for the leader to exit
    ///
    /// Idempotent: a second call, or a call on a group that no longer
    /// exists, is a no-op. Returns the leader's exit status when one was
    /// observed by this call.
    pub async fn terminate(&self, process: &mut ManagedProcess) -> Option<ExitStatus> {
        let Some(mut child) = process.child.take() else {
            resource_debug!(process.command, "Process already terminated");
            return None;
        };

        resource_info!(process.command, "🛑 Terminating process group {}", process.pgid);
        signal_group(process.pgid, GroupSignal::Term);

        let status = match timeout(self.grace_period, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                resource_warn!(process.command, "⚠️ Failed to wait for process: {}", e);
                None
            }
            Err(_) => {
                resource_warn!(
                    process.command,
                    "🔨 Process group {} ignored SIGTERM for {:?}, killing",
                    process.pgid,
                    self.grace_period
                );
                signal_group(process.pgid, GroupSignal::Kill);
                let _ = child.start_kill();
                child.wait().await.ok()
            }
        };

        if let Some(status) = status {
            resource_info!(process.command, "✅ Process exited with {}", status);
            process.exit_status = Some(status);
        }
        status
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Term,
    Kill,
}

/// Send a signal to a process group, swallowing "no such process"
#[cfg(unix)]
fn signal_group(pgid: i32, which: GroupSignal) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let signal = match which {
        GroupSignal::Term => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    match killpg(Pid::from_raw(pgid), signal) {
        Ok(()) => tracing::debug!("📤 Sent {} to process group {}", signal, pgid),
        Err(Errno::ESRCH) => tracing::debug!("Process group {} already gone", pgid),
        Err(e) => tracing::warn!("⚠️ Failed to send {} to process group {}: {}", signal, pgid, e),
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: i32, _which: GroupSignal) {}

/// Locate a binary on `PATH`
pub fn resolve_binary(name: &str) -> HarnessResult<PathBuf> {
    which::which(name).map_err(|_| HarnessError::BinaryNotFound { name: name.to_string() })
}
