//! Publishing the working tree to a remote git repository.
//!
//! A sync is gated by a cheap reachability probe ([`Connectivity`]); only if
//! the remote is reachable does the [`VersionControl`] capability stage,
//! commit and push. There is no retry inside a sync: the next scheduled slot
//! is the retry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Reports whether the sync remote is reachable.
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Probe the network. Must return within a bounded time.
    async fn is_online(&self) -> bool;
}

/// TCP connect probe against a fixed host and port.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe `host:port`, giving up after `timeout` (DNS lookup included).
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_online(&self) -> bool {
        match timeout(self.timeout, TcpStream::connect((self.host.as_str(), self.port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Probe {}:{} failed: {}", self.host, self.port, e);
                false
            }
            Err(_) => {
                debug!(
                    "Probe {}:{} timed out after {:?}",
                    self.host, self.port, self.timeout
                );
                false
            }
        }
    }
}

/// One step of a commit-and-push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitStep {
    /// Stage every change.
    Add,
    /// Commit staged changes.
    Commit,
    /// Push to the default remote.
    Push,
}

impl fmt::Display for GitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitStep::Add => write!(f, "add"),
            GitStep::Commit => write!(f, "commit"),
            GitStep::Push => write!(f, "push"),
        }
    }
}

/// Why a commit-and-push failed.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The git program could not be started.
    #[error("git {step} could not be started: {source}")]
    Spawn {
        step: GitStep,
        source: std::io::Error,
    },

    /// A step ran longer than the command timeout and was killed.
    #[error("git {step} timed out after {after:?}")]
    Timeout { step: GitStep, after: Duration },

    /// A step exited unsuccessfully.
    #[error("git {step} failed ({status}): {stderr}")]
    Exit {
        step: GitStep,
        status: ExitStatus,
        stderr: String,
    },
}

/// Version-control capability used by the synchronizer.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Stage everything under `root`, commit with `message`, and push.
    async fn commit_and_push(&self, root: &Path, message: &str) -> Result<(), SyncError>;
}

/// [`VersionControl`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    command_timeout: Duration,
}

impl GitCli {
    /// Use `program` (normally `git`), bounding each invocation by `command_timeout`.
    pub fn new(program: impl Into<PathBuf>, command_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            command_timeout,
        }
    }

    async fn run(&self, root: &Path, step: GitStep, args: &[&str]) -> Result<(), SyncError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-C")
            .arg(root)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!("Running git {} in {}", step, root.display());
        let output = match timeout(self.command_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(SyncError::Spawn { step, source }),
            Err(_) => {
                return Err(SyncError::Timeout {
                    step,
                    after: self.command_timeout,
                });
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // git reports "nothing to commit" on stdout
            let detail = last_line(&stderr).or_else(|| last_line(&stdout)).unwrap_or("");
            Err(SyncError::Exit {
                step,
                status: output.status,
                stderr: detail.to_string(),
            })
        }
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}

#[async_trait]
impl VersionControl for GitCli {
    async fn commit_and_push(&self, root: &Path, message: &str) -> Result<(), SyncError> {
        self.run(root, GitStep::Add, &["add", "."]).await?;
        self.run(root, GitStep::Commit, &["commit", "-m", message]).await?;
        self.run(root, GitStep::Push, &["push"]).await?;
        Ok(())
    }
}

/// Result of one sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The probe found no connectivity; git was not invoked.
    Skipped,
    /// Add, commit and push all succeeded.
    Pushed,
    /// Some step failed; the reason names it.
    Failed(String),
}

impl SyncOutcome {
    /// The alert-log line for this outcome.
    pub fn alert_message(&self) -> String {
        match self {
            SyncOutcome::Skipped => "[GIT] Offline, push skipped".to_string(),
            SyncOutcome::Pushed => "[GIT] Push successful".to_string(),
            SyncOutcome::Failed(reason) => format!("[GIT ERROR] {reason}"),
        }
    }
}

const COMMIT_STAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// Commit message for a sync performed at `at`.
pub fn commit_message(at: PrimitiveDateTime) -> String {
    let stamp = at
        .format(COMMIT_STAMP_FORMAT)
        .unwrap_or_else(|_| at.date().to_string());
    format!("Weather DB update {stamp}")
}

/// Probe-gated commit-and-push.
#[derive(Debug)]
pub struct Synchronizer<P, V> {
    probe: P,
    vcs: V,
}

impl<P: Connectivity, V: VersionControl> Synchronizer<P, V> {
    /// Combine a probe and a version-control backend.
    pub fn new(probe: P, vcs: V) -> Self {
        Self { probe, vcs }
    }

    /// The version-control backend.
    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Commit and push `repo_root` if the remote is reachable.
    pub async fn sync_if_online(&self, repo_root: &Path, message: &str) -> SyncOutcome {
        if !self.probe.is_online().await {
            info!("Offline, skipping sync of {}", repo_root.display());
            return SyncOutcome::Skipped;
        }

        match self.vcs.commit_and_push(repo_root, message).await {
            Ok(()) => {
                info!("Pushed {}", repo_root.display());
                SyncOutcome::Pushed
            }
            Err(e) => {
                warn!("Sync of {} failed: {}", repo_root.display(), e);
                SyncOutcome::Failed(e.to_string())
            }
        }
    }
}
