//! Launch readiness - Polls host state to detect a completed editor startup

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::platform;

/// Name of the auxiliary helper the editor spawns during startup to offer an
/// interactive project picker.
const DEFAULT_HELPER_PROCESS: &str = "Unity Hub";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadinessError {
    #[error("startup was not observed within {0:?}")]
    TimedOut(Duration),

    #[error("readiness wait was cancelled")]
    Cancelled,
}

/// Tunables for the readiness poll.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// The editor's startup log
    pub editor_log: PathBuf,
    /// The package-manager log the editor writes while resolving packages
    pub package_log: PathBuf,
    /// Helper process to detect and dismiss
    pub helper_process: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            editor_log: platform::editor_log_path().unwrap_or_default(),
            package_log: platform::package_log_path().unwrap_or_default(),
            helper_process: DEFAULT_HELPER_PROCESS.to_string(),
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Detects when a launched editor has finished starting up.
///
/// The signal is three conditions polled together: the editor log and the
/// package-manager log both exist, are non-empty, and are no longer held open
/// by their writer; and the project-picker helper the editor spawns is alive.
/// Once all three hold, the helper is force-terminated (its dialog would
/// otherwise block unattended automation) and the wait returns.
///
/// All three signals are host-global, not instance-scoped: the monitor cannot
/// tell which instance's startup it observes, which is why batched launches
/// serialize around it. Launches driven from two separate sessions at once
/// remain an unresolved precondition of the whole scheme.
pub struct ReadinessMonitor {
    config: ReadinessConfig,
}

impl ReadinessMonitor {
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    /// Poll until startup is observed, the timeout elapses, or `cancel` turns
    /// true.
    pub async fn wait_until_ready(
        &self,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<(), ReadinessError> {
        let deadline = Instant::now() + self.config.timeout;
        let mut system = System::new();

        loop {
            if *cancel.borrow() {
                return Err(ReadinessError::Cancelled);
            }

            if self.startup_complete(&mut system) {
                self.dismiss_helper(&system);
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(ReadinessError::TimedOut(self.config.timeout));
            }

            if cancel.has_changed().is_err() {
                // Cancel side is gone; plain polling from here on.
                tokio::time::sleep(self.config.poll_interval).await;
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    _ = cancel.changed() => {}
                }
            }
        }
    }

    fn startup_complete(&self, system: &mut System) -> bool {
        if !file_settled(&self.config.editor_log) || !file_settled(&self.config.package_log) {
            return false;
        }
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        !self.helper_pids(system).is_empty()
    }

    /// Pids of running processes matching the helper name.
    fn helper_pids(&self, system: &System) -> Vec<sysinfo::Pid> {
        let needle = self.config.helper_process.to_lowercase();
        system
            .processes()
            .iter()
            .filter(|(_, proc)| {
                proc.name()
                    .to_string_lossy()
                    .to_lowercase()
                    .contains(&needle)
            })
            .map(|(pid, _)| *pid)
            .collect()
    }

    /// Kill the project-picker helper so its dialog never blocks automation.
    fn dismiss_helper(&self, system: &System) {
        for pid in self.helper_pids(system) {
            if let Some(proc) = system.process(pid) {
                if proc.kill() {
                    info!("dismissed '{}' (PID {})", self.config.helper_process, pid);
                }
            }
        }
    }
}

/// A log file is settled once it exists, has content, and its writer has let
/// go of it (an exclusive lock can be taken).
fn file_settled(path: &Path) -> bool {
    let Ok(file) = OpenOptions::new().read(true).open(path) else {
        return false;
    };
    let Ok(metadata) = file.metadata() else {
        return false;
    };
    if metadata.len() == 0 {
        return false;
    }
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            true
        }
        Err(err) => {
            debug!("{:?} still held by its writer: {}", path, err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> ReadinessConfig {
        ReadinessConfig {
            editor_log: dir.join("Editor.log"),
            package_log: dir.join("upm.log"),
            helper_process: "no-such-helper-process".to_string(),
            poll_interval: Duration::from_millis(10),
            timeout: Duration::from_millis(80),
        }
    }

    #[test]
    fn file_settled_requires_existing_nonempty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("Editor.log");

        assert!(!file_settled(&log));

        std::fs::write(&log, b"").unwrap();
        assert!(!file_settled(&log));

        std::fs::write(&log, b"Rebuilding Library...").unwrap();
        assert!(file_settled(&log));
    }

    #[tokio::test]
    async fn wait_times_out_when_conditions_never_hold() {
        let tmp = tempfile::tempdir().unwrap();
        let monitor = ReadinessMonitor::new(config_in(tmp.path()));
        let (_tx, rx) = watch::channel(false);

        let err = monitor.wait_until_ready(rx).await.unwrap_err();
        assert_eq!(err, ReadinessError::TimedOut(Duration::from_millis(80)));
    }

    #[tokio::test]
    async fn wait_observes_cancellation() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.timeout = Duration::from_secs(30);
        let monitor = ReadinessMonitor::new(config);
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        let err = monitor.wait_until_ready(rx).await.unwrap_err();
        assert_eq!(err, ReadinessError::Cancelled);
    }

    #[tokio::test]
    async fn pre_cancelled_wait_returns_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let monitor = ReadinessMonitor::new(config_in(tmp.path()));
        let (tx, rx) = watch::channel(true);

        let err = monitor.wait_until_ready(rx).await.unwrap_err();
        assert_eq!(err, ReadinessError::Cancelled);
        drop(tx);
    }
}
