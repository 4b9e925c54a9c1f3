//! Instance management - Represents a single cloned editor instance

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::settings::InstanceSettings;

/// Subdirectory the editor creates while it holds a project open.
pub const RUN_MARKER_DIR: &str = "Temp";

/// Errors resolving an instance from its clone directory.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("clone directory has no name: {0}")]
    UnnamedDirectory(PathBuf),

    #[error("clone directory name has no numeric suffix: {0}")]
    MalformedName(String),

    #[error("clone directory already registered: {0}")]
    DuplicateDirectory(PathBuf),
}

/// Lifecycle state of an instance's external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LaunchState {
    /// No process bound to the clone
    #[default]
    Idle,
    /// Process spawned, startup not yet observed
    Starting,
    /// Startup completed
    Running,
    /// Startup was never observed within the readiness bound
    Failed,
}

impl LaunchState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Failed => "Failed",
        }
    }
}

/// Severity of a notification attached to an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A keyed message the host renders next to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

/// A cloned editor instance.
///
/// Identity (`id`, `name`) is derived from the clone directory's name, which
/// always ends in `_instance_{n}`. The running state is not stored: the editor
/// keeps a `Temp/` directory inside the project for as long as it has it open,
/// and that directory's presence is the single source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Numeric suffix of the clone directory, unique within the registry
    pub id: u32,
    /// Display name, derived from the directory name
    pub name: String,
    /// The clone's root directory
    pub directory: PathBuf,
    /// Host-facing selection flag
    pub is_selected: bool,
    /// Host-facing detail-view flag
    pub fold_out: bool,
    /// Per-instance settings, persisted independently
    pub settings: InstanceSettings,
    /// Keyed messages for the host to render
    pub notifications: BTreeMap<String, Notification>,
    /// Current lifecycle state
    pub state: LaunchState,
    /// When the current process was spawned
    pub launched_at: Option<DateTime<Utc>>,
}

impl Instance {
    /// Resolve an instance from its clone directory.
    ///
    /// The directory name must carry a numeric `_`-separated suffix; the name
    /// swaps underscores for spaces (`Proj_instance_1` -> `Proj instance 1`).
    pub fn from_directory(directory: PathBuf) -> Result<Self, InstanceError> {
        let dir_name = directory
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| InstanceError::UnnamedDirectory(directory.clone()))?;

        let id = dir_name
            .rsplit('_')
            .next()
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .ok_or_else(|| InstanceError::MalformedName(dir_name.to_string()))?;

        let name = dir_name.replace('_', " ");

        Ok(Self {
            id,
            name,
            directory,
            is_selected: false,
            fold_out: false,
            settings: InstanceSettings::default(),
            notifications: BTreeMap::new(),
            state: LaunchState::Idle,
            launched_at: None,
        })
    }

    /// True iff the editor currently holds this clone open.
    pub fn is_running(&self) -> bool {
        self.directory.join(RUN_MARKER_DIR).is_dir()
    }

    /// Path of the run-marker subdirectory.
    pub fn run_marker(&self) -> PathBuf {
        self.directory.join(RUN_MARKER_DIR)
    }

    /// Mark the instance as spawned but not yet ready.
    pub fn mark_starting(&mut self) {
        self.state = LaunchState::Starting;
        self.launched_at = Some(Utc::now());
    }

    /// Mark startup as observed.
    pub fn mark_running(&mut self) {
        self.state = LaunchState::Running;
    }

    /// Mark startup as never observed.
    pub fn mark_failed(&mut self) {
        self.state = LaunchState::Failed;
    }

    /// Return the instance to its unlaunched state.
    pub fn mark_idle(&mut self) {
        self.state = LaunchState::Idle;
        self.launched_at = None;
    }
}

/// True iff `directory` is a derived clone rather than an origin workspace.
pub fn is_clone(directory: &Path) -> bool {
    directory.join(super::cloner::CLONE_MARKER_FILE).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_identity_from_directory_name() {
        let instance = Instance::from_directory(PathBuf::from("/tmp/clones/Proj_instance_3")).unwrap();
        assert_eq!(instance.id, 3);
        assert_eq!(instance.name, "Proj instance 3");
        assert_eq!(instance.state, LaunchState::Idle);
        assert!(!instance.is_selected);
    }

    #[test]
    fn rejects_directory_without_numeric_suffix() {
        let err = Instance::from_directory(PathBuf::from("/tmp/clones/NotAClone")).unwrap_err();
        assert!(matches!(err, InstanceError::MalformedName(_)));
    }

    #[test]
    fn running_follows_the_run_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Proj_instance_1");
        std::fs::create_dir(&dir).unwrap();

        let instance = Instance::from_directory(dir.clone()).unwrap();
        assert!(!instance.is_running());

        std::fs::create_dir(dir.join(RUN_MARKER_DIR)).unwrap();
        assert!(instance.is_running());

        std::fs::remove_dir(dir.join(RUN_MARKER_DIR)).unwrap();
        assert!(!instance.is_running());
    }

    #[test]
    fn state_transitions_update_timestamps() {
        let mut instance =
            Instance::from_directory(PathBuf::from("/tmp/clones/Proj_instance_1")).unwrap();

        instance.mark_starting();
        assert_eq!(instance.state, LaunchState::Starting);
        assert!(instance.launched_at.is_some());

        instance.mark_running();
        assert!(instance.state.is_active());

        instance.mark_idle();
        assert_eq!(instance.state, LaunchState::Idle);
        assert!(instance.launched_at.is_none());
    }
}
