//! Core module - Instance registry, workspace cloning, launching, and readiness

pub mod cloner;
mod instance;
mod orchestrator;
mod process;
pub mod readiness;
pub mod settings;

pub use cloner::{CloneError, WorkspaceCloner};
pub use instance::{is_clone, Instance, InstanceError, LaunchState, Notification, Severity};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use process::{LaunchConfig, ProcessLauncher};
pub use readiness::{ReadinessConfig, ReadinessError, ReadinessMonitor};
pub use settings::{GlobalSettings, InstanceSettings};
