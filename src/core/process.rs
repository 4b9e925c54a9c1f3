//! Process management - Spawning and terminating editor processes bound to clones

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{error, info, warn};

use super::instance::Instance;
use crate::platform;

/// Environment variable that keeps the external VCS integration from hooking
/// into freshly launched instances.
const VCS_DISABLE_ENV: &str = "GITHUB_UNITY_DISABLE";

/// How the external editor is invoked.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// The editor executable
    pub editor_binary: PathBuf,
    /// Editor-side method invoked after startup to pull in launch settings
    pub post_start_hook: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            editor_binary: platform::default_editor_binary(),
            post_start_hook: "Multiplay.Editor.Bootstrap.ApplyLaunchSettings".to_string(),
        }
    }
}

/// Spawns and force-terminates the editor process bound to each clone.
///
/// Child handles are held only while an instance runs; `terminate` removes
/// them. The run marker on disk stays the source of truth for `is_running`,
/// the handles only exist so termination can kill the right process.
pub struct ProcessLauncher {
    origin: PathBuf,
    config: LaunchConfig,
    children: HashMap<u32, std::process::Child>,
}

impl ProcessLauncher {
    pub fn new(origin: PathBuf, config: LaunchConfig) -> Self {
        Self {
            origin,
            config,
            children: HashMap::new(),
        }
    }

    fn guarded(&self, directory: &Path) -> bool {
        directory.as_os_str().is_empty() || directory == self.origin || !directory.exists()
    }

    /// Spawn the editor against an instance's clone.
    ///
    /// No-op (returns false) when the clone directory is guarded, the instance
    /// is already running, or the launch gate is closed. A spawn failure is
    /// logged and swallowed; no handle is produced and the instance stays idle.
    pub fn launch(&mut self, instance: &Instance, ready_to_launch: bool) -> bool {
        if self.guarded(&instance.directory) || instance.is_running() || !ready_to_launch {
            return false;
        }

        info!("launching '{}' at {:?}", instance.name, instance.directory);

        let mut cmd = Command::new(&self.config.editor_binary);
        cmd.arg("-projectPath")
            .arg(&instance.directory)
            .arg("-executeMethod")
            .arg(&self.config.post_start_hook)
            .env(VCS_DISABLE_ENV, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // The editor outlives the host session.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                cmd.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(0x00000008); // DETACHED_PROCESS
        }

        match cmd.spawn() {
            Ok(child) => {
                info!("spawned editor with PID {}", child.id());
                self.children.insert(instance.id, child);
                true
            }
            Err(err) => {
                error!("failed to spawn editor for '{}': {}", instance.name, err);
                false
            }
        }
    }

    /// Force-terminate an instance's editor and clear its run marker.
    ///
    /// No-op (returns false) under the same directory guard as `launch`. A
    /// child that already exited is not an error; the run marker is cleaned up
    /// either way so `is_running` turns false.
    pub fn terminate(&mut self, instance: &Instance) -> bool {
        if self.guarded(&instance.directory) {
            return false;
        }

        if let Some(mut child) = self.children.remove(&instance.id) {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!("editor for '{}' already exited: {}", instance.name, status)
                }
                _ => {
                    if let Err(err) = child.kill() {
                        warn!("could not kill editor for '{}': {}", instance.name, err);
                    }
                    let _ = child.wait();
                    info!("terminated editor for '{}'", instance.name);
                }
            }
        }

        let run_marker = instance.run_marker();
        if run_marker.exists() {
            if let Err(err) = fs::remove_dir_all(&run_marker) {
                warn!("could not remove run marker {:?}: {}", run_marker, err);
            }
        }
        true
    }

    /// Whether a child handle is held for this instance.
    pub fn has_child(&self, id: u32) -> bool {
        self.children.contains_key(&id)
    }
}
