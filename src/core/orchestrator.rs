//! Orchestration - Owns the instance registry and sequences batched operations

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::cloner::{WorkspaceCloner, DEFAULT_SHARED_RESOURCES};
use super::instance::{Instance, InstanceError, Notification};
use super::process::{LaunchConfig, ProcessLauncher};
use super::readiness::{ReadinessConfig, ReadinessError, ReadinessMonitor};
use super::settings::{GlobalSettings, InstanceSettings};
use crate::persistence::SettingsStore;

/// Notification key for a missing remote-device binding.
pub const DEVICE_NOTIFICATION: &str = "Device";
/// Notification key for a missing social identity.
pub const SOCIAL_NOTIFICATION: &str = "SocialId";

const DEVICE_NOT_SELECTED: &str = "Remote device not selected!";

/// Session configuration for an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// The origin workspace clones are derived from
    pub origin: PathBuf,
    /// Resources symlinked from every clone back to the origin
    pub shared_resources: Vec<String>,
    pub launch: LaunchConfig,
    pub readiness: ReadinessConfig,
    /// Per-position delay applied to queued batch launches
    pub stagger_delay: Duration,
}

impl OrchestratorConfig {
    pub fn new(origin: PathBuf) -> Self {
        Self {
            origin,
            shared_resources: DEFAULT_SHARED_RESOURCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            launch: LaunchConfig::default(),
            readiness: ReadinessConfig::default(),
            stagger_delay: Duration::from_millis(1000),
        }
    }

    /// Project name, taken from the origin directory's name.
    pub fn project_name(&self) -> String {
        self.origin
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Project".to_string())
    }
}

/// Session-wide mutable state: the instance collection plus orchestration flags.
#[derive(Default)]
struct Registry {
    instances: Vec<Instance>,
    clone_root: Option<PathBuf>,
    ready_to_launch: bool,
    global: GlobalSettings,
}

/// Owns the registry and coordinates the cloner, settings store, launcher and
/// readiness monitor on behalf of the host.
///
/// Constructed once per session. The host thread and background batch tasks
/// share it; all registry access goes through one `RwLock`, and nothing holds
/// that lock across a suspension point.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: Arc<RwLock<Registry>>,
    launcher: Arc<Mutex<ProcessLauncher>>,
    cloner: WorkspaceCloner,
    store: SettingsStore,
    monitor: ReadinessMonitor,
    cancel: watch::Sender<bool>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let cloner = WorkspaceCloner::new(config.origin.clone(), config.shared_resources.clone());
        let store = SettingsStore::new(&config.origin);
        let launcher = ProcessLauncher::new(config.origin.clone(), config.launch.clone());
        let monitor = ReadinessMonitor::new(config.readiness.clone());
        let (cancel, _) = watch::channel(false);

        Self {
            config,
            registry: Arc::new(RwLock::new(Registry::default())),
            launcher: Arc::new(Mutex::new(launcher)),
            cloner,
            store,
            monitor,
            cancel,
        }
    }

    /// Resolve the clone root and discover existing clones into the registry.
    ///
    /// Runs once at session start. The container directory comes from the
    /// persisted global settings, falling back to a per-user data directory.
    pub fn init(&self) -> Result<()> {
        let global = self
            .store
            .load_global()
            .context("loading global settings")?;
        let container = global
            .container_dir
            .clone()
            .unwrap_or_else(default_container_dir);
        let clone_root = container.join(self.config.project_name());
        fs::create_dir_all(&clone_root)
            .with_context(|| format!("creating clone root {clone_root:?}"))?;

        {
            let mut registry = self.write_registry()?;
            registry.global = global;
            registry.clone_root = Some(clone_root.clone());
        }

        let existing = instance_directories(&clone_root)?;
        info!(
            "session initialized at {:?} with {} existing clone(s)",
            clone_root,
            existing.len()
        );
        for index in 0..existing.len() {
            self.create(&self.config.project_name(), index, true);
        }
        Ok(())
    }

    /// Tear the session down: cancel in-flight waits and clear the registry.
    /// Clones and settings blobs stay on disk for the next session to discover.
    pub fn reset(&self) -> Result<()> {
        self.cancel.send_replace(true);
        let mut registry = self.write_registry()?;
        *registry = Registry::default();
        info!("session reset");
        Ok(())
    }

    /// Signal every in-flight readiness wait to give up.
    pub fn cancel_batches(&self) {
        self.cancel.send_replace(true);
    }

    // === Creation & removal ===

    /// Create an instance, or attach to the `index`-th discovered clone when
    /// `reuse_existing` is set.
    ///
    /// Creation is best-effort: any failure is logged and the instance is
    /// dropped, leaving the registry as it was.
    pub fn create(&self, base_name: &str, index: usize, reuse_existing: bool) -> Option<u32> {
        match self.try_create(base_name, index, reuse_existing) {
            Ok(id) => Some(id),
            Err(err) => {
                error!("could not create instance: {err:#}");
                None
            }
        }
    }

    fn try_create(&self, base_name: &str, index: usize, reuse_existing: bool) -> Result<u32> {
        let clone_root = self.clone_root()?;

        let directory = if reuse_existing {
            let existing = instance_directories(&clone_root)?;
            existing
                .get(index)
                .cloned()
                .ok_or_else(|| anyhow!("no clone directory at position {index}"))?
        } else {
            let registered: Vec<PathBuf> = self
                .read_registry()?
                .instances
                .iter()
                .map(|instance| instance.directory.clone())
                .collect();
            self.cloner
                .create_clone(&clone_root, base_name, index, &registered)?
        };

        let mut instance = Instance::from_directory(directory)?;
        {
            let registry = self.read_registry()?;
            if registry
                .instances
                .iter()
                .any(|other| other.directory == instance.directory)
            {
                return Err(InstanceError::DuplicateDirectory(instance.directory.clone()).into());
            }
        }

        if !reuse_existing {
            self.store.save(instance.id, &InstanceSettings::default())?;
        }
        instance.settings = self.store.load(instance.id)?;

        let id = instance.id;
        self.write_registry()?.instances.push(instance);
        info!("registered instance {id}");
        Ok(id)
    }

    /// Delete an instance's clone, settings blob, and registry entry.
    /// Skipped while the instance is running.
    pub fn remove(&self, id: u32) -> Result<()> {
        let Some(instance) = self.find(id)? else {
            return Ok(());
        };
        if instance.is_running() {
            warn!("not removing running instance '{}'", instance.name);
            return Ok(());
        }
        let removed = self
            .cloner
            .remove_clone(&instance.directory)
            .with_context(|| format!("removing clone {:?}", instance.directory))?;
        if removed {
            self.store.remove(id)?;
            self.write_registry()?
                .instances
                .retain(|other| other.id != id);
            info!("removed instance '{}'", instance.name);
        }
        Ok(())
    }

    /// Remove every selected, non-running instance.
    pub fn remove_selected(&self) -> Result<()> {
        for id in self.selected_ids(|instance| !instance.is_running())? {
            if let Err(err) = self.remove(id) {
                error!("failed to remove instance {id}: {err:#}");
            }
        }
        Ok(())
    }

    // === Validation ===

    /// Validate one instance ahead of a launch.
    ///
    /// Opens the launch gate, then closes it again if the instance has no
    /// remote device bound, expanding its detail view and attaching a
    /// `"Device"` error for the host to render. Returns whether launch is
    /// permitted.
    pub fn validate_single_launch(&self, id: u32) -> Result<bool> {
        let mut registry = self.write_registry()?;
        registry.ready_to_launch = true;

        let instance = registry
            .instances
            .iter_mut()
            .find(|instance| instance.id == id)
            .ok_or_else(|| anyhow!("no instance with id {id}"))?;
        instance.fold_out = false;
        instance.notifications.clear();

        if instance.settings.has_device_selected() {
            return Ok(true);
        }

        instance.fold_out = true;
        instance
            .notifications
            .insert(DEVICE_NOTIFICATION.to_string(), Notification::error(DEVICE_NOT_SELECTED));
        registry.ready_to_launch = false;
        Ok(false)
    }

    /// Validate every selected instance ahead of a batch launch.
    ///
    /// Failing selected instances are flagged in id order; the first one is
    /// focused and returned. The launch gate ends open only when nothing
    /// failed.
    pub fn validate_multiple_launches(&self) -> Result<Option<u32>> {
        let mut registry = self.write_registry()?;
        registry.ready_to_launch = true;

        let mut failing = Vec::new();
        for instance in registry.instances.iter_mut() {
            instance.fold_out = false;
            instance.notifications.clear();
            if instance.is_selected && !instance.settings.has_device_selected() {
                failing.push(instance.id);
            }
        }
        failing.sort_unstable();

        for id in &failing {
            registry.ready_to_launch = false;
            if let Some(instance) = registry
                .instances
                .iter_mut()
                .find(|instance| instance.id == *id)
            {
                instance.fold_out = true;
                instance
                    .notifications
                    .insert(DEVICE_NOTIFICATION.to_string(), Notification::error(DEVICE_NOT_SELECTED));
            }
        }

        Ok(failing.first().copied())
    }

    // === Launch & terminate ===

    /// Launch one instance and drive it to `Running` or `Failed`.
    ///
    /// Refused (returns false) when the launch gate is closed or the launcher
    /// guard trips. The call suspends across the readiness wait, so run it on
    /// a background task, never on the host thread.
    pub async fn launch(&self, id: u32) -> Result<bool> {
        self.cancel.send_replace(false);
        self.run_launch(id).await
    }

    /// Launch every selected, non-running instance, serialized.
    ///
    /// Each queued launch sleeps `position * stagger_delay` and then waits for
    /// the host-global readiness signal before the next may proceed. A
    /// readiness timeout marks that instance `Failed` and the batch moves on;
    /// cancellation stops the batch.
    pub async fn launch_selected(&self) -> Result<()> {
        self.cancel.send_replace(false);
        let queued = self.selected_ids(|instance| !instance.is_running())?;

        for (position, id) in queued.into_iter().enumerate() {
            if *self.cancel.borrow() {
                info!("batch launch cancelled");
                break;
            }
            if !self.read_registry()?.ready_to_launch {
                continue;
            }
            tokio::time::sleep(self.config.stagger_delay * position as u32).await;
            self.run_launch(id).await?;
        }
        Ok(())
    }

    async fn run_launch(&self, id: u32) -> Result<bool> {
        let (instance, gate) = {
            let registry = self.read_registry()?;
            let instance = registry
                .instances
                .iter()
                .find(|instance| instance.id == id)
                .ok_or_else(|| anyhow!("no instance with id {id}"))?
                .clone();
            (instance, registry.ready_to_launch)
        };

        let launched = self
            .lock_launcher()?
            .launch(&instance, gate);
        if !launched {
            return Ok(false);
        }
        self.with_instance(id, Instance::mark_starting)?;

        match self.monitor.wait_until_ready(self.cancel.subscribe()).await {
            Ok(()) => {
                self.with_instance(id, Instance::mark_running)?;
                info!("instance '{}' is running", instance.name);
            }
            Err(ReadinessError::TimedOut(bound)) => {
                self.with_instance(id, Instance::mark_failed)?;
                warn!(
                    "instance '{}' did not become ready within {:?}",
                    instance.name, bound
                );
            }
            Err(ReadinessError::Cancelled) => {
                info!("readiness wait for '{}' cancelled", instance.name);
            }
        }
        Ok(true)
    }

    /// Force-terminate one instance and return it to `Idle`.
    pub fn terminate(&self, id: u32) -> Result<()> {
        let Some(instance) = self.find(id)? else {
            return Ok(());
        };
        if self.lock_launcher()?.terminate(&instance) {
            self.with_instance(id, Instance::mark_idle)?;
        }
        Ok(())
    }

    /// Terminate every selected, running instance.
    pub fn terminate_selected(&self) -> Result<()> {
        for id in self.selected_ids(Instance::is_running)? {
            if let Err(err) = self.terminate(id) {
                error!("failed to terminate instance {id}: {err:#}");
            }
        }
        Ok(())
    }

    // === Host-facing state ===

    /// Snapshot of all instances, in registry order.
    pub fn instances(&self) -> Result<Vec<Instance>> {
        Ok(self.read_registry()?.instances.clone())
    }

    pub fn find(&self, id: u32) -> Result<Option<Instance>> {
        Ok(self
            .read_registry()?
            .instances
            .iter()
            .find(|instance| instance.id == id)
            .cloned())
    }

    pub fn ready_to_launch(&self) -> Result<bool> {
        Ok(self.read_registry()?.ready_to_launch)
    }

    pub fn clone_root(&self) -> Result<PathBuf> {
        self.read_registry()?
            .clone_root
            .clone()
            .ok_or_else(|| anyhow!("orchestrator is not initialized"))
    }

    pub fn project_name(&self) -> String {
        self.config.project_name()
    }

    pub fn set_selected(&self, id: u32, selected: bool) -> Result<()> {
        self.with_instance(id, |instance| instance.is_selected = selected)
    }

    pub fn select_all(&self, selected: bool) -> Result<()> {
        let mut registry = self.write_registry()?;
        for instance in registry.instances.iter_mut() {
            instance.is_selected = selected;
        }
        Ok(())
    }

    /// Bind a remote device to an instance and persist it. A real binding
    /// clears any pending `"Device"` notification.
    pub fn set_device(&self, id: u32, device_id: &str) -> Result<()> {
        let settings = {
            let mut registry = self.write_registry()?;
            let instance = registry
                .instances
                .iter_mut()
                .find(|instance| instance.id == id)
                .ok_or_else(|| anyhow!("no instance with id {id}"))?;
            instance.settings.device_id = device_id.to_string();
            if instance.settings.has_device_selected() {
                instance.notifications.remove(DEVICE_NOTIFICATION);
            }
            instance.settings.clone()
        };
        self.store.save(id, &settings)?;
        Ok(())
    }

    /// Set an instance's social identity and persist it.
    pub fn set_social_id(&self, id: u32, social_id: &str) -> Result<()> {
        let settings = {
            let mut registry = self.write_registry()?;
            let instance = registry
                .instances
                .iter_mut()
                .find(|instance| instance.id == id)
                .ok_or_else(|| anyhow!("no instance with id {id}"))?;
            instance.settings.social_id = social_id.to_string();
            if instance.settings.has_social_id() {
                instance.notifications.remove(SOCIAL_NOTIFICATION);
            }
            instance.settings.clone()
        };
        self.store.save(id, &settings)?;
        Ok(())
    }

    // === Global settings ===

    pub fn global(&self) -> Result<GlobalSettings> {
        Ok(self.read_registry()?.global.clone())
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.update_global(|global| global.enabled = enabled)
    }

    pub fn set_play_on_launch(&self, play_on_launch: bool) -> Result<()> {
        self.update_global(|global| global.play_on_launch = play_on_launch)
    }

    /// Point the session at a different container directory, moving the
    /// existing container there. Only legal while no instances are registered.
    pub fn set_container_dir(&self, container: PathBuf) -> Result<()> {
        {
            let registry = self.read_registry()?;
            if !registry.instances.is_empty() {
                return Err(anyhow!(
                    "cannot change the container directory while instances exist"
                ));
            }
        }

        let old_container = self
            .global()?
            .container_dir
            .unwrap_or_else(default_container_dir);
        self.cloner.relocate_container(&old_container, &container)?;

        let clone_root = container.join(self.config.project_name());
        fs::create_dir_all(&clone_root)
            .with_context(|| format!("creating clone root {clone_root:?}"))?;

        self.update_global(|global| global.container_dir = Some(container.clone()))?;
        self.write_registry()?.clone_root = Some(clone_root);
        Ok(())
    }

    fn update_global(&self, update: impl FnOnce(&mut GlobalSettings)) -> Result<()> {
        let global = {
            let mut registry = self.write_registry()?;
            update(&mut registry.global);
            registry.global.clone()
        };
        self.store.save_global(&global)?;
        Ok(())
    }

    // === Internals ===

    fn selected_ids(&self, filter: impl Fn(&Instance) -> bool) -> Result<Vec<u32>> {
        let registry = self.read_registry()?;
        let mut ids: Vec<u32> = registry
            .instances
            .iter()
            .filter(|instance| instance.is_selected && filter(instance))
            .map(|instance| instance.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn with_instance(&self, id: u32, apply: impl FnOnce(&mut Instance)) -> Result<()> {
        let mut registry = self.write_registry()?;
        let instance = registry
            .instances
            .iter_mut()
            .find(|instance| instance.id == id)
            .ok_or_else(|| anyhow!("no instance with id {id}"))?;
        apply(instance);
        Ok(())
    }

    fn read_registry(&self) -> Result<RwLockReadGuard<'_, Registry>> {
        self.registry
            .read()
            .map_err(|err| anyhow!("registry lock poisoned: {err}"))
    }

    fn write_registry(&self) -> Result<RwLockWriteGuard<'_, Registry>> {
        self.registry
            .write()
            .map_err(|err| anyhow!("registry lock poisoned: {err}"))
    }

    fn lock_launcher(&self) -> Result<std::sync::MutexGuard<'_, ProcessLauncher>> {
        self.launcher
            .lock()
            .map_err(|err| anyhow!("launcher lock poisoned: {err}"))
    }
}

/// Default container for clone roots, under the per-user data directory.
fn default_container_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Multiplay")
        .join("___MultipleEditors")
}

/// Clone directories under `clone_root`, sorted by name for stable discovery.
fn instance_directories(clone_root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut directories: Vec<PathBuf> = fs::read_dir(clone_root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    directories.sort();
    Ok(directories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::{LaunchState, RUN_MARKER_DIR};
    use crate::core::settings::DEVICE_NONE;

    fn session(tmp: &tempfile::TempDir) -> Orchestrator {
        let origin = tmp.path().join("Proj");
        fs::create_dir_all(origin.join("Assets")).unwrap();
        fs::create_dir_all(origin.join("ProjectSettings")).unwrap();

        // Pin the container under the test directory before the session starts.
        let store = SettingsStore::new(&origin);
        store
            .save_global(&GlobalSettings {
                enabled: true,
                play_on_launch: false,
                container_dir: Some(tmp.path().join("container")),
            })
            .unwrap();

        let mut config = OrchestratorConfig::new(origin);
        config.launch.editor_binary = PathBuf::from("/bin/true");
        config.readiness.editor_log = tmp.path().join("never/Editor.log");
        config.readiness.package_log = tmp.path().join("never/upm.log");
        config.readiness.poll_interval = Duration::from_millis(10);
        config.readiness.timeout = Duration::from_millis(50);
        config.stagger_delay = Duration::from_millis(0);

        let orchestrator = Orchestrator::new(config);
        orchestrator.init().unwrap();
        orchestrator
    }

    #[test]
    fn creation_assigns_sequential_ids_without_collisions() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = session(&tmp);

        for expected in 1..=3u32 {
            let count = orchestrator.instances().unwrap().len();
            assert_eq!(orchestrator.create("Proj", count, false), Some(expected));
        }

        let instances = orchestrator.instances().unwrap();
        assert_eq!(
            instances.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        for instance in &instances {
            assert!(instance.directory.is_dir());
            assert_eq!(instance.settings.device_id, DEVICE_NONE);
        }
    }

    #[test]
    fn discovery_reattaches_existing_clones_with_their_settings() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let orchestrator = session(&tmp);
            orchestrator.create("Proj", 0, false).unwrap();
            orchestrator.create("Proj", 1, false).unwrap();
            orchestrator.set_device(1, "pixel-7").unwrap();
            orchestrator.reset().unwrap();
        }

        let orchestrator = session(&tmp);
        let instances = orchestrator.instances().unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].id, 1);
        assert_eq!(instances[0].settings.device_id, "pixel-7");
        assert_eq!(instances[1].settings.device_id, DEVICE_NONE);
    }

    #[test]
    fn single_validation_gates_on_the_device_binding() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = session(&tmp);
        let id = orchestrator.create("Proj", 0, false).unwrap();

        assert!(!orchestrator.validate_single_launch(id).unwrap());
        assert!(!orchestrator.ready_to_launch().unwrap());
        let instance = orchestrator.find(id).unwrap().unwrap();
        assert!(instance.fold_out);
        assert!(instance.notifications.contains_key(DEVICE_NOTIFICATION));

        orchestrator.set_device(id, "pixel-7").unwrap();
        assert!(orchestrator.validate_single_launch(id).unwrap());
        assert!(orchestrator.ready_to_launch().unwrap());
        let instance = orchestrator.find(id).unwrap().unwrap();
        assert!(!instance.fold_out);
        assert!(instance.notifications.is_empty());
    }

    #[test]
    fn batch_validation_flags_only_failing_selected_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = session(&tmp);
        let a = orchestrator.create("Proj", 0, false).unwrap();
        let b = orchestrator.create("Proj", 1, false).unwrap();
        let c = orchestrator.create("Proj", 2, false).unwrap();

        orchestrator.set_device(a, "pixel-7").unwrap();
        orchestrator.set_selected(a, true).unwrap();
        orchestrator.set_selected(b, true).unwrap();
        // c stays unselected with no device.

        let focused = orchestrator.validate_multiple_launches().unwrap();
        assert_eq!(focused, Some(b));
        assert!(!orchestrator.ready_to_launch().unwrap());

        let instances = orchestrator.instances().unwrap();
        let by_id = |id: u32| instances.iter().find(|i| i.id == id).unwrap();
        assert!(by_id(b).notifications.contains_key(DEVICE_NOTIFICATION));
        assert!(by_id(b).fold_out);
        assert!(by_id(a).notifications.is_empty());
        assert!(by_id(c).notifications.is_empty());
        assert!(!by_id(c).fold_out);

        orchestrator.set_device(b, "pixel-8").unwrap();
        assert_eq!(orchestrator.validate_multiple_launches().unwrap(), None);
        assert!(orchestrator.ready_to_launch().unwrap());
    }

    #[test]
    fn remove_deletes_clone_settings_and_registry_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = session(&tmp);
        let id = orchestrator.create("Proj", 0, false).unwrap();
        let directory = orchestrator.find(id).unwrap().unwrap().directory;
        let blob = SettingsStore::new(&tmp.path().join("Proj")).instance_path(id);
        assert!(blob.is_file());

        orchestrator.remove(id).unwrap();
        assert!(!directory.exists());
        assert!(!blob.exists());
        assert!(orchestrator.instances().unwrap().is_empty());
    }

    #[test]
    fn remove_skips_a_running_instance() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = session(&tmp);
        let id = orchestrator.create("Proj", 0, false).unwrap();
        let directory = orchestrator.find(id).unwrap().unwrap().directory;
        fs::create_dir(directory.join(RUN_MARKER_DIR)).unwrap();

        orchestrator.remove(id).unwrap();
        assert!(directory.exists());
        assert_eq!(orchestrator.instances().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn launch_is_refused_while_the_gate_is_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = session(&tmp);
        let id = orchestrator.create("Proj", 0, false).unwrap();

        // No validation ran, so the gate is still closed.
        assert!(!orchestrator.launch(id).await.unwrap());
        assert_eq!(
            orchestrator.find(id).unwrap().unwrap().state,
            LaunchState::Idle
        );
    }

    #[tokio::test]
    async fn batch_launch_marks_unready_instances_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = session(&tmp);
        let id = orchestrator.create("Proj", 0, false).unwrap();
        orchestrator.set_device(id, "pixel-7").unwrap();
        orchestrator.set_selected(id, true).unwrap();
        assert_eq!(orchestrator.validate_multiple_launches().unwrap(), None);

        // The readiness conditions never hold in this environment, so the
        // bounded wait must end in `Failed` rather than hanging the batch.
        orchestrator.launch_selected().await.unwrap();
        assert_eq!(
            orchestrator.find(id).unwrap().unwrap().state,
            LaunchState::Failed
        );
    }

    #[test]
    fn container_dir_change_relocates_the_clone_root() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = session(&tmp);
        let id = orchestrator.create("Proj", 0, false).unwrap();

        // Refused while instances exist.
        assert!(orchestrator
            .set_container_dir(tmp.path().join("moved"))
            .is_err());

        orchestrator.remove(id).unwrap();
        orchestrator
            .set_container_dir(tmp.path().join("moved"))
            .unwrap();
        assert_eq!(
            orchestrator.clone_root().unwrap(),
            tmp.path().join("moved").join("Proj")
        );
        assert_eq!(
            orchestrator.global().unwrap().container_dir,
            Some(tmp.path().join("moved"))
        );
    }
}
