//! Workspace cloning - Creates and destroys symlinked clones of the origin workspace

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::platform;

/// Zero-byte file at a clone's root flagging it as derived from an origin
/// workspace. The host checks for it to refuse activating itself inside a clone.
pub const CLONE_MARKER_FILE: &str = ".__symLinked__";

/// Shared resources linked from every clone back to the origin by default.
pub const DEFAULT_SHARED_RESOURCES: &[&str] =
    &["Assets", "Library", "Logs", "Packages", "ProjectSettings"];

#[derive(Debug, Error)]
pub enum CloneError {
    #[error("failed to create clone directory {path}: {source}")]
    CreateDirectory { path: PathBuf, source: io::Error },

    #[error("failed to link {resource} into {clone}: {source}")]
    LinkResource {
        resource: String,
        clone: PathBuf,
        source: io::Error,
    },

    #[error("failed to write clone marker in {clone}: {source}")]
    WriteMarker { clone: PathBuf, source: io::Error },

    #[error("failed to relocate container {from} -> {to}: {source}")]
    Relocate {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Creates and destroys clone directories for one origin workspace.
///
/// A clone is a directory of symlinks back to the origin's shared resources
/// plus a marker file; nothing inside it is a copy, so clones are cheap and
/// every instance sees the same assets.
pub struct WorkspaceCloner {
    origin: PathBuf,
    shared_resources: Vec<String>,
}

impl WorkspaceCloner {
    pub fn new(origin: PathBuf, shared_resources: Vec<String>) -> Self {
        Self {
            origin,
            shared_resources,
        }
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Create a clone under `clone_root` named `{base_name}_instance_{n}`.
    ///
    /// The first candidate uses `n = candidate_index + 1`. If that name is
    /// already taken on disk or by a registry entry, numbering restarts from 1
    /// and climbs until a free name is found, healing over gaps left by
    /// removed instances.
    pub fn create_clone(
        &self,
        clone_root: &Path,
        base_name: &str,
        candidate_index: usize,
        registered: &[PathBuf],
    ) -> Result<PathBuf, CloneError> {
        let taken = |dir: &Path| dir.exists() || registered.iter().any(|path| path == dir);

        let mut n = candidate_index + 1;
        let mut clone_dir = clone_root.join(format!("{base_name}_instance_{n}"));
        if taken(&clone_dir) {
            n = 0;
            loop {
                n += 1;
                clone_dir = clone_root.join(format!("{base_name}_instance_{n}"));
                if !taken(&clone_dir) {
                    break;
                }
            }
        }

        fs::create_dir_all(&clone_dir).map_err(|source| CloneError::CreateDirectory {
            path: clone_dir.clone(),
            source,
        })?;

        for resource in &self.shared_resources {
            let target = self.origin.join(resource);
            if !target.exists() {
                debug!("skipping absent shared resource {:?}", target);
                continue;
            }
            platform::link_path(&target, &clone_dir.join(resource)).map_err(|source| {
                CloneError::LinkResource {
                    resource: resource.clone(),
                    clone: clone_dir.clone(),
                    source,
                }
            })?;
        }

        fs::File::create(clone_dir.join(CLONE_MARKER_FILE))
            .map(drop)
            .map_err(|source| CloneError::WriteMarker {
                clone: clone_dir.clone(),
                source,
            })?;

        info!("created clone {:?}", clone_dir);
        Ok(clone_dir)
    }

    /// Recursively delete a clone directory.
    ///
    /// No-op when `path` is empty, is the origin workspace, or does not exist.
    /// This guard is the only protection against destroying the origin.
    /// Returns whether anything was deleted.
    pub fn remove_clone(&self, path: &Path) -> io::Result<bool> {
        if path.as_os_str().is_empty() || path == self.origin || !path.exists() {
            return Ok(false);
        }

        fs::remove_dir_all(path)?;
        info!("removed clone {:?}", path);
        Ok(true)
    }

    /// Move the whole container directory when its configured path changes.
    ///
    /// Only legal while no clones are registered; the caller enforces that.
    pub fn relocate_container(&self, from: &Path, to: &Path) -> Result<(), CloneError> {
        if from == to || !from.exists() {
            return Ok(());
        }
        if let Some(parent) = to.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!("could not prepare {:?}: {}", parent, err);
            }
        }
        fs::rename(from, to).map_err(|source| CloneError::Relocate {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })?;
        info!("relocated container {:?} -> {:?}", from, to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, WorkspaceCloner, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let origin = tmp.path().join("Proj");
        fs::create_dir_all(origin.join("Assets")).unwrap();
        fs::create_dir_all(origin.join("ProjectSettings")).unwrap();
        let clone_root = tmp.path().join("clones");
        fs::create_dir_all(&clone_root).unwrap();
        let resources = DEFAULT_SHARED_RESOURCES
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cloner = WorkspaceCloner::new(origin, resources);
        (tmp, cloner, clone_root)
    }

    #[test]
    fn repeated_creation_yields_distinct_suffixes() {
        let (_tmp, cloner, clone_root) = fixture();
        let mut registered = Vec::new();

        for expected in 1..=3u32 {
            let dir = cloner
                .create_clone(&clone_root, "Proj", registered.len(), &registered)
                .unwrap();
            assert_eq!(
                dir.file_name().unwrap().to_str().unwrap(),
                format!("Proj_instance_{expected}")
            );
            assert!(dir.is_dir());
            registered.push(dir);
        }
    }

    #[test]
    fn same_candidate_index_still_yields_fresh_names() {
        let (_tmp, cloner, clone_root) = fixture();
        let mut registered = Vec::new();

        for expected in 1..=3u32 {
            let dir = cloner.create_clone(&clone_root, "Proj", 0, &registered).unwrap();
            assert_eq!(
                dir.file_name().unwrap().to_str().unwrap(),
                format!("Proj_instance_{expected}")
            );
            registered.push(dir);
        }
    }

    #[test]
    fn collision_restarts_numbering_from_one() {
        let (_tmp, cloner, clone_root) = fixture();
        fs::create_dir(clone_root.join("Proj_instance_1")).unwrap();
        fs::create_dir(clone_root.join("Proj_instance_3")).unwrap();

        // First candidate (index 0 -> n=1) collides, so numbering restarts and
        // lands on the lowest free suffix.
        let dir = cloner.create_clone(&clone_root, "Proj", 0, &[]).unwrap();
        assert_eq!(dir.file_name().unwrap().to_str().unwrap(), "Proj_instance_2");
    }

    #[cfg(unix)]
    #[test]
    fn clone_links_present_resources_and_writes_marker() {
        let (_tmp, cloner, clone_root) = fixture();
        let dir = cloner.create_clone(&clone_root, "Proj", 0, &[]).unwrap();

        assert!(dir.join("Assets").symlink_metadata().unwrap().file_type().is_symlink());
        assert!(dir.join("ProjectSettings").exists());
        // "Library" is absent at the origin, so no link is created for it.
        assert!(!dir.join("Library").exists());

        let marker = dir.join(CLONE_MARKER_FILE);
        assert!(marker.is_file());
        assert_eq!(fs::metadata(&marker).unwrap().len(), 0);
    }

    #[test]
    fn remove_clone_guards_origin_empty_and_missing_paths() {
        let (_tmp, cloner, clone_root) = fixture();

        assert!(!cloner.remove_clone(Path::new("")).unwrap());
        assert!(!cloner.remove_clone(&cloner.origin().to_path_buf()).unwrap());
        assert!(!cloner.remove_clone(&clone_root.join("Proj_instance_9")).unwrap());
        assert!(cloner.origin().join("Assets").is_dir());

        let dir = cloner.create_clone(&clone_root, "Proj", 0, &[]).unwrap();
        assert!(cloner.remove_clone(&dir).unwrap());
        assert!(!dir.exists());
        assert!(cloner.origin().join("Assets").is_dir());
    }

    #[test]
    fn relocate_container_moves_existing_tree() {
        let (tmp, cloner, clone_root) = fixture();
        cloner.create_clone(&clone_root, "Proj", 0, &[]).unwrap();

        let new_root = tmp.path().join("elsewhere").join("clones");
        cloner.relocate_container(&clone_root, &new_root).unwrap();

        assert!(!clone_root.exists());
        assert!(new_root.join("Proj_instance_1").is_dir());

        // Relocating a missing source is a no-op.
        cloner.relocate_container(&clone_root, &new_root).unwrap();
    }
}
