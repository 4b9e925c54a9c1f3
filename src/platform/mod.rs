//! Platform-specific implementations: filesystem linking and editor file locations

use std::io;
use std::path::{Path, PathBuf};

/// Create a symbolic link to a directory.
pub fn link_dir(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_dir(target, link)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symbolic links are not supported on this platform",
        ))
    }
}

/// Create a symbolic link to a file.
pub fn link_file(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(target, link)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symbolic links are not supported on this platform",
        ))
    }
}

/// Link `target` into place at `link`, picking the directory or file strategy
/// from what `target` actually is on disk.
pub fn link_path(target: &Path, link: &Path) -> io::Result<()> {
    if target.is_dir() {
        link_dir(target, link)
    } else {
        link_file(target, link)
    }
}

/// Location of the editor's startup log on this platform, if a home directory
/// can be resolved.
pub fn editor_log_path() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|home| home.join("Library/Logs/Unity/Editor.log"))
    }
    #[cfg(target_os = "linux")]
    {
        dirs::config_dir().map(|config| config.join("unity3d/Editor.log"))
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir().map(|local| local.join("Unity").join("Editor").join("Editor.log"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", windows)))]
    {
        None
    }
}

/// Location of the package-manager log the editor writes during startup.
pub fn package_log_path() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|home| home.join("Library/Logs/Unity/upm.log"))
    }
    #[cfg(target_os = "linux")]
    {
        dirs::config_dir().map(|config| config.join("unity3d/upm.log"))
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir().map(|local| local.join("Unity").join("Editor").join("upm.log"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", windows)))]
    {
        None
    }
}

/// Default install location of the editor binary on this platform.
pub fn default_editor_binary() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Applications/Unity/Unity.app/Contents/MacOS/Unity")
    }
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/opt/unity/Editor/Unity")
    }
    #[cfg(windows)]
    {
        PathBuf::from(r"C:\Program Files\Unity\Editor\Unity.exe")
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", windows)))]
    {
        PathBuf::from("Unity")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn link_path_links_directories_and_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir_target = tmp.path().join("assets");
        let file_target = tmp.path().join("project.csproj");
        std::fs::create_dir(&dir_target).unwrap();
        std::fs::write(&file_target, "x").unwrap();

        let dir_link = tmp.path().join("assets_link");
        let file_link = tmp.path().join("csproj_link");
        link_path(&dir_target, &dir_link).unwrap();
        link_path(&file_target, &file_link).unwrap();

        assert!(dir_link.symlink_metadata().unwrap().file_type().is_symlink());
        assert!(file_link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_link(&dir_link).unwrap(), dir_target);
    }
}
