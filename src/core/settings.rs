//! Per-instance and global settings value types

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Blob key for the remote device binding.
pub const KEY_REMOTE_DEVICE: &str = "UnityRemoteDevice";
/// Blob key for the social identity override.
pub const KEY_SOCIAL_ID: &str = "SocialId";

pub const KEY_ENABLED: &str = "_multipleEditorMode";
pub const KEY_PLAY_ON_LAUNCH: &str = "_playOnLaunch";
pub const KEY_CONTAINER_DIR: &str = "_containerDirPath";

/// Device id meaning "no remote device bound".
pub const DEVICE_NONE: &str = "None";

/// Per-instance settings, keyed by instance id on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSettings {
    /// Remote device the instance streams to
    pub device_id: String,
    /// Social identity the instance signs in with
    pub social_id: String,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            device_id: DEVICE_NONE.to_string(),
            social_id: String::new(),
        }
    }
}

impl InstanceSettings {
    pub fn has_device_selected(&self) -> bool {
        self.device_id != DEVICE_NONE
    }

    pub fn has_social_id(&self) -> bool {
        !self.social_id.is_empty()
    }

    /// Full key-value map as written to the settings blob.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (KEY_REMOTE_DEVICE.to_string(), self.device_id.clone()),
            (KEY_SOCIAL_ID.to_string(), self.social_id.clone()),
        ])
    }

    /// Rebuild settings from a blob map, key by key.
    ///
    /// Unrecognized keys are skipped with a warning so blobs written by newer
    /// schema revisions still load.
    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        let mut settings = Self::default();
        for (key, value) in map {
            match key.as_str() {
                KEY_REMOTE_DEVICE => settings.device_id = value,
                KEY_SOCIAL_ID => settings.social_id = value,
                other => warn!("ignoring unrecognized instance settings key '{}'", other),
            }
        }
        settings
    }
}

/// Session-global settings, persisted as one well-known blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GlobalSettings {
    /// Whether multi-instance tooling is enabled at all
    pub enabled: bool,
    /// Whether launched instances enter play mode immediately
    pub play_on_launch: bool,
    /// Directory the project clone root lives under
    pub container_dir: Option<PathBuf>,
}

impl GlobalSettings {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (KEY_ENABLED.to_string(), encode_bool(self.enabled)),
            (KEY_PLAY_ON_LAUNCH.to_string(), encode_bool(self.play_on_launch)),
            (
                KEY_CONTAINER_DIR.to_string(),
                self.container_dir
                    .as_ref()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_default(),
            ),
        ])
    }

    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        let mut settings = Self::default();
        for (key, value) in map {
            match key.as_str() {
                KEY_ENABLED => settings.enabled = decode_bool(&value),
                KEY_PLAY_ON_LAUNCH => settings.play_on_launch = decode_bool(&value),
                KEY_CONTAINER_DIR => {
                    settings.container_dir = (!value.is_empty()).then(|| PathBuf::from(value));
                }
                other => warn!("ignoring unrecognized global settings key '{}'", other),
            }
        }
        settings
    }
}

// Booleans travel as "True"/"False" in the blobs.
fn encode_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

fn decode_bool(value: &str) -> bool {
    value == "True"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_defaults_have_no_device() {
        let settings = InstanceSettings::default();
        assert_eq!(settings.device_id, DEVICE_NONE);
        assert_eq!(settings.social_id, "");
        assert!(!settings.has_device_selected());
        assert!(!settings.has_social_id());
    }

    #[test]
    fn instance_map_round_trip() {
        let settings = InstanceSettings {
            device_id: "pixel-7".to_string(),
            social_id: "player-two".to_string(),
        };
        assert_eq!(InstanceSettings::from_map(settings.to_map()), settings);
    }

    #[test]
    fn unknown_instance_keys_are_ignored() {
        let mut map = InstanceSettings::default().to_map();
        map.insert("CompressionLevel".to_string(), "2".to_string());
        map.insert(KEY_REMOTE_DEVICE.to_string(), "pixel-7".to_string());

        let settings = InstanceSettings::from_map(map);
        assert_eq!(settings.device_id, "pixel-7");
        assert_eq!(settings.social_id, "");
    }

    #[test]
    fn global_map_round_trip() {
        let settings = GlobalSettings {
            enabled: true,
            play_on_launch: false,
            container_dir: Some(PathBuf::from("/tmp/editors")),
        };
        let map = settings.to_map();
        assert_eq!(map[KEY_ENABLED], "True");
        assert_eq!(map[KEY_PLAY_ON_LAUNCH], "False");
        assert_eq!(GlobalSettings::from_map(map), settings);
    }

    #[test]
    fn empty_container_path_decodes_to_none() {
        let settings = GlobalSettings::from_map(GlobalSettings::default().to_map());
        assert_eq!(settings.container_dir, None);
    }
}
