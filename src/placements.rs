//! Placement configuration store.
//!
//! One JSON document per (mode folder, location, act) at
//! `Settings/<ModeFolder>/<Location>/<Act>.json`, written by the external
//! placement editor and read-only here. Field values are tolerant by
//! necessity: the editor historically wrote coordinates as numbers, numeric
//! strings, or empty strings, and all three shapes exist in the wild.

use std::path::{Path, PathBuf};

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("no placement file at {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed placement file {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Requested upgrade level after a unit is placed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpgradeTarget {
    /// No manual upgrades.
    #[default]
    None,
    /// Upgrade level-by-level to this level.
    Level(u8),
    /// Keep upgrading until the max-reached landmark appears.
    Max,
}

fn deserialize_upgrade<'de, D>(deserializer: D) -> Result<UpgradeTarget, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.eq_ignore_ascii_case("max") {
                UpgradeTarget::Max
            } else {
                match trimmed.parse::<u8>() {
                    Ok(0) | Err(_) => UpgradeTarget::None,
                    Ok(n) => UpgradeTarget::Level(n),
                }
            }
        }
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(0) | None => UpgradeTarget::None,
            Some(n) => UpgradeTarget::Level(n.min(u8::MAX as u64) as u8),
        },
        _ => UpgradeTarget::None,
    })
}

impl Serialize for UpgradeTarget {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UpgradeTarget::None => serializer.serialize_str("0"),
            UpgradeTarget::Level(n) => serializer.serialize_str(&n.to_string()),
            UpgradeTarget::Max => serializer.serialize_str("max"),
        }
    }
}

/// A coordinate that may be a number, a numeric string, or empty.
fn deserialize_coord<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().map(|v| v as i32),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// One configured unit slot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlacementUnit {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub enabled: bool,
    /// Place during the early batch, before the start prompt is confirmed.
    #[serde(default)]
    pub place_before_yes: bool,
    #[serde(default)]
    pub auto_upgrade: bool,
    /// Inventory slot hotkey as a string; "0" means no slot key.
    #[serde(default = "default_slot")]
    pub slot: String,
    #[serde(default, deserialize_with = "deserialize_coord")]
    pub x: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_coord")]
    pub y: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_upgrade")]
    pub upgrade: UpgradeTarget,
    #[serde(default)]
    pub note: String,
}

fn default_slot() -> String {
    "1".to_string()
}

impl PlacementUnit {
    /// Absolute screen coordinates, present only when both are set.
    pub fn coordinates(&self) -> Option<(i32, i32)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }

    /// Slot hotkey character, unless the unit is configured without one.
    pub fn slot_key(&self) -> Option<char> {
        let trimmed = self.slot.trim();
        if trimmed == "0" {
            return None;
        }
        trimmed.chars().next()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlacementFile {
    #[serde(rename = "Units", default)]
    pub units: Vec<PlacementUnit>,
    /// Window geometry recorded by the coordinate picker; informational here.
    #[serde(rename = "WindowInfo", default, skip_serializing_if = "Option::is_none")]
    pub window_info: Option<serde_json::Value>,
}

impl PlacementFile {
    /// Units to place in the given batch, in file order.
    pub fn batch(&self, early: bool) -> Vec<&PlacementUnit> {
        self.units
            .iter()
            .filter(|u| u.enabled && u.place_before_yes == early)
            .collect()
    }
}

/// Path of the placement document for a (mode folder, location, act) triple.
pub fn placement_path(root: &Path, mode_folder: &str, location: &str, act: &str) -> PathBuf {
    root.join(mode_folder).join(location).join(format!("{}.json", act))
}

/// Loads the placement document for a (mode folder, location, act) triple.
pub fn load(
    root: &Path,
    mode_folder: &str,
    location: &str,
    act: &str,
) -> Result<PlacementFile, PlacementError> {
    let path = placement_path(root, mode_folder, location, act);
    if !path.exists() {
        return Err(PlacementError::NotFound(path));
    }
    let contents = std::fs::read_to_string(&path)
        .map_err(|source| PlacementError::Io { path: path.clone(), source })?;
    serde_json::from_str(&contents).map_err(|source| PlacementError::Invalid { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Units": [
            {"Index": 1, "Enabled": true, "PlaceBeforeYes": true, "AutoUpgrade": true,
             "Slot": "1", "X": 640, "Y": 480, "Upgrade": "max", "Note": "tank"},
            {"Index": 2, "Enabled": true, "Slot": "2", "X": "700", "Y": "300", "Upgrade": "3"},
            {"Index": 3, "Enabled": true, "Slot": "0", "X": "", "Y": "", "Upgrade": "0"},
            {"Index": 4, "Enabled": false, "Slot": "4", "X": 100, "Y": 100, "Upgrade": 2}
        ],
        "WindowInfo": {"x": 0, "y": 0, "width": 1280, "height": 720}
    }"#;

    #[test]
    fn tolerant_field_parsing() {
        let file: PlacementFile = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(file.units.len(), 4);

        assert_eq!(file.units[0].upgrade, UpgradeTarget::Max);
        assert_eq!(file.units[0].coordinates(), Some((640, 480)));

        // Numeric strings parse; plain numbers parse too.
        assert_eq!(file.units[1].coordinates(), Some((700, 300)));
        assert_eq!(file.units[1].upgrade, UpgradeTarget::Level(3));
        assert_eq!(file.units[3].upgrade, UpgradeTarget::Level(2));

        // Empty coordinates mean "skip this unit".
        assert_eq!(file.units[2].coordinates(), None);
        assert_eq!(file.units[2].upgrade, UpgradeTarget::None);
        assert_eq!(file.units[2].slot_key(), None);
        assert_eq!(file.units[1].slot_key(), Some('2'));
    }

    #[test]
    fn batches_split_on_place_before_yes() {
        let file: PlacementFile = serde_json::from_str(SAMPLE).unwrap();
        let early: Vec<u32> = file.batch(true).iter().map(|u| u.index).collect();
        let normal: Vec<u32> = file.batch(false).iter().map(|u| u.index).collect();
        assert_eq!(early, vec![1]);
        // Unit 4 is disabled and stays out of both batches.
        assert_eq!(normal, vec![2, 3]);
    }

    #[test]
    fn missing_file_is_a_distinct_error() {
        let err = load(Path::new("/nonexistent"), "Story", "Leaf Village", "Act 1").unwrap_err();
        assert!(matches!(err, PlacementError::NotFound(_)));
    }

    #[test]
    fn placement_path_layout() {
        let path = placement_path(Path::new("Settings"), "Raid", "Frozen Gate", "Act 2");
        assert_eq!(path, Path::new("Settings/Raid/Frozen Gate/Act 2.json"));
    }

    #[test]
    fn malformed_json_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Story").join("Leaf Village");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Act 1.json"), "{not json").unwrap();

        let err = load(dir.path(), "Story", "Leaf Village", "Act 1").unwrap_err();
        assert!(matches!(err, PlacementError::Invalid { .. }));
    }
}
