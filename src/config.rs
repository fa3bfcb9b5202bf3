//! Application configuration.
//!
//! One JSON document (`macro_config.json`) owned by the GUI shell. Loading
//! merges defaults for any missing keys; keys this build does not recognize
//! are preserved verbatim so older/newer shells can share the same file.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Top-level game mode selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Story,
    Legend,
    Raids,
    Siege,
    #[serde(rename = "Auto-Challenges")]
    AutoChallenges,
}

impl Mode {
    /// Display name, as shown in the shell and in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Story => "Story",
            Mode::Legend => "Legend",
            Mode::Raids => "Raids",
            Mode::Siege => "Siege",
            Mode::AutoChallenges => "Auto-Challenges",
        }
    }

    /// Folder name under `Settings/` holding this mode's placement files.
    pub fn folder(&self) -> &'static str {
        match self {
            Mode::Story => "Story",
            Mode::Legend => "Legend",
            Mode::Raids => "Raid",
            Mode::Siege => "Siege",
            Mode::AutoChallenges => "Challenges",
        }
    }
}

/// In-game locations the macro knows how to position for.
///
/// Location strings in the config are free-form display names; classification
/// is by keyword so "Planet Namek", "Namak" and "planet" all resolve the same.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    LeafVillage,
    PlanetNamek,
    DarkHollow,
    BlueDungeon,
    FrozenGate,
    Other,
}

/// Classifies a location display name into a known location.
pub fn classify_location(name: &str) -> Location {
    let lower = name.to_lowercase();
    if lower.contains("leaf") || lower.contains("village") {
        Location::LeafVillage
    } else if lower.contains("planet") || lower.contains("namek") || lower.contains("namak") {
        Location::PlanetNamek
    } else if lower.contains("hollow") || lower.contains("dark") {
        Location::DarkHollow
    } else if lower.contains("blue") || lower.contains("dungeon") {
        Location::BlueDungeon
    } else if lower.contains("frozen") || lower.contains("gate") {
        Location::FrozenGate
    } else {
        Location::Other
    }
}

/// Extracts the act number from a display label like "Act 3". Defaults to 1.
pub fn act_number(act: &str) -> u8 {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new(r"\d+").expect("valid regex"));
    re.find(act)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1)
}

/// Per-slot priority/limit record (edited by the shell, read here).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlotConfig {
    pub name: String,
    pub placement_priority: u32,
    pub upgrade_priority: u32,
    pub placement_limit: u32,
    pub enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_start_keybind")]
    pub start_keybind: String,
    #[serde(default = "default_stop_keybind")]
    pub stop_keybind: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_act")]
    pub act: String,
    #[serde(default)]
    pub nightmare: bool,
    /// OCR confidence threshold (0.0 - 1.0).
    #[serde(default = "default_ocr_tolerance")]
    pub ocr_tolerance: f32,
    /// Template match confidence floor used for most landmarks.
    #[serde(default = "default_template_confidence")]
    pub template_confidence: f32,
    /// Pause after each placement click (seconds).
    #[serde(default = "default_placement_delay")]
    pub placement_delay: f32,
    /// Pointer travel time for placement moves (seconds).
    #[serde(default = "default_placement_move_duration")]
    pub placement_move_duration: f32,
    /// Pause after the repeated slot-key presses (seconds).
    #[serde(default = "default_slot_press_delay")]
    pub slot_press_delay: f32,
    /// Delay between repeated upgrade key presses (seconds).
    #[serde(default = "default_upgrade_press_delay")]
    pub upgrade_press_delay: f32,
    #[serde(default)]
    pub discord_webhook_url: String,
    #[serde(default)]
    pub stats_wins: u32,
    #[serde(default)]
    pub stats_losses: u32,
    /// Private server link opened to recover from a disconnect.
    #[serde(default)]
    pub private_server_link: String,
    #[serde(default = "default_location")]
    pub challenge_location: String,
    #[serde(default = "default_slots")]
    pub slots: Vec<SlotConfig>,
    /// Keys from the file this build does not model. Preserved on save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_start_keybind() -> String {
    "f1".to_string()
}

fn default_stop_keybind() -> String {
    "f3".to_string()
}

fn default_location() -> String {
    "Leaf Village".to_string()
}

fn default_act() -> String {
    "Act 1".to_string()
}

fn default_ocr_tolerance() -> f32 {
    0.6
}

fn default_template_confidence() -> f32 {
    0.65
}

fn default_placement_delay() -> f32 {
    0.15
}

fn default_placement_move_duration() -> f32 {
    0.12
}

fn default_slot_press_delay() -> f32 {
    0.15
}

fn default_upgrade_press_delay() -> f32 {
    0.08
}

fn default_slots() -> Vec<SlotConfig> {
    (1..=6)
        .map(|i| SlotConfig {
            name: format!("Slot {}", i),
            placement_priority: i,
            upgrade_priority: i,
            placement_limit: 3,
            enabled: i <= 2,
        })
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).expect("defaults are complete")
    }
}

impl Config {
    /// Loads configuration from `path`, merging defaults for missing keys.
    /// A missing or unparseable file yields the defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    /// Loads from the standard config path next to the executable.
    pub fn load_default() -> Self {
        Self::load(&crate::paths::config_path())
    }

    /// Saves the configuration, keeping unrecognized keys intact.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_get_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"mode": "Legend", "location": "Planet Namek"}"#).unwrap();
        assert_eq!(config.mode, Mode::Legend);
        assert_eq!(config.location, "Planet Namek");
        assert_eq!(config.ocr_tolerance, 0.6);
        assert_eq!(config.act, "Act 1");
        assert_eq!(config.slots.len(), 6);
    }

    #[test]
    fn unknown_keys_survive_a_round_trip() {
        let config: Config = serde_json::from_str(
            r#"{"ocr_tolerance": 0.7, "placement_area": {"x": 1, "y": 2}, "theme": "dark"}"#,
        )
        .unwrap();
        assert_eq!(config.ocr_tolerance, 0.7);

        let saved = serde_json::to_value(&config).unwrap();
        assert_eq!(saved["placement_area"]["x"], 1);
        assert_eq!(saved["theme"], "dark");
        // Defaults were merged in alongside.
        assert_eq!(saved["act"], "Act 1");
    }

    #[test]
    fn mode_folder_mapping() {
        assert_eq!(Mode::Raids.folder(), "Raid");
        assert_eq!(Mode::AutoChallenges.folder(), "Challenges");
        assert_eq!(Mode::Story.folder(), "Story");
    }

    #[test]
    fn auto_challenges_serde_name() {
        let mode: Mode = serde_json::from_str(r#""Auto-Challenges""#).unwrap();
        assert_eq!(mode, Mode::AutoChallenges);
    }

    #[test]
    fn location_classification() {
        assert_eq!(classify_location("Leaf Village"), Location::LeafVillage);
        assert_eq!(classify_location("planet namak"), Location::PlanetNamek);
        assert_eq!(classify_location("Dark Hollow"), Location::DarkHollow);
        assert_eq!(classify_location("Blue Dungeon"), Location::BlueDungeon);
        assert_eq!(classify_location("Frozen Gate"), Location::FrozenGate);
        assert_eq!(classify_location("Somewhere"), Location::Other);
    }

    #[test]
    fn act_number_parsing() {
        assert_eq!(act_number("Act 1"), 1);
        assert_eq!(act_number("Act 6"), 6);
        assert_eq!(act_number("act3"), 3);
        assert_eq!(act_number("Act"), 1);
    }
}
