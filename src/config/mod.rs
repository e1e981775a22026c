//! User configuration: model, defaults, and JSON persistence.
//!
//! Settings live in `settings.json` under the per-user roaming config
//! directory. Every field carries a serde default so a config written by an
//! older version (or hand-edited with fields missing) still loads; unknown
//! fields are ignored.
//!
//! Uses `parking_lot::RwLock` behind `lazy_static` for thread-safe access;
//! the hotkey broker thread, the tray, and IPC handlers all read this.

use std::fs;
use std::path::PathBuf;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

lazy_static! {
    /// Global settings, loaded once at startup and written through on change.
    pub static ref SETTINGS: RwLock<Settings> = RwLock::new(Settings::default());
}

pub const APP_DIR_NAME: &str = "QuickShot";
const SETTINGS_FILE: &str = "settings.json";

/// Naming pattern for quick-saved screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SavePattern {
    #[default]
    Timestamp,
    Date,
    Increment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotkeySettings {
    pub fullscreen: String,
    pub region: String,
    pub window: String,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            fullscreen: "PrintScreen".to_string(),
            region: "Ctrl+PrintScreen".to_string(),
            window: "Ctrl+Shift+PrintScreen".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartupSettings {
    pub launch_on_startup: bool,
    pub minimize_to_tray: bool,
    pub close_to_tray: bool,
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            launch_on_startup: false,
            minimize_to_tray: false,
            close_to_tray: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct QuickSaveSettings {
    /// Library folder. Empty means `Pictures/QuickShot`, resolved lazily.
    pub folder: String,
    pub pattern: SavePattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 1100,
            height: 760,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSettings {
    pub skipped_version: String,
}

/// Complete user configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub hotkeys: HotkeySettings,
    pub startup: StartupSettings,
    pub quick_save: QuickSaveSettings,
    pub window: WindowSettings,
    pub update: UpdateSettings,
    /// Cloud upload credentials/options. Persisted round-trip; the core does
    /// not interpret this block.
    pub cloud: serde_json::Value,
}

/// Directory holding settings.json, created on demand.
pub fn config_dir() -> AppResult<PathBuf> {
    let base = dirs::config_dir().ok_or("Failed to resolve config directory")?;
    let dir = base.join(APP_DIR_NAME);
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

fn settings_path() -> AppResult<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

/// Load settings from disk into the global. Missing file keeps defaults;
/// a corrupt file is logged and replaced by defaults rather than aborting.
pub fn load() {
    let path = match settings_path() {
        Ok(p) => p,
        Err(e) => {
            log::warn!("[CONFIG] No config directory: {}", e);
            return;
        }
    };

    match fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<Settings>(&content) {
            Ok(settings) => {
                *SETTINGS.write() = settings;
                log::info!("[CONFIG] Loaded settings from {:?}", path);
            }
            Err(e) => {
                log::warn!("[CONFIG] settings.json is invalid, using defaults: {}", e);
            }
        },
        Err(_) => {
            log::info!("[CONFIG] No settings file yet, using defaults");
        }
    }
}

/// Persist the given settings and replace the global.
pub fn store(settings: Settings) -> AppResult<()> {
    let path = settings_path()?;
    let json = serde_json::to_string_pretty(&settings)?;
    fs::write(&path, json)?;
    *SETTINGS.write() = settings;
    Ok(())
}

/// Snapshot of the current settings.
pub fn current() -> Settings {
    SETTINGS.read().clone()
}

/// Check if close-to-tray is enabled.
pub fn is_close_to_tray() -> bool {
    SETTINGS.read().startup.close_to_tray
}

/// Resolve the library folder: the configured one, or `Pictures/QuickShot`.
pub fn library_folder() -> AppResult<PathBuf> {
    let configured = SETTINGS.read().quick_save.folder.clone();
    let dir = if configured.trim().is_empty() {
        dirs::picture_dir()
            .ok_or("Failed to resolve pictures directory")?
            .join(APP_DIR_NAME)
    } else {
        PathBuf::from(configured)
    };

    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Record the host window size, used to restore geometry after capture.
/// The capture controller suppresses this while a capture is in flight.
pub fn remember_window_size(width: u32, height: u32) {
    let mut settings = SETTINGS.write();
    settings.window.width = width;
    settings.window.height = height;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, back);
    }

    #[test]
    fn test_default_hotkeys() {
        let h = HotkeySettings::default();
        assert_eq!(h.fullscreen, "PrintScreen");
        assert_eq!(h.region, "Ctrl+PrintScreen");
        assert_eq!(h.window, "Ctrl+Shift+PrintScreen");
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"startup":{"closeToTray":false}}"#).unwrap();
        assert!(!settings.startup.close_to_tray);
        // Untouched sections keep their defaults.
        assert_eq!(settings.hotkeys, HotkeySettings::default());
        assert_eq!(settings.window, WindowSettings::default());
        assert_eq!(settings.quick_save.pattern, SavePattern::Timestamp);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let settings: Settings = serde_json::from_str(
            r#"{"someFutureFeature":{"a":1},"window":{"width":900,"height":700}}"#,
        )
        .unwrap();
        assert_eq!(settings.window.width, 900);
        assert_eq!(settings.window.height, 700);
    }

    #[test]
    fn test_pattern_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SavePattern::Increment).unwrap(),
            r#""increment""#
        );
        let p: SavePattern = serde_json::from_str(r#""date""#).unwrap();
        assert_eq!(p, SavePattern::Date);
    }

    #[test]
    fn test_cloud_block_round_trips_uninterpreted() {
        let raw = r#"{"cloud":{"provider":"s3","bucket":"shots"}}"#;
        let settings: Settings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.cloud["provider"], "s3");
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"bucket\":\"shots\""));
    }
}
