//! Settings commands: configuration get/set plus the side effects a
//! settings change carries (hotkey re-registration, startup registry sync,
//! tray tooltip).

use tauri::AppHandle;
use tauri_plugin_opener::OpenerExt;

use crate::app::{startup, tray};
use crate::commands::hotkeys::{self, EffectiveBinding};
use crate::config::{self, Settings};
use crate::error::{AppError, AppResult};

/// Get the current configuration.
#[tauri::command]
pub fn get_settings() -> Settings {
    config::current()
}

/// Replace the configuration, persist it, and apply every side effect:
/// re-register hotkeys, synchronize the startup registry entry, refresh the
/// tray tooltip. Returns the hotkey bindings that actually took effect.
#[tauri::command]
pub async fn set_settings(app: AppHandle, settings: Settings) -> AppResult<Vec<EffectiveBinding>> {
    let launch_on_startup = settings.startup.launch_on_startup;
    config::store(settings)?;

    // Background-style side effects: failures are logged, not fatal.
    if let Err(e) = startup::set_launch_on_startup(launch_on_startup) {
        log::warn!("[SETTINGS] startup registry sync failed: {}", e);
    }
    tray::refresh_tooltip(&app);

    let bindings = tokio::task::spawn_blocking(|| {
        hotkeys::apply_bindings(&config::current().hotkeys)
    })
    .await
    .map_err(|e| crate::error::AppError::Other(format!("hotkey apply failed: {}", e)))?;

    Ok(bindings)
}

/// Enable or disable launch-on-login, writing through to the Run key.
#[tauri::command]
pub async fn set_launch_on_startup(enabled: bool) -> AppResult<()> {
    let mut settings = config::current();
    settings.startup.launch_on_startup = enabled;
    config::store(settings)?;
    startup::set_launch_on_startup(enabled)
}

/// Whether the Run key currently carries our startup entry.
#[tauri::command]
pub async fn is_launch_on_startup() -> AppResult<bool> {
    startup::is_registered()
}

/// Update the tray tooltip text at runtime.
#[tauri::command]
pub fn set_tray_tooltip(app: AppHandle, tooltip: String) -> AppResult<()> {
    tray::set_tooltip(&app, &tooltip)
}

/// Open a folder (or file) in the system file manager.
#[tauri::command]
pub async fn open_path_in_explorer(app: AppHandle, path: String) -> AppResult<()> {
    app.opener()
        .open_path(&path, None::<&str>)
        .map_err(|e| AppError::Other(format!("could not open {}: {}", path, e)))
}

/// Reveal a file in the file manager with the item selected.
#[tauri::command]
pub async fn reveal_file_in_explorer(app: AppHandle, path: String) -> AppResult<()> {
    app.opener()
        .reveal_item_in_dir(&path)
        .map_err(|e| AppError::Other(format!("could not reveal {}: {}", path, e)))
}
