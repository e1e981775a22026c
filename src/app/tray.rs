//! System tray setup and event handling.
//!
//! The tray maps shell interactions to user intents: a left single click
//! opens the screenshot library, a left double click shows the main window,
//! and the context menu mirrors the capture hotkeys. Menu capture items emit
//! the same `hotkey:*` events the hotkey broker does, so the editor drives
//! one code path for both.

use tauri::{
    menu::{Menu, MenuItem, PredefinedMenuItem},
    tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent},
    App, AppHandle, Emitter, Manager,
};

use crate::commands::hotkeys::{
    EVENT_HOTKEY_FULLSCREEN, EVENT_HOTKEY_REGION, EVENT_HOTKEY_WINDOW,
};
use crate::commands::region_capture::MAIN_WINDOW;
use crate::error::{AppError, AppResult};

/// Emitted on a single left click: open the capture history/library view.
pub const EVENT_TRAY_LIBRARY: &str = "tray:library";

/// Stable id for looking the tray icon up at runtime (tooltip updates).
const TRAY_ID: &str = "quickshot-tray";

/// Set up the notification-area icon with its context menu.
///
/// Failures here are logged by the caller and do not abort startup; the
/// application is still usable through hotkeys and the main window.
pub fn init(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    let show = MenuItem::with_id(app, "show", "Show QuickShot", true, None::<&str>)?;
    let fullscreen =
        MenuItem::with_id(app, "capture_fullscreen", "Capture Fullscreen", true, None::<&str>)?;
    let region = MenuItem::with_id(app, "capture_region", "Capture Region", true, None::<&str>)?;
    let window = MenuItem::with_id(app, "capture_window", "Capture Window", true, None::<&str>)?;
    let quit = MenuItem::with_id(app, "quit", "Quit QuickShot", true, None::<&str>)?;
    let separator = PredefinedMenuItem::separator(app)?;
    let separator2 = PredefinedMenuItem::separator(app)?;

    let menu = Menu::with_items(
        app,
        &[
            &show,
            &separator,
            &fullscreen,
            &region,
            &window,
            &separator2,
            &quit,
        ],
    )?;

    let mut builder = TrayIconBuilder::with_id(TRAY_ID)
        .menu(&menu)
        .tooltip(default_tooltip())
        .show_menu_on_left_click(false)
        .on_menu_event(move |app, event| match event.id.as_ref() {
            "quit" => app.exit(0),
            "show" => show_main(app),
            "capture_fullscreen" => {
                let _ = app.emit(EVENT_HOTKEY_FULLSCREEN, ());
            }
            "capture_region" => {
                let _ = app.emit(EVENT_HOTKEY_REGION, ());
            }
            "capture_window" => {
                let _ = app.emit(EVENT_HOTKEY_WINDOW, ());
            }
            _ => {}
        })
        .on_tray_icon_event(|tray, event| match event {
            TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } => {
                // Single left click opens the capture history.
                let _ = tray.app_handle().emit(EVENT_TRAY_LIBRARY, ());
            }
            TrayIconEvent::DoubleClick {
                button: MouseButton::Left,
                ..
            } => {
                show_main(tray.app_handle());
            }
            _ => {}
        });

    if let Some(icon) = app.default_window_icon() {
        builder = builder.icon(icon.clone());
    }

    builder.build(app)?;
    Ok(())
}

fn default_tooltip() -> String {
    format!("QuickShot {}", env!("CARGO_PKG_VERSION"))
}

fn show_main(app: &AppHandle) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        let _ = window.show();
        let _ = window.set_focus();
    }
}

/// Replace the tray tooltip text.
pub fn set_tooltip(app: &AppHandle, text: &str) -> AppResult<()> {
    let tray = app
        .tray_by_id(TRAY_ID)
        .ok_or_else(|| AppError::Other("tray icon not initialized".to_string()))?;
    tray.set_tooltip(Some(text))
        .map_err(|e| AppError::Other(format!("failed to set tray tooltip: {}", e)))
}

/// Reset the tooltip to the versioned default.
pub fn refresh_tooltip(app: &AppHandle) {
    if let Err(e) = set_tooltip(app, &default_tooltip()) {
        log::debug!("[TRAY] tooltip refresh skipped: {}", e);
    }
}
