//! Window event handlers.
//!
//! Size tracking for the main window lives here. While a capture lifecycle
//! is in flight the tracker is a no-op: hiding the host produces compositor
//! feedback (resize/move events) that must not overwrite the geometry
//! snapshot taken when the capture started.

use tauri::{Window, WindowEvent};

use crate::commands::region_capture::{self, MAIN_WINDOW, MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH};
use crate::config;

/// Handle window events for the application.
///
/// This is called from the Tauri builder's `on_window_event` hook.
pub fn handle_window_event(window: &Window, event: &WindowEvent) {
    match event {
        WindowEvent::Resized(size) => {
            if window.label() != MAIN_WINDOW {
                return;
            }
            // Dropped entirely during capture: the pre-capture snapshot is
            // authoritative until Finishing.
            if region_capture::is_capturing() {
                return;
            }
            if size.width >= MIN_WINDOW_WIDTH && size.height >= MIN_WINDOW_HEIGHT {
                config::remember_window_size(size.width, size.height);
            }
        }

        // Minimize to tray instead of closing the main window (if enabled)
        WindowEvent::CloseRequested { api, .. } => {
            if window.label() == MAIN_WINDOW && config::is_close_to_tray() {
                api.prevent_close();
                let _ = window.hide();
            }
        }

        _ => {}
    }
}
