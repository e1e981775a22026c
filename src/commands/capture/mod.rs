//! Screen, window, and clipboard capture commands.
//!
//! Four acquisition modes (full screen at the cursor's display, specific
//! display, arbitrary virtual-screen rectangle, window by handle) plus
//! clipboard image ingestion. Every successful capture crosses the IPC boundary as
//! `{ width, height, data }` with `data` holding one base64 PNG encode.
//!
//! The GDI engine reads the desktop DC at physical resolution; window
//! capture falls back to a desktop blit when the window's own surface reads
//! as black (hardware-accelerated content).

pub mod clipboard;
pub mod engine;
pub mod types;

pub use types::{CaptureFrame, CaptureResult, RegionSelection, WindowInfo};

use tauri::{command, AppHandle};

use crate::commands::region_capture::with_host_hidden;
use crate::error::{AppError, AppResult};
use crate::platform::monitors::{self, MonitorInfo, VirtualScreenBounds};

/// Run a blocking capture closure off the async runtime's core threads.
async fn run_blocking<R: Send + 'static>(
    f: impl FnOnce() -> AppResult<R> + Send + 'static,
) -> AppResult<R> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Other(format!("capture task failed: {}", e)))?
}

/// Get all attached displays. Re-enumerated on every call (hot-plug).
#[command]
pub async fn get_monitors() -> AppResult<Vec<MonitorInfo>> {
    monitors::enumerate()
}

/// Get the virtual screen bounds (all displays combined).
#[command]
pub async fn get_virtual_screen_bounds() -> AppResult<VirtualScreenBounds> {
    #[cfg(target_os = "windows")]
    {
        Ok(monitors::virtual_screen_bounds())
    }

    #[cfg(not(target_os = "windows"))]
    {
        Err(AppError::Unsupported("Screen capture"))
    }
}

/// Capture the display currently containing the cursor, with the host
/// window hidden for the duration.
#[command]
pub async fn capture_fullscreen(app: AppHandle) -> AppResult<CaptureResult> {
    run_blocking(move || with_host_hidden(&app, || engine::capture_fullscreen()?.to_result())).await
}

/// Capture one display at its physical resolution.
#[command]
pub async fn capture_display(app: AppHandle, index: usize) -> AppResult<CaptureResult> {
    run_blocking(move || with_host_hidden(&app, || engine::capture_display(index)?.to_result()))
        .await
}

/// Capture an arbitrary rectangle in virtual-screen coordinates. No host
/// hiding: the editor uses this for rectangles it already knows are clear.
#[command]
pub async fn capture_region(selection: RegionSelection) -> AppResult<CaptureResult> {
    run_blocking(move || {
        engine::capture_region(
            selection.x,
            selection.y,
            selection.width,
            selection.height,
        )?
        .to_result()
    })
    .await
}

/// Capture a window by handle, with the black-frame desktop fallback and
/// the host hidden (it could overlap the target).
#[command]
pub async fn capture_window(app: AppHandle, handle: isize) -> AppResult<CaptureResult> {
    run_blocking(move || with_host_hidden(&app, || engine::capture_window(handle)?.to_result()))
        .await
}

/// Enumerate capturable top-level windows, optionally with thumbnails.
#[command]
pub async fn get_windows(thumbnails: Option<bool>) -> AppResult<Vec<WindowInfo>> {
    run_blocking(move || engine::list_windows(thumbnails.unwrap_or(false))).await
}

/// Read an image from the clipboard.
///
/// The open/read/close triple runs on one dedicated thread. Fails with
/// "no image in clipboard" when no acceptable format is present, or
/// "clipboard unavailable" when another process holds the clipboard open;
/// the editor distinguishes the two.
#[command]
pub async fn read_clipboard_image() -> AppResult<CaptureResult> {
    run_blocking(|| clipboard::read_clipboard_image()?.to_result()).await
}
