//! Capture-lifecycle orchestration.
//!
//! Drives the choreography around every capture: snapshot the host window's
//! geometry, hide it, wait out the compositor's hide animation, acquire
//! pixels, and restore the host afterwards. For region capture this also
//! runs an overlay session and emits the committed crop as a
//! `region:selected` event.
//!
//! State is one explicit phase enum (`Idle`, `Preparing`, `OverlayShown`,
//! `Encoding`, `Finishing`, back to `Idle`) with the pre-capture geometry
//! snapshot carried inside the non-idle phases. While any capture is in flight,
//! window size tracking is suppressed: the snapshot taken at `Preparing`
//! stands until `Finishing`, so compositor feedback from hiding the window
//! can never corrupt the remembered geometry.

use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde::Serialize;
use tauri::{command, AppHandle, Emitter, Manager};

use crate::commands::capture::engine;
use crate::commands::capture::CaptureFrame;
use crate::commands::region_overlay::state::{compute_scale_ratio, scale_selection};
use crate::commands::region_overlay::types::SelectionResult;
use crate::commands::region_overlay::OVERLAY;
use crate::config;
use crate::error::{AppError, AppResult};

/// Event carrying the committed region crop to the editor.
pub const EVENT_REGION_SELECTED: &str = "region:selected";

/// Host window label (the editor host).
pub const MAIN_WINDOW: &str = "main";

/// Enforced minimum host window size; smaller snapshots fall back to the
/// last known good geometry.
pub const MIN_WINDOW_WIDTH: u32 = 800;
pub const MIN_WINDOW_HEIGHT: u32 = 600;

/// Settling time after hiding the host, covering the compositor's hide
/// animation so it cannot bleed into the captured frame.
const HIDE_SETTLE: Duration = Duration::from_millis(250);

// ============================================================================
// Phase state
// ============================================================================

/// Pre-capture snapshot of the host window. Written exactly once when a
/// capture starts, read once to restore, gone in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostWindowShadow {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// The host was already hidden before the capture started, so restoring
    /// must not show it.
    pub was_hidden: bool,
}

/// Capture lifecycle phase. The shadow exists only while a capture is in
/// flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Preparing(HostWindowShadow),
    OverlayShown(HostWindowShadow),
    Encoding(HostWindowShadow),
    Finishing(HostWindowShadow),
}

impl CapturePhase {
    pub fn is_capturing(&self) -> bool {
        !matches!(self, CapturePhase::Idle)
    }

    pub fn shadow(&self) -> Option<HostWindowShadow> {
        match self {
            CapturePhase::Idle => None,
            CapturePhase::Preparing(s)
            | CapturePhase::OverlayShown(s)
            | CapturePhase::Encoding(s)
            | CapturePhase::Finishing(s) => Some(*s),
        }
    }
}

lazy_static! {
    static ref PHASE: Mutex<CapturePhase> = Mutex::new(CapturePhase::Idle);
}

/// True while any capture lifecycle is in flight.
pub fn is_capturing() -> bool {
    PHASE.lock().is_capturing()
}

/// Apply the minimum-size rule to a host geometry snapshot: dimensions below
/// the enforced minimum are replaced by the last known good values.
pub fn effective_shadow(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    last_good: (u32, u32),
    was_hidden: bool,
) -> HostWindowShadow {
    let (width, height) = if width < MIN_WINDOW_WIDTH || height < MIN_WINDOW_HEIGHT {
        (
            last_good.0.max(MIN_WINDOW_WIDTH),
            last_good.1.max(MIN_WINDOW_HEIGHT),
        )
    } else {
        (width, height)
    };
    HostWindowShadow {
        x,
        y,
        width,
        height,
        was_hidden,
    }
}

/// Clamp a physical-pixel crop rectangle into a frame. `None` when nothing
/// of the rectangle remains, or when the clamped size falls below the
/// commit minimum on either axis.
pub fn clamp_crop(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    frame_width: u32,
    frame_height: u32,
) -> Option<(u32, u32, u32, u32)> {
    if x >= frame_width || y >= frame_height {
        return None;
    }
    let width = width.min(frame_width - x);
    let height = height.min(frame_height - y);
    if width < MIN_WINDOW_CROP || height < MIN_WINDOW_CROP {
        return None;
    }
    Some((x, y, width, height))
}

/// Selections below this many physical pixels on either axis are rejected
/// silently after DPI scaling.
const MIN_WINDOW_CROP: u32 = 10;

// ============================================================================
// Host window helpers
// ============================================================================

fn snapshot_host(app: &AppHandle) -> HostWindowShadow {
    let last_good = {
        let settings = config::current();
        (settings.window.width, settings.window.height)
    };

    let window = match app.get_webview_window(MAIN_WINDOW) {
        Some(w) => w,
        None => return effective_shadow(0, 0, 0, 0, last_good, true),
    };

    let position = window
        .outer_position()
        .map(|p| (p.x, p.y))
        .unwrap_or((0, 0));
    let size = window
        .outer_size()
        .map(|s| (s.width, s.height))
        .unwrap_or((0, 0));
    let visible = window.is_visible().unwrap_or(false);

    effective_shadow(position.0, position.1, size.0, size.1, last_good, !visible)
}

/// Hide the host and give the compositor time to finish its animation.
/// Tracked by the phase (not queried back from the OS): re-hiding an
/// already-hidden window races with the prepared capture.
fn hide_host(app: &AppHandle, shadow: &HostWindowShadow) {
    if shadow.was_hidden {
        return;
    }
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        let _ = window.hide();
        std::thread::sleep(HIDE_SETTLE);
    }
}

/// Restore the host window from its shadow: geometry, visibility, and a
/// brief topmost toggle to refresh its z-order after the overlay.
fn restore_host(app: &AppHandle, shadow: &HostWindowShadow) {
    if shadow.was_hidden {
        return;
    }
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        let _ = window.set_position(tauri::PhysicalPosition::new(shadow.x, shadow.y));
        let _ = window.set_size(tauri::PhysicalSize::new(shadow.width, shadow.height));
        let _ = window.show();
        let _ = window.set_always_on_top(true);
        let _ = window.set_always_on_top(false);
        let _ = window.set_focus();
    }
}

fn set_phase(phase: CapturePhase) {
    *PHASE.lock() = phase;
}

/// Run `capture` with the host window hidden, restoring it afterwards.
/// Used by the fullscreen/display/window capture paths, which share the
/// region lifecycle minus the overlay.
pub fn with_host_hidden<R>(
    app: &AppHandle,
    capture: impl FnOnce() -> AppResult<R>,
) -> AppResult<R> {
    {
        let mut phase = PHASE.lock();
        if phase.is_capturing() {
            // A lifecycle is already managing the host; just capture.
            drop(phase);
            return capture();
        }
        *phase = CapturePhase::Preparing(snapshot_host(app));
    }

    let shadow = match PHASE.lock().shadow() {
        Some(shadow) => shadow,
        None => return capture(), // reset out from under us; just capture
    };
    hide_host(app, &shadow);

    let result = capture();

    set_phase(CapturePhase::Finishing(shadow));
    restore_host(app, &shadow);
    set_phase(CapturePhase::Idle);

    result
}

// ============================================================================
// Region capture flow
// ============================================================================

/// Synchronous response of `prepare_region_capture`. The cropped image
/// itself travels in the `region:selected` event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum RegionOutcome {
    Cancelled,
    Committed { width: u32, height: u32 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegionSelectedPayload {
    width: u32,
    height: u32,
    screenshot: String,
}

/// Run one region-capture lifecycle.
///
/// Hides the host, captures the virtual screen, shows the overlay, and on
/// commit crops, encodes, and emits `region:selected` before the host is
/// restored. A second call while one is in flight returns `Cancelled`
/// immediately without touching the live session.
#[command]
pub async fn prepare_region_capture(app: AppHandle) -> AppResult<RegionOutcome> {
    // The flow sleeps and blocks on the overlay result channel; keep it off
    // the async runtime's core threads.
    tokio::task::spawn_blocking(move || run_region_capture(app))
        .await
        .map_err(|e| AppError::Other(format!("capture task failed: {}", e)))?
}

fn run_region_capture(app: AppHandle) -> AppResult<RegionOutcome> {
    // Idempotency gate.
    {
        let mut phase = PHASE.lock();
        if phase.is_capturing() || OVERLAY.is_active() {
            return Ok(RegionOutcome::Cancelled);
        }
        *phase = CapturePhase::Preparing(snapshot_host(&app));
    }
    let shadow = match PHASE.lock().shadow() {
        Some(shadow) => shadow,
        None => return Ok(RegionOutcome::Cancelled),
    };

    hide_host(&app, &shadow);

    // Acquire the virtual screen and hand it to the overlay.
    let (frame, bounds) = match engine::capture_virtual_screen_raw() {
        Ok(ok) => ok,
        Err(e) => {
            finish(&app, shadow);
            return Err(e);
        }
    };
    let frame = Arc::new(frame);
    let scale = compute_scale_ratio(frame.width, bounds.width);

    let result_rx = match OVERLAY.show(frame.clone(), bounds, scale) {
        Ok(rx) => rx,
        Err(e) => {
            finish(&app, shadow);
            return Err(e);
        }
    };
    set_phase(CapturePhase::OverlayShown(shadow));

    let selection = result_rx
        .recv()
        .unwrap_or(SelectionResult::Cancelled);

    let outcome = match selection {
        SelectionResult::Cancelled => RegionOutcome::Cancelled,
        SelectionResult::Committed {
            x,
            y,
            width,
            height,
        } => {
            set_phase(CapturePhase::Encoding(shadow));
            match encode_and_emit(&app, &frame, x, y, width, height, scale) {
                Some((width, height)) => RegionOutcome::Committed { width, height },
                None => RegionOutcome::Cancelled,
            }
        }
    };

    finish(&app, shadow);
    Ok(outcome)
}

/// Crop the committed selection out of the source frame, encode it once,
/// and emit it. Returns the crop dimensions, or `None` when the scaled
/// selection is degenerate.
fn encode_and_emit(
    app: &AppHandle,
    frame: &CaptureFrame,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    scale: f64,
) -> Option<(u32, u32)> {
    let (sx, sy, sw, sh) = scale_selection(x, y, width, height, scale);
    let (cx, cy, cw, ch) = clamp_crop(sx, sy, sw, sh, frame.width, frame.height)?;

    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.pixels.clone())?;
    let crop = image::imageops::crop_imm(&image, cx, cy, cw, ch).to_image();

    let crop_frame = CaptureFrame::new(cw, ch, crop.into_raw()).ok()?;
    let screenshot = match crop_frame.encode_png_base64() {
        Ok(s) => s,
        Err(e) => {
            log::error!("[REGION] PNG encode failed: {}", e);
            return None;
        }
    };

    let _ = app.emit(
        EVENT_REGION_SELECTED,
        RegionSelectedPayload {
            width: cw,
            height: ch,
            screenshot,
        },
    );

    Some((cw, ch))
}

fn finish(app: &AppHandle, shadow: HostWindowShadow) {
    set_phase(CapturePhase::Finishing(shadow));
    restore_host(app, &shadow);
    set_phase(CapturePhase::Idle);
}

/// Restore the host window and reset the lifecycle. Safe to call any time;
/// used by the editor as a recovery hatch.
#[command]
pub async fn finish_region_capture(app: AppHandle) -> AppResult<()> {
    let shadow = { PHASE.lock().shadow() };
    match shadow {
        Some(shadow) => finish(&app, shadow),
        None => {
            // Nothing in flight: just make sure the host is visible.
            if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
                let _ = window.show();
            }
        }
    }
    OVERLAY.hide();
    Ok(())
}

/// Track the host window size for later restoration. A no-op while a
/// capture is in flight; the pre-capture snapshot is authoritative then.
#[command]
pub async fn update_window_size(width: u32, height: u32) -> AppResult<()> {
    if is_capturing() {
        return Ok(());
    }
    if width >= MIN_WINDOW_WIDTH && height >= MIN_WINDOW_HEIGHT {
        config::remember_window_size(width, height);
    }
    Ok(())
}

/// Hide the host window into the tray.
#[command]
pub async fn minimize_to_tray(app: AppHandle) -> AppResult<()> {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        let _ = window.hide();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_shadow_presence() {
        let shadow = HostWindowShadow {
            x: 10,
            y: 20,
            width: 1000,
            height: 700,
            was_hidden: false,
        };
        assert!(CapturePhase::Idle.shadow().is_none());
        assert!(!CapturePhase::Idle.is_capturing());
        for phase in [
            CapturePhase::Preparing(shadow),
            CapturePhase::OverlayShown(shadow),
            CapturePhase::Encoding(shadow),
            CapturePhase::Finishing(shadow),
        ] {
            assert!(phase.is_capturing());
            assert_eq!(phase.shadow(), Some(shadow));
        }
    }

    #[test]
    fn test_effective_shadow_enforces_minimum() {
        // Below-minimum snapshots fall back to the last known good size.
        let s = effective_shadow(5, 5, 400, 300, (1024, 768), false);
        assert_eq!((s.width, s.height), (1024, 768));

        // Even the fallback is clamped up to the minimum.
        let s = effective_shadow(5, 5, 0, 0, (100, 100), false);
        assert_eq!((s.width, s.height), (MIN_WINDOW_WIDTH, MIN_WINDOW_HEIGHT));

        // A healthy snapshot passes through untouched.
        let s = effective_shadow(5, 5, 1280, 800, (1024, 768), true);
        assert_eq!((s.width, s.height), (1280, 800));
        assert!(s.was_hidden);
    }

    #[test]
    fn test_clamp_crop_inside_frame() {
        assert_eq!(
            clamp_crop(100, 100, 600, 400, 1920, 1080),
            Some((100, 100, 600, 400))
        );
    }

    #[test]
    fn test_clamp_crop_overhang_is_trimmed() {
        assert_eq!(
            clamp_crop(1800, 1000, 600, 400, 1920, 1080),
            Some((1800, 1000, 120, 80))
        );
    }

    #[test]
    fn test_clamp_crop_rejects_outside_and_tiny() {
        assert_eq!(clamp_crop(2000, 100, 50, 50, 1920, 1080), None);
        // Sub-10-pixel results are silently rejected.
        assert_eq!(clamp_crop(1915, 0, 100, 100, 1920, 1080), None);
        assert_eq!(clamp_crop(0, 0, 5, 100, 1920, 1080), None);
    }
}
