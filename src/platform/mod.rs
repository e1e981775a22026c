//! Typed wrappers over the Win32 surfaces the capture core touches.
//!
//! Everything here translates OS failures into [`crate::error::AppError`]
//! instead of panicking; callers decide whether a failed call is fatal.

pub mod monitors;

#[cfg(target_os = "windows")]
pub mod gdi;

/// Declare per-monitor DPI awareness for the whole process.
///
/// Must run before any window is created, otherwise captures come back at
/// DPI-virtualized (logical) resolution instead of physical pixels.
/// Non-fatal on failure: the manifest may already have declared it.
pub fn declare_dpi_awareness() {
    #[cfg(target_os = "windows")]
    {
        use windows::Win32::UI::HiDpi::{
            SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
        };

        unsafe {
            if SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2).is_err() {
                log::debug!("SetProcessDpiAwarenessContext failed (already set by manifest?)");
            }
        }
    }
}
