//! Display topology queries.
//!
//! Monitors are re-enumerated on every call. Nothing here caches topology
//! across capture operations because displays hot-plug and resolutions change
//! under us.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// One attached display, in virtual-screen coordinates.
///
/// Origins are signed: displays left of or above the primary display have
/// negative origins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorInfo {
    pub index: usize,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
    pub is_primary: bool,
}

/// The axis-aligned bounding box containing every active display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualScreenBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Compute the axis-aligned union of a set of monitor rectangles.
///
/// This is what `virtual_screen_bounds` reports for the same topology; kept
/// as a pure function so the relationship is testable without a display.
pub fn union_bounds(monitors: &[MonitorInfo]) -> Option<VirtualScreenBounds> {
    let first = monitors.first()?;
    let mut left = first.x;
    let mut top = first.y;
    let mut right = first.x + first.width as i32;
    let mut bottom = first.y + first.height as i32;

    for m in &monitors[1..] {
        left = left.min(m.x);
        top = top.min(m.y);
        right = right.max(m.x + m.width as i32);
        bottom = bottom.max(m.y + m.height as i32);
    }

    Some(VirtualScreenBounds {
        x: left,
        y: top,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

#[cfg(target_os = "windows")]
mod imp {
    use super::*;

    use windows::Win32::Foundation::{BOOL, LPARAM, POINT, RECT, TRUE};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO,
    };
    use windows::Win32::UI::HiDpi::{GetDpiForMonitor, MDT_EFFECTIVE_DPI};
    use windows::Win32::UI::WindowsAndMessaging::{
        GetCursorPos, GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
        SM_YVIRTUALSCREEN,
    };

    // MONITORINFO.dwFlags bit marking the primary display.
    const MONITORINFOF_PRIMARY: u32 = 1;

    unsafe extern "system" fn enum_proc(
        hmonitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let list = &mut *(lparam.0 as *mut Vec<MonitorInfo>);

        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        if !GetMonitorInfoW(hmonitor, &mut info).as_bool() {
            return TRUE; // skip this display, keep enumerating
        }

        let mut dpi_x = 96u32;
        let mut dpi_y = 96u32;
        let _ = GetDpiForMonitor(hmonitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y);

        list.push(MonitorInfo {
            index: list.len(),
            x: info.rcMonitor.left,
            y: info.rcMonitor.top,
            width: (info.rcMonitor.right - info.rcMonitor.left) as u32,
            height: (info.rcMonitor.bottom - info.rcMonitor.top) as u32,
            scale_factor: dpi_x as f64 / 96.0,
            is_primary: info.dwFlags & MONITORINFOF_PRIMARY != 0,
        });

        TRUE
    }

    /// Enumerate all attached displays, primary first ordering not guaranteed.
    pub fn enumerate() -> AppResult<Vec<MonitorInfo>> {
        let mut monitors: Vec<MonitorInfo> = Vec::new();

        let ok = unsafe {
            EnumDisplayMonitors(
                None,
                None,
                Some(enum_proc),
                LPARAM(&mut monitors as *mut Vec<MonitorInfo> as isize),
            )
        };
        if !ok.as_bool() {
            return Err(AppError::win32("EnumDisplayMonitors"));
        }
        if monitors.is_empty() {
            return Err(AppError::Platform {
                api: "EnumDisplayMonitors",
                code: 0,
            });
        }

        Ok(monitors)
    }

    /// Bounds of the virtual screen (all monitors combined).
    pub fn virtual_screen_bounds() -> VirtualScreenBounds {
        unsafe {
            VirtualScreenBounds {
                x: GetSystemMetrics(SM_XVIRTUALSCREEN),
                y: GetSystemMetrics(SM_YVIRTUALSCREEN),
                width: GetSystemMetrics(SM_CXVIRTUALSCREEN) as u32,
                height: GetSystemMetrics(SM_CYVIRTUALSCREEN) as u32,
            }
        }
    }

    /// Bounds of one display by index.
    pub fn display_bounds(index: usize) -> AppResult<MonitorInfo> {
        enumerate()?
            .into_iter()
            .nth(index)
            .ok_or(AppError::DisplayNotFound { index })
    }

    /// Number of attached displays.
    pub fn display_count() -> AppResult<usize> {
        Ok(enumerate()?.len())
    }

    /// Index of the display currently containing the cursor.
    ///
    /// Falls back to the primary display (or 0) when the cursor sits exactly
    /// on a seam the containment test misses.
    pub fn cursor_display() -> AppResult<usize> {
        let mut pt = POINT::default();
        unsafe {
            if GetCursorPos(&mut pt).is_err() {
                return Err(AppError::win32("GetCursorPos"));
            }
        }

        let monitors = enumerate()?;
        let hit = monitors.iter().find(|m| {
            pt.x >= m.x
                && pt.x < m.x + m.width as i32
                && pt.y >= m.y
                && pt.y < m.y + m.height as i32
        });

        Ok(match hit {
            Some(m) => m.index,
            None => monitors
                .iter()
                .find(|m| m.is_primary)
                .map(|m| m.index)
                .unwrap_or(0),
        })
    }
}

#[cfg(target_os = "windows")]
pub use imp::{cursor_display, display_bounds, display_count, enumerate, virtual_screen_bounds};

#[cfg(not(target_os = "windows"))]
pub fn enumerate() -> AppResult<Vec<MonitorInfo>> {
    Err(AppError::Unsupported("Display enumeration"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(index: usize, x: i32, y: i32, width: u32, height: u32) -> MonitorInfo {
        MonitorInfo {
            index,
            x,
            y,
            width,
            height,
            scale_factor: 1.0,
            is_primary: index == 0,
        }
    }

    #[test]
    fn test_union_single_monitor() {
        let bounds = union_bounds(&[monitor(0, 0, 0, 1920, 1080)]).unwrap();
        assert_eq!(
            bounds,
            VirtualScreenBounds {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn test_union_monitor_left_of_primary() {
        // Secondary display left of the primary has a negative origin.
        let bounds = union_bounds(&[
            monitor(0, 0, 0, 2560, 1440),
            monitor(1, -1920, 200, 1920, 1080),
        ])
        .unwrap();
        assert_eq!(bounds.x, -1920);
        assert_eq!(bounds.y, 0);
        assert_eq!(bounds.width, 2560 + 1920);
        assert_eq!(bounds.height, 1440);
    }

    #[test]
    fn test_union_stacked_monitors() {
        let bounds = union_bounds(&[
            monitor(0, 0, 0, 1920, 1080),
            monitor(1, 0, -1080, 1920, 1080),
        ])
        .unwrap();
        assert_eq!(bounds.y, -1080);
        assert_eq!(bounds.height, 2160);
    }

    #[test]
    fn test_union_empty() {
        assert!(union_bounds(&[]).is_none());
    }
}
