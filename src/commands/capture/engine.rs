//! Screen, display, region, and window acquisition.
//!
//! All paths blit out of the desktop DC at physical resolution (the process
//! is per-monitor DPI aware) and normalize to RGBA [`CaptureFrame`]s.
//!
//! Window capture is two-stage: `PrintWindow` first, which renders windows
//! that are occluded or off-screen, then a desktop-region fallback when the
//! result reads as black (hardware-accelerated surfaces blit as opaque black
//! through a window DC).

use crate::error::{AppError, AppResult};
use crate::platform::monitors;

use super::types::{CaptureFrame, WindowInfo};

/// Fraction of sampled pixels that must carry light for a frame to count as
/// non-black. Below this, window capture retries via the desktop.
const BLACK_FRAME_THRESHOLD: f64 = 0.01;

/// Sample stride for black-frame detection; every Nth pixel is inspected.
const BLACK_FRAME_SAMPLE_STEP: usize = 16;

/// Decide whether a captured frame is effectively black.
///
/// Samples every [`BLACK_FRAME_SAMPLE_STEP`]th pixel and counts those with
/// any non-zero RGB channel; a frame qualifies as black when fewer than 1%
/// of samples carry light.
pub fn is_effectively_black(frame: &CaptureFrame) -> bool {
    let total_pixels = frame.pixels.len() / 4;
    if total_pixels == 0 {
        return true;
    }

    let mut sampled = 0usize;
    let mut lit = 0usize;
    let mut index = 0usize;
    while index < total_pixels {
        let px = &frame.pixels[index * 4..index * 4 + 3];
        sampled += 1;
        if px[0] != 0 || px[1] != 0 || px[2] != 0 {
            lit += 1;
        }
        index += BLACK_FRAME_SAMPLE_STEP;
    }

    (lit as f64 / sampled as f64) < BLACK_FRAME_THRESHOLD
}

#[cfg(target_os = "windows")]
mod imp {
    use super::*;

    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT, TRUE};
    use windows::Win32::Graphics::Dwm::{
        DwmGetWindowAttribute, DWMWA_CLOAKED, DWMWA_EXTENDED_FRAME_BOUNDS,
    };
    use windows::Win32::System::Threading::GetCurrentProcessId;
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowLongW, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
        GetWindowThreadProcessId, IsIconic, IsWindowVisible, PrintWindow, GWL_EXSTYLE,
        PRINT_WINDOW_FLAGS, WS_EX_TOOLWINDOW,
    };

    use crate::platform::gdi::{self, DibSection, MemoryDc, WindowDc};

    // Renders DWM-composited content too; missing from the windows crate.
    const PW_RENDERFULLCONTENT: PRINT_WINDOW_FLAGS = PRINT_WINDOW_FLAGS(2);

    /// Thumbnail bound for `get_windows` previews.
    const THUMBNAIL_SIZE: u32 = 240;

    /// Capture an arbitrary rectangle of the virtual screen.
    pub fn capture_region(x: i32, y: i32, width: u32, height: u32) -> AppResult<CaptureFrame> {
        let pixels = gdi::capture_rect(x, y, width, height)?;
        CaptureFrame::new(width, height, pixels)
    }

    /// Capture the full virtual screen. Returns the frame plus the bounds it
    /// was taken at, so callers can map frame pixels back to screen space.
    pub fn capture_virtual_screen_raw(
    ) -> AppResult<(CaptureFrame, monitors::VirtualScreenBounds)> {
        let bounds = monitors::virtual_screen_bounds();
        let frame = capture_region(bounds.x, bounds.y, bounds.width, bounds.height)?;
        Ok((frame, bounds))
    }

    /// Capture one display by index.
    pub fn capture_display(index: usize) -> AppResult<CaptureFrame> {
        let display = monitors::display_bounds(index)?;
        capture_region(display.x, display.y, display.width, display.height)
    }

    /// Capture the display currently containing the cursor.
    pub fn capture_fullscreen() -> AppResult<CaptureFrame> {
        capture_display(monitors::cursor_display()?)
    }

    /// Visible bounds of a window: DWM extended frame bounds (excludes the
    /// drop shadow), falling back to `GetWindowRect`.
    pub fn window_bounds(hwnd: HWND) -> AppResult<RECT> {
        let mut rect = RECT::default();
        let ok = unsafe {
            DwmGetWindowAttribute(
                hwnd,
                DWMWA_EXTENDED_FRAME_BOUNDS,
                &mut rect as *mut RECT as *mut std::ffi::c_void,
                std::mem::size_of::<RECT>() as u32,
            )
        };
        if ok.is_err() {
            unsafe {
                GetWindowRect(hwnd, &mut rect).map_err(|_| AppError::win32("GetWindowRect"))?;
            }
        }
        Ok(rect)
    }

    /// Capture a window by handle.
    ///
    /// Primary strategy is `PrintWindow` through the window's own DC; if that
    /// yields an effectively black frame, fall back to capturing the desktop
    /// region behind the window's bounds.
    pub fn capture_window(handle: isize) -> AppResult<CaptureFrame> {
        let hwnd = HWND(handle as *mut std::ffi::c_void);
        unsafe {
            if !IsWindowVisible(hwnd).as_bool() {
                return Err(AppError::WindowNotFound { handle });
            }
        }

        let rect = window_bounds(hwnd)?;
        let width = (rect.right - rect.left).max(0) as u32;
        let height = (rect.bottom - rect.top).max(0) as u32;
        if width == 0 || height == 0 {
            return Err(AppError::WindowNotFound { handle });
        }

        match print_window_frame(hwnd, width, height) {
            Ok(frame) if !is_effectively_black(&frame) => Ok(frame),
            _ => {
                log::debug!(
                    "[CAPTURE] PrintWindow produced a black frame for {:?}, using desktop fallback",
                    hwnd
                );
                capture_region(rect.left, rect.top, width, height)
            }
        }
    }

    fn print_window_frame(hwnd: HWND, width: u32, height: u32) -> AppResult<CaptureFrame> {
        let window_dc = WindowDc::get(hwnd)?;
        let mem = MemoryDc::compatible(window_dc.raw())?;
        let dib = DibSection::new(window_dc.raw(), width as i32, height as i32)?;

        {
            let _selected = mem.select(&dib);
            let ok = unsafe { PrintWindow(hwnd, mem.raw(), PW_RENDERFULLCONTENT) };
            if !ok.as_bool() {
                return Err(AppError::win32("PrintWindow"));
            }
        }

        let mut pixels = dib.bytes().to_vec();
        gdi::bgra_to_rgba_opaque(&mut pixels);
        CaptureFrame::new(width, height, pixels)
    }

    struct EnumContext {
        windows: Vec<WindowInfo>,
        own_pid: u32,
    }

    unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let ctx = &mut *(lparam.0 as *mut EnumContext);
        if let Some(info) = inspect_window(hwnd, ctx.own_pid) {
            ctx.windows.push(info);
        }
        TRUE
    }

    /// Decide whether `hwnd` is worth listing, and describe it if so.
    fn inspect_window(hwnd: HWND, own_pid: u32) -> Option<WindowInfo> {
        unsafe {
            if !IsWindowVisible(hwnd).as_bool() || IsIconic(hwnd).as_bool() {
                return None;
            }

            // Skip windows cloaked by DWM (hidden UWP shells and the like).
            let mut cloaked: u32 = 0;
            if DwmGetWindowAttribute(
                hwnd,
                DWMWA_CLOAKED,
                &mut cloaked as *mut u32 as *mut std::ffi::c_void,
                std::mem::size_of::<u32>() as u32,
            )
            .is_ok()
                && cloaked != 0
            {
                return None;
            }

            let mut process_id = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&mut process_id));
            if process_id == own_pid {
                return None;
            }

            let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as u32;
            if ex_style & WS_EX_TOOLWINDOW.0 != 0 {
                return None;
            }

            let title_len = GetWindowTextLengthW(hwnd);
            if title_len == 0 {
                return None;
            }
            let mut buffer = vec![0u16; (title_len + 1) as usize];
            GetWindowTextW(hwnd, &mut buffer);
            let title = String::from_utf16_lossy(&buffer[..title_len as usize]);

            let rect = window_bounds(hwnd).ok()?;
            let width = (rect.right - rect.left).max(0) as u32;
            let height = (rect.bottom - rect.top).max(0) as u32;
            if width < 50 || height < 50 {
                return None;
            }

            Some(WindowInfo {
                handle: hwnd.0 as isize,
                title,
                app_name: String::new(),
                x: rect.left,
                y: rect.top,
                width,
                height,
                thumbnail: None,
            })
        }
    }

    /// Enumerate capturable top-level windows, optionally with PNG thumbnails.
    pub fn list_windows(with_thumbnails: bool) -> AppResult<Vec<WindowInfo>> {
        let mut ctx = EnumContext {
            windows: Vec::new(),
            own_pid: unsafe { GetCurrentProcessId() },
        };

        unsafe {
            EnumWindows(
                Some(enum_proc),
                LPARAM(&mut ctx as *mut EnumContext as isize),
            )
            .map_err(|_| AppError::win32("EnumWindows"))?;
        }

        if with_thumbnails {
            for info in &mut ctx.windows {
                info.thumbnail = window_thumbnail(info.handle);
            }
        }

        Ok(ctx.windows)
    }

    fn window_thumbnail(handle: isize) -> Option<String> {
        let frame = capture_window(handle).ok()?;
        let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.pixels)?;
        let small = image::DynamicImage::ImageRgba8(image).thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);

        let mut buffer = std::io::Cursor::new(Vec::new());
        small.write_to(&mut buffer, image::ImageFormat::Png).ok()?;

        use base64::{engine::general_purpose::STANDARD, Engine};
        Some(STANDARD.encode(buffer.into_inner()))
    }
}

#[cfg(target_os = "windows")]
pub use imp::{
    capture_display, capture_fullscreen, capture_region, capture_virtual_screen_raw,
    capture_window, list_windows, window_bounds,
};

#[cfg(not(target_os = "windows"))]
mod imp_stub {
    use super::*;

    pub fn capture_region(_x: i32, _y: i32, _w: u32, _h: u32) -> AppResult<CaptureFrame> {
        Err(AppError::Unsupported("Screen capture"))
    }

    pub fn capture_virtual_screen_raw(
    ) -> AppResult<(CaptureFrame, monitors::VirtualScreenBounds)> {
        Err(AppError::Unsupported("Screen capture"))
    }

    pub fn capture_display(_index: usize) -> AppResult<CaptureFrame> {
        Err(AppError::Unsupported("Screen capture"))
    }

    pub fn capture_fullscreen() -> AppResult<CaptureFrame> {
        Err(AppError::Unsupported("Screen capture"))
    }

    pub fn capture_window(_handle: isize) -> AppResult<CaptureFrame> {
        Err(AppError::Unsupported("Window capture"))
    }

    pub fn list_windows(_with_thumbnails: bool) -> AppResult<Vec<WindowInfo>> {
        Err(AppError::Unsupported("Window enumeration"))
    }
}

#[cfg(not(target_os = "windows"))]
pub use imp_stub::{
    capture_display, capture_fullscreen, capture_region, capture_virtual_screen_raw,
    capture_window, list_windows,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> CaptureFrame {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width * height {
            pixels.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        CaptureFrame::new(width, height, pixels).unwrap()
    }

    #[test]
    fn test_black_frame_detected() {
        let frame = solid_frame(64, 64, [0, 0, 0]);
        assert!(is_effectively_black(&frame));
    }

    #[test]
    fn test_normal_frame_not_black() {
        let frame = solid_frame(64, 64, [30, 90, 200]);
        assert!(!is_effectively_black(&frame));
    }

    #[test]
    fn test_mostly_black_with_sparse_light_is_black() {
        // A scattering of lit pixels below 1% still counts as black.
        let mut frame = solid_frame(128, 128, [0, 0, 0]);
        // Light up a handful of the sampled pixels (every 16th is sampled;
        // 1024 samples total, so 5 lit samples is ~0.5%).
        for i in 0..5 {
            let px = i * 16 * 4 * 40;
            frame.pixels[px] = 255;
        }
        assert!(is_effectively_black(&frame));
    }

    #[test]
    fn test_half_lit_frame_not_black() {
        let mut frame = solid_frame(64, 64, [0, 0, 0]);
        let half = frame.pixels.len() / 2;
        for px in frame.pixels[..half].chunks_exact_mut(4) {
            px[1] = 128;
        }
        assert!(!is_effectively_black(&frame));
    }
}
