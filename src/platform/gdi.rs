//! RAII wrappers for the GDI objects used by the capture paths.
//!
//! Every handle-holding type releases its handle in `Drop`, so no error path
//! can leak a device context or bitmap. Ordering matters: a memory DC must be
//! released before the bitmap that was selected into it is deleted, which is
//! why [`DibSection`] borrows the DC only transiently through [`select`].

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, ReleaseDC,
    SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ,
    SRCCOPY,
};

use crate::error::{AppError, AppResult};

/// The desktop device context, released on drop.
pub struct ScreenDc(HDC);

impl ScreenDc {
    pub fn get() -> AppResult<Self> {
        let hdc = unsafe { GetDC(None) };
        if hdc.is_invalid() {
            return Err(AppError::win32("GetDC"));
        }
        Ok(Self(hdc))
    }

    pub fn raw(&self) -> HDC {
        self.0
    }
}

impl Drop for ScreenDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(None, self.0);
        }
    }
}

/// A window's device context, released against its owner on drop.
pub struct WindowDc {
    hwnd: HWND,
    hdc: HDC,
}

impl WindowDc {
    pub fn get(hwnd: HWND) -> AppResult<Self> {
        let hdc = unsafe { GetDC(hwnd) };
        if hdc.is_invalid() {
            return Err(AppError::win32("GetDC"));
        }
        Ok(Self { hwnd, hdc })
    }

    pub fn raw(&self) -> HDC {
        self.hdc
    }
}

impl Drop for WindowDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(self.hwnd, self.hdc);
        }
    }
}

/// A memory device context, deleted on drop.
pub struct MemoryDc(HDC);

impl MemoryDc {
    pub fn compatible(reference: HDC) -> AppResult<Self> {
        let hdc = unsafe { CreateCompatibleDC(reference) };
        if hdc.is_invalid() {
            return Err(AppError::win32("CreateCompatibleDC"));
        }
        Ok(Self(hdc))
    }

    pub fn raw(&self) -> HDC {
        self.0
    }

    /// Select `bitmap` into this DC for the lifetime of the returned guard.
    /// The guard restores the previous object before the DC can be dropped.
    pub fn select<'a>(&'a self, bitmap: &'a DibSection) -> SelectionGuard<'a> {
        let old = unsafe { SelectObject(self.0, bitmap.handle()) };
        SelectionGuard { dc: self, old }
    }
}

impl Drop for MemoryDc {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.0);
        }
    }
}

/// Restores the previously selected GDI object when dropped.
pub struct SelectionGuard<'a> {
    dc: &'a MemoryDc,
    old: HGDIOBJ,
}

impl Drop for SelectionGuard<'_> {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.dc.0, self.old);
        }
    }
}

/// A 32-bit top-down DIB section plus the raw pointer to its pixel bits.
///
/// The bits pointer stays valid exactly as long as the bitmap handle lives,
/// which is the lifetime of this struct.
pub struct DibSection {
    bitmap: HBITMAP,
    bits: *mut u8,
    width: i32,
    height: i32,
}

impl DibSection {
    pub fn new(reference: HDC, width: i32, height: i32) -> AppResult<Self> {
        if width <= 0 || height <= 0 {
            return Err(AppError::Decode(format!(
                "invalid bitmap dimensions: {}x{}",
                width, height
            )));
        }

        let bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height, // top-down: row 0 is the top of the image
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut bits: *mut std::ffi::c_void = std::ptr::null_mut();
        let bitmap = unsafe { CreateDIBSection(reference, &bmi, DIB_RGB_COLORS, &mut bits, None, 0) }
            .map_err(|_| AppError::win32("CreateDIBSection"))?;

        if bits.is_null() {
            unsafe {
                let _ = DeleteObject(bitmap);
            }
            return Err(AppError::Platform {
                api: "CreateDIBSection",
                code: 0,
            });
        }

        Ok(Self {
            bitmap,
            bits: bits as *mut u8,
            width,
            height,
        })
    }

    pub fn handle(&self) -> HBITMAP {
        self.bitmap
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }

    /// Read the pixel buffer (BGRA, top-down).
    pub fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.bits, self.len()) }
    }

    /// Run `f` against the mutable pixel buffer (BGRA, top-down).
    ///
    /// The closure shape guarantees the buffer cannot outlive the bitmap.
    pub fn with_pixels<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let pixels = unsafe { std::slice::from_raw_parts_mut(self.bits, self.len()) };
        f(pixels)
    }
}

impl Drop for DibSection {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(self.bitmap);
        }
    }
}

// GDI handles are process-global; the DIB owns its allocation.
unsafe impl Send for DibSection {}

/// Copy `width`x`height` pixels starting at virtual-screen `(x, y)` out of
/// the desktop DC. Returns RGBA bytes with alpha forced opaque.
///
/// The process is per-monitor DPI aware, so these are physical pixels.
pub fn capture_rect(x: i32, y: i32, width: u32, height: u32) -> AppResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(AppError::Decode(format!(
            "empty capture rect: {}x{}",
            width, height
        )));
    }

    let screen = ScreenDc::get()?;
    let mem = MemoryDc::compatible(screen.raw())?;
    let dib = DibSection::new(screen.raw(), width as i32, height as i32)?;

    {
        let _selected = mem.select(&dib);
        unsafe {
            BitBlt(
                mem.raw(),
                0,
                0,
                width as i32,
                height as i32,
                screen.raw(),
                x,
                y,
                SRCCOPY,
            )
            .map_err(|_| AppError::win32("BitBlt"))?;
        }
    }

    let mut pixels = dib.bytes().to_vec();
    bgra_to_rgba_opaque(&mut pixels);
    Ok(pixels)
}

/// In-place BGRA → RGBA conversion with alpha forced to 255.
///
/// GDI leaves the alpha channel as garbage (usually zero) for screen blits;
/// opaque is the only correct reading.
pub fn bgra_to_rgba_opaque(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
        px[3] = 255;
    }
}
