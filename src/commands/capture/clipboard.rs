//! Clipboard image ingestion.
//!
//! Formats consumed, in priority order: the registered `"PNG"` format
//! (placed there by modern browsers), `CF_DIBV5` (preserves alpha), `CF_DIB`
//! (legacy), and `CF_HDROP` (first dropped file with a supported image
//! extension). The clipboard must be opened, read, and closed on the same
//! thread; [`ClipboardGuard`] pins the whole read to one open/close pair.
//!
//! DIB parsing is kept free of any OS dependency so the row-direction,
//! stride, alpha-repair, and rejection rules are unit-testable anywhere.

use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

use super::types::CaptureFrame;

/// Hard cap on any clipboard payload, bounding memory on hostile producers.
pub const MAX_CLIPBOARD_BYTES: usize = 100 * 1024 * 1024;

/// Standard clipboard format ids (winuser.h).
pub const CF_DIB: u32 = 8;
pub const CF_HDROP: u32 = 15;
pub const CF_DIBV5: u32 = 17;

/// File extensions accepted from a CF_HDROP payload.
pub const SUPPORTED_DROP_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

const BITMAPINFOHEADER_SIZE: usize = 40;
const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

/// Per-row byte stride of a DIB: pixel rows are padded to 32-bit boundaries.
pub fn dib_stride(width: u32, bit_count: u16) -> usize {
    ((width as usize * bit_count as usize + 31) / 32) * 4
}

/// The subset of BITMAPINFOHEADER the decoder needs. Also covers the V4/V5
/// extensions, which only grow the header.
#[derive(Debug, Clone, Copy)]
struct DibHeader {
    header_size: usize,
    width: u32,
    /// Raw signed height: positive = bottom-up rows, negative = top-down.
    raw_height: i32,
    bit_count: u16,
    compression: u32,
    colors_used: u32,
}

impl DibHeader {
    fn parse(data: &[u8]) -> AppResult<Self> {
        if data.len() < BITMAPINFOHEADER_SIZE {
            return Err(AppError::Decode(format!(
                "DIB too small for header: {} bytes",
                data.len()
            )));
        }

        let u32_at = |off: usize| u32::from_le_bytes(data[off..off + 4].try_into().unwrap());
        let i32_at = |off: usize| i32::from_le_bytes(data[off..off + 4].try_into().unwrap());
        let u16_at = |off: usize| u16::from_le_bytes(data[off..off + 2].try_into().unwrap());

        let header_size = u32_at(0) as usize;
        if header_size < BITMAPINFOHEADER_SIZE || header_size > data.len() {
            return Err(AppError::Decode(format!(
                "invalid DIB header size: {}",
                header_size
            )));
        }

        let width = i32_at(4);
        let raw_height = i32_at(8);
        if width <= 0 || raw_height == 0 {
            return Err(AppError::Decode(format!(
                "invalid DIB dimensions: {}x{}",
                width, raw_height
            )));
        }

        Ok(Self {
            header_size,
            width: width as u32,
            raw_height,
            bit_count: u16_at(14),
            compression: u32_at(16),
            colors_used: u32_at(32),
        })
    }

    fn height(&self) -> u32 {
        self.raw_height.unsigned_abs()
    }

    fn is_top_down(&self) -> bool {
        self.raw_height < 0
    }

    /// Offset of the pixel array within the packed DIB: the header, then the
    /// three BI_BITFIELDS masks (only when using the plain 40-byte header;
    /// V4/V5 headers embed the masks), then any color table.
    fn pixel_offset(&self) -> usize {
        let mut offset = self.header_size;
        if self.compression == BI_BITFIELDS && self.header_size == BITMAPINFOHEADER_SIZE {
            offset += 12;
        }
        offset + self.colors_used as usize * 4
    }
}

/// Decode a packed DIB (CF_DIB / CF_DIBV5 payload) into an RGBA frame.
///
/// Rules:
/// - Only 24-bit and 32-bit uncompressed pixels are accepted.
/// - The height field's sign selects bottom-up vs. top-down row order; the
///   output is always top-down.
/// - Stride is validated against the payload before any row is read.
/// - 32-bit images whose alpha channel is zero everywhere are repaired to
///   fully opaque (several producers zero the channel).
pub fn decode_dib(data: &[u8]) -> AppResult<CaptureFrame> {
    if data.len() > MAX_CLIPBOARD_BYTES {
        return Err(AppError::Decode(format!(
            "clipboard payload exceeds {} MB cap",
            MAX_CLIPBOARD_BYTES / (1024 * 1024)
        )));
    }

    let header = DibHeader::parse(data)?;

    if header.bit_count != 24 && header.bit_count != 32 {
        return Err(AppError::Decode(format!(
            "unsupported bit depth: {}",
            header.bit_count
        )));
    }
    if header.compression != BI_RGB && header.compression != BI_BITFIELDS {
        return Err(AppError::Decode(format!(
            "unsupported DIB compression: {}",
            header.compression
        )));
    }

    let width = header.width;
    let height = header.height();
    let stride = dib_stride(width, header.bit_count);
    let offset = header.pixel_offset();

    let pixel_bytes = data
        .len()
        .checked_sub(offset)
        .ok_or_else(|| AppError::Decode("DIB pixel data missing".to_string()))?;
    if stride.checked_mul(height as usize).unwrap_or(usize::MAX) > pixel_bytes {
        return Err(AppError::Decode(format!(
            "DIB pixel data truncated: need {} bytes, have {}",
            stride * height as usize,
            pixel_bytes
        )));
    }

    let src = &data[offset..];
    let bytes_per_pixel = header.bit_count as usize / 8;
    let mut pixels = vec![0u8; width as usize * height as usize * 4];

    for out_row in 0..height as usize {
        let src_row = if header.is_top_down() {
            out_row
        } else {
            height as usize - 1 - out_row
        };
        let row = &src[src_row * stride..];

        for col in 0..width as usize {
            let px = &row[col * bytes_per_pixel..];
            let out = &mut pixels[(out_row * width as usize + col) * 4..][..4];
            out[0] = px[2];
            out[1] = px[1];
            out[2] = px[0];
            out[3] = if bytes_per_pixel == 4 { px[3] } else { 255 };
        }
    }

    // Alpha repair: a 32-bit DIB that is transparent everywhere was almost
    // certainly written by a producer that zeroes the channel.
    if bytes_per_pixel == 4 && pixels.chunks_exact(4).all(|px| px[3] == 0) {
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
    }

    CaptureFrame::new(width, height, pixels)
}

/// Decode raw PNG bytes (the registered "PNG" clipboard format).
pub fn decode_png_bytes(data: &[u8]) -> AppResult<CaptureFrame> {
    if data.len() > MAX_CLIPBOARD_BYTES {
        return Err(AppError::Decode(format!(
            "clipboard payload exceeds {} MB cap",
            MAX_CLIPBOARD_BYTES / (1024 * 1024)
        )));
    }

    let image = image::load_from_memory_with_format(data, image::ImageFormat::Png)
        .map_err(|e| AppError::Decode(format!("corrupt PNG in clipboard: {}", e)))?
        .to_rgba8();

    let (width, height) = image.dimensions();
    CaptureFrame::new(width, height, image.into_raw())
}

/// Pick the first dropped file with a supported image extension.
pub fn pick_drop_path(paths: &[PathBuf]) -> Option<&PathBuf> {
    paths.iter().find(|p| {
        p.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let lower = e.to_ascii_lowercase();
                SUPPORTED_DROP_EXTENSIONS.contains(&lower.as_str())
            })
            .unwrap_or(false)
    })
}

/// Decode an image file from disk into an RGBA frame.
pub fn decode_image_file(path: &Path) -> AppResult<CaptureFrame> {
    let image = image::open(path)
        .map_err(|e| AppError::Decode(format!("failed to decode {:?}: {}", path, e)))?
        .to_rgba8();

    let (width, height) = image.dimensions();
    CaptureFrame::new(width, height, image.into_raw())
}

#[cfg(target_os = "windows")]
mod imp {
    use super::*;

    use windows::core::w;
    use windows::Win32::Foundation::{HANDLE, HGLOBAL};
    use windows::Win32::System::DataExchange::{
        CloseClipboard, GetClipboardData, OpenClipboard, RegisterClipboardFormatW,
    };
    use windows::Win32::System::Memory::{GlobalLock, GlobalSize, GlobalUnlock};
    use windows::Win32::UI::Shell::{DragQueryFileW, HDROP};

    /// Holds the clipboard open for the lifetime of one read.
    ///
    /// Construction pins the calling thread: the matching `CloseClipboard`
    /// runs on drop, on the same thread, on every exit path.
    struct ClipboardGuard;

    impl ClipboardGuard {
        fn open() -> AppResult<Self> {
            unsafe {
                OpenClipboard(None).map_err(|_| AppError::ClipboardUnavailable)?;
            }
            Ok(Self)
        }
    }

    impl Drop for ClipboardGuard {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseClipboard();
            }
        }
    }

    /// Copy one clipboard format's bytes out of its HGLOBAL, if present.
    fn format_bytes(format: u32) -> Option<Vec<u8>> {
        unsafe {
            let handle = GetClipboardData(format).ok()?;
            let hglobal = HGLOBAL(handle.0);
            let ptr = GlobalLock(hglobal);
            if ptr.is_null() {
                return None;
            }
            let size = GlobalSize(hglobal);
            let bytes = std::slice::from_raw_parts(ptr as *const u8, size).to_vec();
            let _ = GlobalUnlock(hglobal);
            Some(bytes)
        }
    }

    /// Enumerate the file paths behind a CF_HDROP handle.
    fn drop_paths(handle: HANDLE) -> Vec<PathBuf> {
        let hdrop = HDROP(handle.0);
        let mut paths = Vec::new();
        unsafe {
            let count = DragQueryFileW(hdrop, u32::MAX, None);
            for index in 0..count {
                let len = DragQueryFileW(hdrop, index, None);
                if len == 0 {
                    continue;
                }
                let mut buffer = vec![0u16; len as usize + 1];
                let copied = DragQueryFileW(hdrop, index, Some(&mut buffer));
                if copied > 0 {
                    paths.push(PathBuf::from(String::from_utf16_lossy(
                        &buffer[..copied as usize],
                    )));
                }
            }
        }
        paths
    }

    /// Read an image from the clipboard, trying formats in priority order.
    pub fn read_clipboard_image() -> AppResult<CaptureFrame> {
        let _guard = ClipboardGuard::open()?;

        let png_format = unsafe { RegisterClipboardFormatW(w!("PNG")) };
        if png_format != 0 {
            if let Some(bytes) = format_bytes(png_format) {
                return decode_png_bytes(&bytes);
            }
        }

        for format in [CF_DIBV5, CF_DIB] {
            if let Some(bytes) = format_bytes(format) {
                return decode_dib(&bytes);
            }
        }

        if let Ok(handle) = unsafe { GetClipboardData(CF_HDROP) } {
            let paths = drop_paths(handle);
            if let Some(path) = pick_drop_path(&paths) {
                return decode_image_file(path);
            }
        }

        Err(AppError::NoImageInClipboard)
    }
}

#[cfg(target_os = "windows")]
pub use imp::read_clipboard_image;

#[cfg(not(target_os = "windows"))]
pub fn read_clipboard_image() -> AppResult<CaptureFrame> {
    Err(AppError::Unsupported("Clipboard capture"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a packed DIB from top-down RGBA pixel data.
    ///
    /// `raw_height > 0` writes bottom-up rows (as real producers do),
    /// `raw_height < 0` writes top-down.
    fn make_dib(width: u32, raw_height: i32, bit_count: u16, rgba: &[u8]) -> Vec<u8> {
        let height = raw_height.unsigned_abs();
        let stride = dib_stride(width, bit_count);
        let bpp = bit_count as usize / 8;

        let mut data = vec![0u8; 40];
        data[0..4].copy_from_slice(&40u32.to_le_bytes());
        data[4..8].copy_from_slice(&(width as i32).to_le_bytes());
        data[8..12].copy_from_slice(&raw_height.to_le_bytes());
        data[12..14].copy_from_slice(&1u16.to_le_bytes());
        data[14..16].copy_from_slice(&bit_count.to_le_bytes());
        // biCompression = BI_RGB (0), rest zeroed.

        for storage_row in 0..height as usize {
            let mut row = vec![0u8; stride];
            // Which image row lands in this storage slot.
            let image_row = if raw_height < 0 {
                storage_row
            } else {
                height as usize - 1 - storage_row
            };
            for col in 0..width as usize {
                let px = &rgba[(image_row * width as usize + col) * 4..][..4];
                let out = &mut row[col * bpp..][..bpp];
                out[0] = px[2];
                out[1] = px[1];
                out[2] = px[0];
                if bpp == 4 {
                    out[3] = px[3];
                }
            }
            data.extend_from_slice(&row);
        }

        data
    }

    fn test_pixels(width: u32, height: u32) -> Vec<u8> {
        let mut rgba = Vec::new();
        for row in 0..height {
            for col in 0..width {
                rgba.extend_from_slice(&[
                    (row * 40 + 10) as u8,
                    (col * 50 + 20) as u8,
                    (row + col) as u8,
                    255,
                ]);
            }
        }
        rgba
    }

    #[test]
    fn test_stride_is_dword_aligned() {
        assert_eq!(dib_stride(1, 24), 4);
        assert_eq!(dib_stride(2, 24), 8);
        assert_eq!(dib_stride(3, 24), 12);
        assert_eq!(dib_stride(4, 24), 12);
        assert_eq!(dib_stride(1, 32), 4);
        assert_eq!(dib_stride(5, 32), 20);
    }

    #[test]
    fn test_row_direction_symmetry() {
        // The same image encoded bottom-up and top-down decodes identically.
        let rgba = test_pixels(3, 2);
        let bottom_up = make_dib(3, 2, 32, &rgba);
        let top_down = make_dib(3, -2, 32, &rgba);

        let a = decode_dib(&bottom_up).unwrap();
        let b = decode_dib(&top_down).unwrap();
        assert_eq!(a.pixels, b.pixels);
        assert_eq!(a.pixels, rgba);
    }

    #[test]
    fn test_24_bit_decode_with_row_padding() {
        // Width 3 at 24bpp needs 9 bytes/row padded to 12.
        let rgba = test_pixels(3, 3);
        let dib = make_dib(3, 3, 24, &rgba);

        let frame = decode_dib(&dib).unwrap();
        assert_eq!(frame.width, 3);
        assert_eq!(frame.height, 3);
        assert_eq!(frame.pixels, rgba);
    }

    #[test]
    fn test_alpha_repair() {
        // All-zero alpha comes back fully opaque.
        let mut rgba = test_pixels(2, 2);
        for px in rgba.chunks_exact_mut(4) {
            px[3] = 0;
        }
        let dib = make_dib(2, 2, 32, &rgba);

        let frame = decode_dib(&dib).unwrap();
        assert!(frame.pixels.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_partial_alpha_preserved() {
        // A single non-zero alpha value means the channel is meaningful.
        let mut rgba = test_pixels(2, 2);
        for px in rgba.chunks_exact_mut(4) {
            px[3] = 0;
        }
        rgba[3] = 128;
        let dib = make_dib(2, 2, 32, &rgba);

        let frame = decode_dib(&dib).unwrap();
        assert_eq!(frame.pixels[3], 128);
        assert_eq!(frame.pixels[7], 0);
    }

    #[test]
    fn test_rejects_16_bit() {
        let rgba = test_pixels(2, 2);
        let mut dib = make_dib(2, 2, 32, &rgba);
        dib[14..16].copy_from_slice(&16u16.to_le_bytes());

        let err = decode_dib(&dib).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
        assert!(err.to_string().contains("unsupported bit depth: 16"));
    }

    #[test]
    fn test_rejects_truncated_pixel_data() {
        let rgba = test_pixels(4, 4);
        let mut dib = make_dib(4, 4, 32, &rgba);
        dib.truncate(dib.len() - 20);

        let err = decode_dib(&dib).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_rejects_oversized_payload() {
        // The length check trips before any header parsing or allocation.
        let mut data = make_dib(2, 2, 32, &test_pixels(2, 2));
        data.resize(MAX_CLIPBOARD_BYTES + 1, 0);
        let err = decode_dib(&data).unwrap_err();
        assert!(err.to_string().contains("cap"));
    }

    #[test]
    fn test_rejects_garbage_header() {
        assert!(decode_dib(&[0u8; 10]).is_err());
        let mut data = vec![0u8; 64];
        data[0..4].copy_from_slice(&12u32.to_le_bytes()); // BITMAPCOREHEADER
        assert!(decode_dib(&data).is_err());
    }

    #[test]
    fn test_drop_path_priority() {
        // First supported image wins; non-image files are skipped.
        let paths = vec![
            PathBuf::from("C:\\temp\\notes.txt"),
            PathBuf::from("C:\\temp\\shot.PNG"),
            PathBuf::from("C:\\temp\\photo.jpg"),
        ];
        assert_eq!(
            pick_drop_path(&paths),
            Some(&PathBuf::from("C:\\temp\\shot.PNG"))
        );
    }

    #[test]
    fn test_drop_path_none_supported() {
        let paths = vec![
            PathBuf::from("C:\\temp\\notes.txt"),
            PathBuf::from("C:\\temp\\archive.zip"),
        ];
        assert!(pick_drop_path(&paths).is_none());
    }

    #[test]
    fn test_png_round_trip() {
        let rgba = test_pixels(5, 4);
        let frame = CaptureFrame::new(5, 4, rgba.clone()).unwrap();
        let encoded = frame.encode_png_base64().unwrap();

        use base64::{engine::general_purpose::STANDARD, Engine};
        let bytes = STANDARD.decode(encoded).unwrap();
        let decoded = decode_png_bytes(&bytes).unwrap();
        assert_eq!(decoded.pixels, rgba);
    }

    #[test]
    fn test_corrupt_png_is_decode_error() {
        let err = decode_png_bytes(&[0x89, 0x50, 0x4E, 0x47, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }
}
