//! Pixel composition and presentation for the selection overlay.
//!
//! Each frame is composed directly into a session-lifetime 32-bit top-down
//! DIB in three passes: copy the captured frame, wash everything with
//! half-opaque black, then re-clear the selection rectangle and draw its
//! border, corner handles, and size label. Presentation goes through
//! `UpdateLayeredWindow`; there is no WM_PAINT cycle, so redraws only
//! happen when input arrives.
//!
//! The composition functions are pure byte-buffer transforms (BGRA,
//! premultiplied alpha, all pixels opaque) so they are testable off-screen.

use super::types::{Rect, BORDER_WIDTH, DIM_ALPHA, HANDLE_SIZE};

// ============================================================================
// Composition passes
// ============================================================================

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Pass 1: copy the captured frame (already BGRA, opaque) into the buffer.
pub fn copy_frame(pixels: &mut [u8], frame_bgra: &[u8]) {
    pixels.copy_from_slice(frame_bgra);
}

/// Pass 2: 50%-opaque black wash over the entire buffer. Alpha stays opaque;
/// only the color channels darken.
pub fn dim_all(pixels: &mut [u8]) {
    let keep = (255 - DIM_ALPHA) as u32;
    for px in pixels.chunks_exact_mut(4) {
        px[0] = (px[0] as u32 * keep / 255) as u8;
        px[1] = (px[1] as u32 * keep / 255) as u8;
        px[2] = (px[2] as u32 * keep / 255) as u8;
    }
}

/// Pass 3a: restore the source pixels inside the selection rectangle.
pub fn restore_rect(pixels: &mut [u8], frame_bgra: &[u8], width: u32, height: u32, rect: Rect) {
    let r = rect.clip_to(width, height);
    if r.is_empty() {
        return;
    }

    let row_bytes = width as usize * 4;
    let span = (r.right - r.left) as usize * 4;
    for y in r.top..r.bottom {
        let offset = y as usize * row_bytes + r.left as usize * 4;
        pixels[offset..offset + span].copy_from_slice(&frame_bgra[offset..offset + span]);
    }
}

fn fill_rect(pixels: &mut [u8], width: u32, height: u32, rect: Rect, color: [u8; 4]) {
    let r = rect.clip_to(width, height);
    if r.is_empty() {
        return;
    }

    let row_bytes = width as usize * 4;
    for y in r.top..r.bottom {
        for x in r.left..r.right {
            let offset = y as usize * row_bytes + x as usize * 4;
            pixels[offset..offset + 4].copy_from_slice(&color);
        }
    }
}

/// Pass 3b: 2 px selection border, drawn just inside the rectangle.
pub fn draw_border(pixels: &mut [u8], width: u32, height: u32, rect: Rect) {
    let b = BORDER_WIDTH;
    // Top, bottom, left, right strips.
    fill_rect(pixels, width, height, Rect::new(rect.left, rect.top, rect.right, rect.top + b), WHITE);
    fill_rect(pixels, width, height, Rect::new(rect.left, rect.bottom - b, rect.right, rect.bottom), WHITE);
    fill_rect(pixels, width, height, Rect::new(rect.left, rect.top, rect.left + b, rect.bottom), WHITE);
    fill_rect(pixels, width, height, Rect::new(rect.right - b, rect.top, rect.right, rect.bottom), WHITE);
}

/// Pass 3c: 8 px square handles on all four corners.
pub fn draw_handles(pixels: &mut [u8], width: u32, height: u32, rect: Rect) {
    let h = HANDLE_SIZE / 2;
    for (cx, cy) in [
        (rect.left, rect.top),
        (rect.right, rect.top),
        (rect.left, rect.bottom),
        (rect.right, rect.bottom),
    ] {
        fill_rect(
            pixels,
            width,
            height,
            Rect::new(cx - h, cy - h, cx + h, cy + h),
            WHITE,
        );
    }
}

/// Compose a full overlay frame for the current selection.
///
/// With no selection the result is just the dimmed desktop; with one, the
/// selection shows through undimmed with border, handles, and a "WxH" label.
pub fn compose(
    pixels: &mut [u8],
    frame_bgra: &[u8],
    width: u32,
    height: u32,
    selection: Option<Rect>,
) {
    copy_frame(pixels, frame_bgra);
    dim_all(pixels);

    if let Some(rect) = selection {
        if rect.is_empty() {
            return;
        }
        restore_rect(pixels, frame_bgra, width, height, rect);
        draw_border(pixels, width, height, rect);
        draw_handles(pixels, width, height, rect);

        let label = format!("{}x{}", rect.width(), rect.height());
        let (lx, ly) = label_position(rect, width, height, label_width(&label));
        draw_text(pixels, width, height, lx, ly, &label);
    }
}

// ============================================================================
// Size label (5x7 pixel font, scaled 2x; no GDI text on the alpha surface)
// ============================================================================

const GLYPH_W: i32 = 5;
const GLYPH_H: i32 = 7;
const GLYPH_SCALE: i32 = 2;
const GLYPH_SPACING: i32 = 2;

/// Rows of 5-bit bitmaps, most significant bit leftmost.
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'x' => [0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11],
        _ => return None,
    };
    Some(rows)
}

/// Width in pixels of a rendered label.
pub fn label_width(text: &str) -> i32 {
    let chars = text.chars().count() as i32;
    chars * GLYPH_W * GLYPH_SCALE + (chars - 1).max(0) * GLYPH_SPACING
}

/// Rendered label height.
pub fn label_height() -> i32 {
    GLYPH_H * GLYPH_SCALE
}

/// Place the label just below the selection's bottom-left corner; above it
/// when there is no room below, clamped into the buffer either way.
pub fn label_position(rect: Rect, width: u32, height: u32, text_width: i32) -> (i32, i32) {
    let margin = 6;
    let y = if rect.bottom + margin + label_height() <= height as i32 {
        rect.bottom + margin
    } else {
        (rect.top - margin - label_height()).max(0)
    };
    let x = rect.left.clamp(0, (width as i32 - text_width).max(0));
    (x, y)
}

fn put_pixel(pixels: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let offset = (y as usize * width as usize + x as usize) * 4;
    pixels[offset..offset + 4].copy_from_slice(&color);
}

/// Blit white text with a 1 px black drop shadow at (x, y).
pub fn draw_text(pixels: &mut [u8], width: u32, height: u32, x: i32, y: i32, text: &str) {
    let mut pen_x = x;
    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_W {
                    if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                        continue;
                    }
                    for sy in 0..GLYPH_SCALE {
                        for sx in 0..GLYPH_SCALE {
                            let px = pen_x + col * GLYPH_SCALE + sx;
                            let py = y + row as i32 * GLYPH_SCALE + sy;
                            put_pixel(pixels, width, height, px + 1, py + 1, BLACK);
                            put_pixel(pixels, width, height, px, py, WHITE);
                        }
                    }
                }
            }
        }
        pen_x += GLYPH_W * GLYPH_SCALE + GLYPH_SPACING;
    }
}

// ============================================================================
// Draw context (session-lifetime DIB + memory DC)
// ============================================================================

#[cfg(target_os = "windows")]
mod ctx {
    use windows::Win32::Foundation::{COLORREF, HWND, POINT, SIZE};
    use windows::Win32::Graphics::Gdi::{
        SelectObject, AC_SRC_ALPHA, AC_SRC_OVER, BLENDFUNCTION, HGDIOBJ,
    };
    use windows::Win32::UI::WindowsAndMessaging::{UpdateLayeredWindow, ULW_ALPHA};

    use crate::error::{AppError, AppResult};
    use crate::platform::gdi::{DibSection, MemoryDc, ScreenDc};

    /// One session's drawing surface: a 32-bit top-down DIB bound to a memory
    /// DC, plus direct access to its pixel bits.
    ///
    /// Field order is load-bearing: `dc` drops before `dib`, releasing the
    /// device context before the bitmap it had selected is deleted.
    pub struct DrawContext {
        dc: MemoryDc,
        dib: DibSection,
        old: HGDIOBJ,
        width: u32,
        height: u32,
    }

    impl DrawContext {
        pub fn new(width: u32, height: u32) -> AppResult<Self> {
            let screen = ScreenDc::get()?;
            let dc = MemoryDc::compatible(screen.raw())?;
            let dib = DibSection::new(screen.raw(), width as i32, height as i32)?;
            let old = unsafe { SelectObject(dc.raw(), dib.handle()) };
            Ok(Self {
                dc,
                dib,
                old,
                width,
                height,
            })
        }

        pub fn width(&self) -> u32 {
            self.width
        }

        pub fn height(&self) -> u32 {
            self.height
        }

        /// Run `f` against the BGRA pixel buffer. The closure shape keeps the
        /// raw bits pointer from escaping the bitmap's lifetime.
        pub fn with_pixels<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
            self.dib.with_pixels(f)
        }

        /// Push the buffer to the layered window at screen position (x, y).
        /// This is the only presentation path; no WM_PAINT cycle exists.
        pub fn present(&self, hwnd: HWND, x: i32, y: i32) -> AppResult<()> {
            let screen = ScreenDc::get()?;
            let position = POINT { x, y };
            let size = SIZE {
                cx: self.width as i32,
                cy: self.height as i32,
            };
            let origin = POINT { x: 0, y: 0 };
            let blend = BLENDFUNCTION {
                BlendOp: AC_SRC_OVER as u8,
                BlendFlags: 0,
                SourceConstantAlpha: 255,
                AlphaFormat: AC_SRC_ALPHA as u8,
            };

            unsafe {
                UpdateLayeredWindow(
                    hwnd,
                    screen.raw(),
                    Some(&position),
                    Some(&size),
                    self.dc.raw(),
                    Some(&origin),
                    COLORREF(0),
                    Some(&blend),
                    ULW_ALPHA,
                )
                .map_err(|_| AppError::win32("UpdateLayeredWindow"))
            }
        }
    }

    impl Drop for DrawContext {
        fn drop(&mut self) {
            // Unselect the DIB so the DC never outlives a deleted bitmap.
            unsafe {
                SelectObject(self.dc.raw(), self.old);
            }
        }
    }
}

#[cfg(target_os = "windows")]
pub use ctx::DrawContext;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::region_overlay::types::Rect;

    fn solid_bgra(width: u32, height: u32, bgr: [u8; 3]) -> Vec<u8> {
        let mut buf = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            buf.extend_from_slice(&[bgr[0], bgr[1], bgr[2], 255]);
        }
        buf
    }

    fn pixel(buf: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * width + x) * 4) as usize;
        buf[offset..offset + 4].try_into().unwrap()
    }

    #[test]
    fn test_dim_halves_color_keeps_alpha() {
        let mut buf = solid_bgra(4, 4, [200, 100, 50]);
        dim_all(&mut buf);
        let px = pixel(&buf, 4, 0, 0);
        assert_eq!(px[0], 99); // 200 * 127 / 255
        assert_eq!(px[1], 49);
        assert_eq!(px[2], 24);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_selection_area_is_restored() {
        let frame = solid_bgra(32, 32, [200, 100, 50]);
        let mut buf = frame.clone();
        let rect = Rect::new(8, 8, 24, 24);
        compose(&mut buf, &frame, 32, 32, Some(rect));

        // Outside the selection: dimmed.
        assert_eq!(pixel(&buf, 32, 2, 2)[0], 99);
        // Inside, clear of border and handles: original value.
        assert_eq!(pixel(&buf, 32, 16, 16), [200, 100, 50, 255]);
    }

    #[test]
    fn test_border_drawn_inside_rect() {
        let frame = solid_bgra(32, 32, [10, 10, 10]);
        let mut buf = frame.clone();
        let rect = Rect::new(8, 8, 24, 24);
        compose(&mut buf, &frame, 32, 32, Some(rect));

        // The border's top-left run is white (away from corner handles).
        assert_eq!(pixel(&buf, 32, 16, 8), [255, 255, 255, 255]);
        assert_eq!(pixel(&buf, 32, 16, 9), [255, 255, 255, 255]);
    }

    #[test]
    fn test_handles_at_corners() {
        let frame = solid_bgra(64, 64, [10, 10, 10]);
        let mut buf = frame.clone();
        let rect = Rect::new(16, 16, 48, 48);
        compose(&mut buf, &frame, 64, 64, Some(rect));

        // Handle squares straddle each corner.
        assert_eq!(pixel(&buf, 64, 13, 13), [255, 255, 255, 255]);
        assert_eq!(pixel(&buf, 64, 50, 50), [255, 255, 255, 255]);
        // Past the handle extent: dimmed background.
        assert_eq!(pixel(&buf, 64, 5, 5)[3], 255);
        assert_ne!(pixel(&buf, 64, 5, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn test_no_selection_is_fully_dimmed() {
        let frame = solid_bgra(16, 16, [200, 200, 200]);
        let mut buf = frame.clone();
        compose(&mut buf, &frame, 16, 16, None);
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(pixel(&buf, 16, x, y)[0], 99);
            }
        }
    }

    #[test]
    fn test_selection_clipped_to_buffer() {
        // A rect hanging off the buffer edge must not panic.
        let frame = solid_bgra(16, 16, [50, 50, 50]);
        let mut buf = frame.clone();
        compose(&mut buf, &frame, 16, 16, Some(Rect::new(-10, -10, 40, 40)));
    }

    #[test]
    fn test_text_renders_pixels() {
        let mut buf = solid_bgra(128, 32, [0, 0, 0]);
        draw_text(&mut buf, 128, 32, 2, 2, "640x480");

        let white = buf
            .chunks_exact(4)
            .filter(|px| px[0] == 255 && px[1] == 255 && px[2] == 255)
            .count();
        assert!(white > 50, "expected glyph pixels, got {}", white);
    }

    #[test]
    fn test_label_position_flips_above_when_cramped() {
        let rect = Rect::new(100, 950, 300, 1070);
        let (_, y) = label_position(rect, 1920, 1080, 60);
        assert!(y < rect.top, "label should sit above the selection");

        let roomy = Rect::new(100, 100, 300, 200);
        let (_, y) = label_position(roomy, 1920, 1080, 60);
        assert!(y > roomy.bottom);
    }
}
