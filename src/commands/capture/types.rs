//! Shared types for the capture module.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// A captured image in memory: row-major RGBA at physical resolution.
///
/// Immutable once constructed; `pixels.len() == width * height * 4` always
/// holds, and alpha is 255 for opaque captures.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl CaptureFrame {
    /// Build a frame, validating the buffer against its dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> AppResult<Self> {
        if width == 0 || height == 0 {
            return Err(AppError::Decode(format!(
                "empty frame: {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(AppError::Decode(format!(
                "pixel buffer size mismatch: expected {} bytes, got {}",
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// PNG-encode the frame and wrap it in base64 for the IPC boundary.
    pub fn encode_png_base64(&self) -> AppResult<String> {
        let image = RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| AppError::Image("failed to build image from frame".to_string()))?;

        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .map_err(|e| AppError::Image(e.to_string()))?;

        Ok(STANDARD.encode(buffer.into_inner()))
    }

    /// Encode into the IPC payload shape.
    pub fn to_result(&self) -> AppResult<CaptureResult> {
        Ok(CaptureResult {
            width: self.width,
            height: self.height,
            data: self.encode_png_base64()?,
        })
    }
}

/// Image payload crossing the IPC bridge: `data` is a base64 PNG.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureResult {
    pub width: u32,
    pub height: u32,
    pub data: String,
}

/// Rectangle in virtual-screen coordinates requested by the editor.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct RegionSelection {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A capturable top-level window.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    /// HWND as isize (64-bit safe across the IPC boundary).
    pub handle: isize,
    pub title: String,
    pub app_name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Small base64 PNG preview, present when thumbnails were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_well_formedness() {
        let frame = CaptureFrame::new(2, 3, vec![255u8; 2 * 3 * 4]).unwrap();
        assert_eq!(frame.pixels.len(), 4 * frame.width as usize * frame.height as usize);
    }

    #[test]
    fn test_frame_rejects_short_buffer() {
        let err = CaptureFrame::new(10, 10, vec![0u8; 10]).unwrap_err();
        assert!(err.to_string().contains("size mismatch"));
    }

    #[test]
    fn test_frame_rejects_zero_dimensions() {
        assert!(CaptureFrame::new(0, 5, Vec::new()).is_err());
        assert!(CaptureFrame::new(5, 0, Vec::new()).is_err());
    }

    #[test]
    fn test_encode_produces_decodable_png() {
        let mut pixels = vec![0u8; 4 * 4 * 4];
        // One red pixel at (0, 0).
        pixels[0] = 255;
        pixels[3] = 255;
        let frame = CaptureFrame::new(4, 4, pixels).unwrap();

        let encoded = frame.encode_png_base64().unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 4));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }
}
