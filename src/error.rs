//! Central error types for QuickShot.
//!
//! This module provides typed errors for the native core. All errors
//! implement `Serialize` so they cross the Tauri IPC boundary as strings the
//! editor can show in a transient status message.

use serde::Serialize;
use thiserror::Error;

/// Main error type for QuickShot operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// A Win32 API returned failure. Carries the API name and OS error code.
    #[error("{api} failed (os error {code})")]
    Platform { api: &'static str, code: u32 },

    /// The clipboard could not be opened (typically held by another process).
    #[error("Clipboard unavailable")]
    ClipboardUnavailable,

    /// The clipboard opened fine but held no acceptable image format.
    /// Distinct from [`AppError::ClipboardUnavailable`] so the editor can
    /// show "no image" instead of "clipboard busy".
    #[error("No image in clipboard")]
    NoImageInClipboard,

    /// Malformed DIB, corrupt image data, or oversized payload.
    /// The message names which validation tripped.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A library open/delete request resolved outside the library folder.
    #[error("Access denied: path is outside the library folder")]
    PathEscape,

    /// A user-provided hotkey string could not be parsed. Non-fatal: the
    /// binding is logged and skipped.
    #[error("Invalid hotkey: {0}")]
    HotkeyParse(String),

    /// The selection overlay is already showing.
    #[error("A region selection is already in progress")]
    OverlayBusy,

    /// Display not found by index.
    #[error("Display not found at index {index}")]
    DisplayNotFound { index: usize },

    /// Window not found by handle.
    #[error("Window not found with handle {handle}")]
    WindowNotFound { handle: isize },

    /// Native capture requires Windows.
    #[error("{0} is only available on Windows")]
    Unsupported(&'static str),

    /// Filesystem operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image processing error.
    #[error("Image error: {0}")]
    Image(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a [`AppError::Platform`] from the calling thread's last OS error.
    #[cfg(target_os = "windows")]
    pub fn win32(api: &'static str) -> Self {
        let code = unsafe { windows::Win32::Foundation::GetLastError().0 };
        AppError::Platform { api, code }
    }
}

/// Implement Serialize for Tauri IPC compatibility.
/// Tauri requires errors to be serializable to send to the frontend.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Image(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

/// Type alias for Results using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_display() {
        let err = AppError::Platform {
            api: "BitBlt",
            code: 6,
        };
        assert_eq!(err.to_string(), "BitBlt failed (os error 6)");
    }

    #[test]
    fn test_error_serialization() {
        let err = AppError::NoImageInClipboard;
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("No image in clipboard"));
    }

    #[test]
    fn test_clipboard_errors_are_distinct() {
        // The editor shows different messages for these two.
        assert_ne!(
            AppError::NoImageInClipboard.to_string(),
            AppError::ClipboardUnavailable.to_string()
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AppError = io_err.into();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[test]
    fn test_decode_names_the_validation() {
        let err = AppError::Decode("unsupported bit depth: 16".to_string());
        assert!(err.to_string().contains("unsupported bit depth"));
    }
}
