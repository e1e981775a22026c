//! Library persistence: saving captures and serving the screenshot library.
//!
//! Everything lives under the configured library folder (default
//! `Pictures/QuickShot`). Open and delete requests are resolved to absolute
//! paths and must land strictly inside that folder; anything else is
//! rejected as a path escape before any filesystem access happens.

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Local};
use serde::Serialize;
use tauri::{command, AppHandle};
use tauri_plugin_dialog::DialogExt;
use tokio::fs as async_fs;

use crate::commands::capture::CaptureResult;
use crate::config::{self, SavePattern};
use crate::error::{AppError, AppResult};

/// File extensions shown in the library listing.
const LIBRARY_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// One entry in the screenshot library, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub file_name: String,
    pub path: String,
    pub size_bytes: u64,
    /// Unix milliseconds of the last modification.
    pub modified_at: i64,
}

// ============================================================================
// Path containment
// ============================================================================

/// Resolve `requested` against the library root and require the result to be
/// a strict descendant of it.
///
/// Canonicalization happens on both sides, so `..` traversal, mixed
/// separators, and symlinks out of the library are all rejected the same
/// way: with a path-escape error, not an I/O error.
pub fn resolve_in_library(root: &Path, requested: &str) -> AppResult<PathBuf> {
    let requested = Path::new(requested);
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };

    let root = root.canonicalize().map_err(|_| AppError::PathEscape)?;
    let resolved = joined.canonicalize().map_err(|_| AppError::PathEscape)?;

    if resolved == root || !resolved.starts_with(&root) {
        return Err(AppError::PathEscape);
    }
    Ok(resolved)
}

// ============================================================================
// Quick-save naming
// ============================================================================

/// Choose a quick-save file name for the configured pattern.
///
/// `exists` reports whether a candidate name is already taken; `now` is
/// injected so naming is deterministic under test.
pub fn quick_save_name(
    pattern: SavePattern,
    now: DateTime<Local>,
    exists: impl Fn(&str) -> bool,
) -> String {
    match pattern {
        SavePattern::Timestamp => format!("screenshot_{}.png", now.timestamp_millis()),
        SavePattern::Date => {
            let base = now.format("screenshot_%Y-%m-%d_%H-%M-%S").to_string();
            let candidate = format!("{}.png", base);
            if !exists(&candidate) {
                return candidate;
            }
            // Same-second collisions get a numeric suffix.
            let mut n = 2;
            loop {
                let candidate = format!("{}_{}.png", base, n);
                if !exists(&candidate) {
                    return candidate;
                }
                n += 1;
            }
        }
        SavePattern::Increment => {
            // First unused index, so deleted files leave reusable gaps.
            let mut n = 1;
            loop {
                let candidate = format!("screenshot_{}.png", n);
                if !exists(&candidate) {
                    return candidate;
                }
                n += 1;
            }
        }
    }
}

fn decode_image_payload(image_data: &str) -> AppResult<Vec<u8>> {
    STANDARD
        .decode(image_data)
        .map_err(|e| AppError::Decode(format!("invalid base64 image payload: {}", e)))
}

// ============================================================================
// Commands
// ============================================================================

/// Save a capture into the library using the configured naming pattern.
/// Returns the absolute path written.
#[command]
pub async fn quick_save(image_data: String) -> AppResult<String> {
    let bytes = decode_image_payload(&image_data)?;
    let folder = config::library_folder()?;

    let pattern = config::current().quick_save.pattern;
    let name = quick_save_name(pattern, Local::now(), |candidate| {
        folder.join(candidate).exists()
    });

    let path = folder.join(name);
    async_fs::write(&path, bytes).await?;
    log::info!("[STORAGE] Quick-saved capture to {:?}", path);
    Ok(path.to_string_lossy().to_string())
}

/// Save a capture through the system save dialog. Returns the chosen path,
/// or `None` when the user dismissed the dialog.
#[command]
pub async fn save_image_as(
    app: AppHandle,
    image_data: String,
    default_name: Option<String>,
) -> AppResult<Option<String>> {
    let bytes = decode_image_payload(&image_data)?;

    let picked = tokio::task::spawn_blocking(move || {
        app.dialog()
            .file()
            .add_filter("PNG image", &["png"])
            .set_file_name(default_name.unwrap_or_else(|| "screenshot.png".to_string()))
            .blocking_save_file()
    })
    .await
    .map_err(|e| AppError::Other(format!("save dialog failed: {}", e)))?;

    let Some(file_path) = picked else {
        return Ok(None);
    };
    let path = file_path
        .into_path()
        .map_err(|e| AppError::Other(format!("unusable dialog path: {}", e)))?;

    async_fs::write(&path, bytes).await?;
    Ok(Some(path.to_string_lossy().to_string()))
}

/// List the library contents, newest first.
#[command]
pub async fn get_capture_list() -> AppResult<Vec<LibraryEntry>> {
    let folder = config::library_folder()?;
    let mut entries = Vec::new();

    let mut dir = async_fs::read_dir(&folder).await?;
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| LIBRARY_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(_) => continue,
        };
        let modified_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        entries.push(LibraryEntry {
            file_name: entry.file_name().to_string_lossy().to_string(),
            path: path.to_string_lossy().to_string(),
            size_bytes: metadata.len(),
            modified_at,
        });
    }

    entries.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
    Ok(entries)
}

/// Load a library image for the editor. The path must resolve inside the
/// library folder; the image is re-encoded to PNG for uniform handling.
#[command]
pub async fn open_in_editor(image_path: String) -> AppResult<CaptureResult> {
    let folder = config::library_folder()?;
    let path = resolve_in_library(&folder, &image_path)?;

    tokio::task::spawn_blocking(move || {
        let frame = crate::commands::capture::clipboard::decode_image_file(&path)?;
        frame.to_result()
    })
    .await
    .map_err(|e| AppError::Other(format!("image load failed: {}", e)))?
}

/// Delete a screenshot from the library. Same containment rule as
/// [`open_in_editor`].
#[command]
pub async fn delete_screenshot(image_path: String) -> AppResult<()> {
    let folder = config::library_folder()?;
    let path = resolve_in_library(&folder, &image_path)?;
    async_fs::remove_file(&path).await?;
    log::info!("[STORAGE] Deleted {:?}", path);
    Ok(())
}

/// The library folder the above commands operate in.
#[command]
pub async fn get_library_folder() -> AppResult<String> {
    Ok(config::library_folder()?.to_string_lossy().to_string())
}
