//! Logging: console via `env_logger`, file via a shared sink the frontend
//! writes into too.
//!
//! The webview cannot touch the filesystem, so the editor ships its log
//! lines over IPC and they land in the same file as the backend's startup
//! banner. The sink tracks how many bytes it has written and rolls the live
//! file through numbered slots (`quickshot.log` -> `quickshot.1.log` -> ...)
//! once it passes the size cap, so no directory scan or mtime sort is ever
//! needed.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use lazy_static::lazy_static;
use log::Level;
use parking_lot::Mutex;
use tauri::{command, AppHandle, Manager};

use crate::error::{AppError, AppResult};

/// Roll the live file once it grows past this.
const ROTATE_AT_BYTES: u64 = 5 * 1024 * 1024;

/// Numbered slots kept after rotation; the oldest falls off the end.
const ROTATED_KEPT: u32 = 3;

const LOG_FILE_NAME: &str = "quickshot.log";

lazy_static! {
    static ref SINK: Mutex<Option<LogSink>> = Mutex::new(None);
}

fn rotated_name(index: u32) -> String {
    format!("quickshot.{}.log", index)
}

/// The open log file plus a running byte count, so the rotation decision
/// never needs to stat the file.
struct LogSink {
    dir: PathBuf,
    file: File,
    written: u64,
}

impl LogSink {
    fn open(dir: PathBuf) -> std::io::Result<Self> {
        let path = dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self { dir, file, written })
    }

    /// Shift every numbered slot up by one (dropping the oldest), move the
    /// live file into slot 1, and start a fresh live file.
    fn rotate(&mut self) -> std::io::Result<()> {
        let _ = fs::remove_file(self.dir.join(rotated_name(ROTATED_KEPT)));
        for index in (1..ROTATED_KEPT).rev() {
            let from = self.dir.join(rotated_name(index));
            if from.exists() {
                let _ = fs::rename(&from, self.dir.join(rotated_name(index + 1)));
            }
        }

        let live = self.dir.join(LOG_FILE_NAME);
        let _ = fs::rename(&live, self.dir.join(rotated_name(1)));
        self.file = OpenOptions::new().create(true).append(true).open(&live)?;
        self.written = 0;
        Ok(())
    }

    fn write_line(&mut self, line: &str) {
        if self.written > ROTATE_AT_BYTES {
            if let Err(e) = self.rotate() {
                log::warn!("[LOG] rotation failed, continuing on live file: {}", e);
            }
        }
        if self.file.write_all(line.as_bytes()).is_ok() {
            let _ = self.file.flush();
            self.written += line.len() as u64;
        }
    }
}

/// Open the file sink under the app log directory and write the banner.
/// Console logging (`env_logger`) works regardless of whether this succeeds.
pub fn init_logging(app: &AppHandle) -> AppResult<()> {
    let dir = app
        .path()
        .app_log_dir()
        .map_err(|e| AppError::Other(format!("no app log directory: {}", e)))?;
    fs::create_dir_all(&dir)?;

    let mut sink = LogSink::open(dir)?;
    sink.write_line(&format!(
        "---- QuickShot {} started {} ----\n",
        env!("CARGO_PKG_VERSION"),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    *SINK.lock() = Some(sink);
    Ok(())
}

/// Map a frontend level string onto the `log` crate's levels.
/// Unknown strings degrade to Info rather than being dropped.
fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "warn" | "warning" => Level::Warn,
        "error" => Level::Error,
        _ => Level::Info,
    }
}

fn append(level: Level, source: &str, message: &str) {
    let line = format!(
        "{} [{:5}] {}: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        level,
        source,
        message
    );
    if let Some(sink) = SINK.lock().as_mut() {
        sink.write_line(&line);
    }
}

// ============================================================================
// Tauri Commands
// ============================================================================

/// Write a log message from the frontend. Goes to the file sink and is
/// mirrored onto the backend console logger under the `webview` target.
#[command]
pub fn write_log(level: String, source: String, message: String) {
    let level = parse_level(&level);
    append(level, &source, &message);
    log::log!(target: "webview", level, "{}: {}", source, message);
}

/// Write multiple log messages from the frontend (batch)
#[command]
pub fn write_logs(logs: Vec<(String, String, String)>) {
    for (level, source, message) in logs {
        write_log(level, source, message);
    }
}

/// Get the log directory path
#[command]
pub fn get_log_dir(app: AppHandle) -> AppResult<String> {
    let dir = app
        .path()
        .app_log_dir()
        .map_err(|e| AppError::Other(format!("no app log directory: {}", e)))?;
    Ok(dir.to_string_lossy().to_string())
}

/// Get the last N lines of the live log file for debugging.
#[command]
pub fn get_recent_logs(app: AppHandle, lines: Option<usize>) -> AppResult<String> {
    let dir = app
        .path()
        .app_log_dir()
        .map_err(|e| AppError::Other(format!("no app log directory: {}", e)))?;

    let path = dir.join(LOG_FILE_NAME);
    if !path.exists() {
        return Ok(String::new());
    }

    let content = fs::read_to_string(&path)?;
    let max_lines = lines.unwrap_or(100);
    let recent: Vec<&str> = content.lines().rev().take(max_lines).collect();
    Ok(recent.into_iter().rev().collect::<Vec<_>>().join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "quickshot_log_test_{}_{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::Debug);
        assert_eq!(parse_level("WARN"), Level::Warn);
        assert_eq!(parse_level("warning"), Level::Warn);
        assert_eq!(parse_level("error"), Level::Error);
        // Unknown levels degrade to Info instead of being dropped.
        assert_eq!(parse_level("verbose"), Level::Info);
    }

    #[test]
    fn test_sink_tracks_written_bytes() {
        let dir = scratch_dir("written");
        let mut sink = LogSink::open(dir.clone()).unwrap();
        sink.write_line("hello\n");
        sink.write_line("world\n");
        assert_eq!(sink.written, 12);

        // Reopening picks the count back up from the existing file.
        let reopened = LogSink::open(dir.clone()).unwrap();
        assert_eq!(reopened.written, 12);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rotation_shifts_numbered_slots() {
        let dir = scratch_dir("rotate");
        let mut sink = LogSink::open(dir.clone()).unwrap();

        sink.write_line("first\n");
        sink.rotate().unwrap();
        sink.write_line("second\n");
        sink.rotate().unwrap();

        // Oldest content has moved down the slots; live file is fresh.
        assert_eq!(fs::read_to_string(dir.join(rotated_name(1))).unwrap(), "second\n");
        assert_eq!(fs::read_to_string(dir.join(rotated_name(2))).unwrap(), "first\n");
        assert_eq!(fs::read_to_string(dir.join(LOG_FILE_NAME)).unwrap(), "");
        assert_eq!(sink.written, 0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rotation_drops_the_oldest() {
        let dir = scratch_dir("drop");
        let mut sink = LogSink::open(dir.clone()).unwrap();

        for n in 0..=ROTATED_KEPT {
            sink.write_line(&format!("gen {}\n", n));
            sink.rotate().unwrap();
        }

        // Exactly ROTATED_KEPT numbered files remain; "gen 0" is gone.
        assert_eq!(
            fs::read_to_string(dir.join(rotated_name(ROTATED_KEPT))).unwrap(),
            "gen 1\n"
        );
        assert!(!dir.join(rotated_name(ROTATED_KEPT + 1)).exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
