//! Launch-on-login through the per-user Run key.
//!
//! The stored command is the quoted absolute path of the current executable.
//! Writes are verified by reading the value back; on every launch with the
//! setting enabled the value is re-synchronized against the current
//! executable path, so moving or re-installing the program does not leave a
//! stale (or duplicate) autostart entry behind.

use crate::error::AppResult;

#[cfg(target_os = "windows")]
use crate::error::AppError;

/// Registry value name under the Run key.
const RUN_VALUE_NAME: &str = "QuickShot";

#[cfg(target_os = "windows")]
const RUN_KEY_PATH: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Run";

/// Quote a path for use as a Run-key command. Paths with spaces are split at
/// the first space by the shell otherwise.
pub fn quote_path(path: &str) -> String {
    format!("\"{}\"", path)
}

/// Whether a stored Run-key value needs rewriting for the current exe.
pub fn needs_resync(stored: Option<&str>, current_quoted: &str) -> bool {
    stored != Some(current_quoted)
}

fn current_exe_quoted() -> AppResult<String> {
    let exe = std::env::current_exe()?;
    Ok(quote_path(&exe.to_string_lossy()))
}

#[cfg(target_os = "windows")]
mod imp {
    use super::*;

    use winreg::enums::HKEY_CURRENT_USER;
    use winreg::RegKey;

    fn run_key() -> AppResult<RegKey> {
        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let (key, _) = hkcu
            .create_subkey(RUN_KEY_PATH)
            .map_err(|e| AppError::Other(format!("failed to open Run key: {}", e)))?;
        Ok(key)
    }

    fn stored_value(key: &RegKey) -> Option<String> {
        key.get_value::<String, _>(RUN_VALUE_NAME).ok()
    }

    /// Enable or disable launch-on-login. Writes are verified: a write that
    /// reads back differently is reported as an error instead of silently
    /// leaving a broken entry.
    pub fn set_launch_on_startup(enabled: bool) -> AppResult<()> {
        let key = run_key()?;

        if enabled {
            let command = current_exe_quoted()?;
            key.set_value(RUN_VALUE_NAME, &command)
                .map_err(|e| AppError::Other(format!("failed to write Run key: {}", e)))?;

            match stored_value(&key) {
                Some(readback) if readback == command => {
                    log::info!("[STARTUP] Registered launch-on-login: {}", command);
                    Ok(())
                }
                other => Err(AppError::Other(format!(
                    "Run key verification failed: wrote {:?}, read {:?}",
                    command, other
                ))),
            }
        } else {
            match key.delete_value(RUN_VALUE_NAME) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::Other(format!("failed to delete Run key: {}", e)))
                }
            }
            if stored_value(&key).is_some() {
                return Err(AppError::Other(
                    "Run key verification failed: value still present".to_string(),
                ));
            }
            log::info!("[STARTUP] Removed launch-on-login entry");
            Ok(())
        }
    }

    /// Whether a Run-key entry for us currently exists.
    pub fn is_registered() -> AppResult<bool> {
        Ok(stored_value(&run_key()?).is_some())
    }

    /// Re-point the Run key at the current executable if the user has
    /// launch-on-login enabled and the stored command is stale. Survives the
    /// executable being moved or re-installed to a new location.
    pub fn sync_on_launch(enabled: bool) {
        if !enabled {
            return;
        }
        let key = match run_key() {
            Ok(key) => key,
            Err(e) => {
                log::warn!("[STARTUP] cannot open Run key: {}", e);
                return;
            }
        };
        let current = match current_exe_quoted() {
            Ok(c) => c,
            Err(e) => {
                log::warn!("[STARTUP] cannot resolve current exe: {}", e);
                return;
            }
        };

        let stored = stored_value(&key);
        if needs_resync(stored.as_deref(), &current) {
            log::info!(
                "[STARTUP] Re-syncing Run key: {:?} -> {}",
                stored,
                current
            );
            if let Err(e) = set_launch_on_startup(true) {
                log::warn!("[STARTUP] re-sync failed: {}", e);
            }
        }
    }
}

#[cfg(target_os = "windows")]
pub use imp::{is_registered, set_launch_on_startup, sync_on_launch};

#[cfg(not(target_os = "windows"))]
pub fn set_launch_on_startup(_enabled: bool) -> AppResult<()> {
    Err(crate::error::AppError::Unsupported("Launch on startup"))
}

#[cfg(not(target_os = "windows"))]
pub fn is_registered() -> AppResult<bool> {
    Ok(false)
}

#[cfg(not(target_os = "windows"))]
pub fn sync_on_launch(_enabled: bool) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_path() {
        assert_eq!(
            quote_path(r"C:\Program Files\QuickShot\quickshot.exe"),
            r#""C:\Program Files\QuickShot\quickshot.exe""#
        );
    }

    #[test]
    fn test_needs_resync_after_relocation() {
        // Installed at one path, launched from another: stale entry rewritten.
        let stored = r#""C:\Program Files\X\app.exe""#;
        let current = quote_path(r"D:\Tools\app.exe");
        assert!(needs_resync(Some(stored), &current));
    }

    #[test]
    fn test_no_resync_when_current() {
        let current = quote_path(r"C:\Program Files\X\app.exe");
        assert!(!needs_resync(Some(current.as_str()), &current));
    }

    #[test]
    fn test_resync_when_value_missing() {
        assert!(needs_resync(None, r#""C:\x.exe""#));
    }

    #[test]
    fn test_run_value_name_is_stable() {
        // The value name is the dedup key across versions.
        assert_eq!(RUN_VALUE_NAME, "QuickShot");
    }
}
