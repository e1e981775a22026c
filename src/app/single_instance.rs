//! Single-instance guard.
//!
//! A named kernel mutex with a fixed name, stable across versions, so a new
//! build replacing an old one still enforces one process. The second process
//! treats the existing mutex as a graceful exit signal (exit code 0, no
//! dialog), before any other subsystem initializes.

use crate::error::AppResult;

/// Fixed mutex name. Do not version this string.
#[cfg(target_os = "windows")]
const MUTEX_NAME: &str = "Global\\QuickShot_SingleInstance_Mutex";

/// Holds the instance mutex for the process lifetime; released on drop.
pub struct SingleInstanceGuard {
    #[cfg(target_os = "windows")]
    handle: windows::Win32::Foundation::HANDLE,
}

// SAFETY: the mutex handle is process-global and only closed once, on drop.
#[cfg(target_os = "windows")]
unsafe impl Send for SingleInstanceGuard {}
#[cfg(target_os = "windows")]
unsafe impl Sync for SingleInstanceGuard {}

/// Try to become the single instance.
///
/// `Ok(Some(guard))`: we own the mutex, keep the guard alive for the whole
/// run. `Ok(None)`: another instance already owns it; the caller should
/// print a notice and exit with code 0.
pub fn acquire() -> AppResult<Option<SingleInstanceGuard>> {
    #[cfg(target_os = "windows")]
    {
        use windows::core::PCWSTR;
        use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS};
        use windows::Win32::System::Threading::CreateMutexW;

        use crate::error::AppError;

        let name: Vec<u16> = MUTEX_NAME.encode_utf16().chain(std::iter::once(0)).collect();

        unsafe {
            let handle = CreateMutexW(None, true, PCWSTR(name.as_ptr()))
                .map_err(|_| AppError::win32("CreateMutexW"))?;

            if GetLastError() == ERROR_ALREADY_EXISTS {
                let _ = CloseHandle(handle);
                return Ok(None);
            }

            log::info!("[INSTANCE] Single-instance mutex acquired");
            Ok(Some(SingleInstanceGuard { handle }))
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        Ok(Some(SingleInstanceGuard {}))
    }
}

impl Drop for SingleInstanceGuard {
    fn drop(&mut self) {
        #[cfg(target_os = "windows")]
        unsafe {
            let _ = windows::Win32::Foundation::CloseHandle(self.handle);
        }
    }
}
