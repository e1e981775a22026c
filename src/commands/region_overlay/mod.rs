//! Layered selection overlay.
//!
//! A topmost, non-activating, tool-window popup sized to the virtual screen,
//! drawing the previously captured frame with the unselected area dimmed so
//! the rubber-band selection is visually indistinguishable from the live
//! desktop. Rendered by direct pixel writes into a session-lifetime DIB and
//! presented with `UpdateLayeredWindow`; redraws are driven purely by mouse
//! input, so an idle overlay costs no CPU.
//!
//! # Thread model
//!
//! The host owns one dedicated OS thread for its whole lifetime. The window
//! class is registered and the (initially hidden) window created there at
//! startup; class registration failure is the one fatal startup error,
//! since region capture would be unavailable. Afterwards the thread loops:
//! drain window messages, drain the bounded command channel (`Show`, `Hide`,
//! `Stop`), watch ESC, sleep a few milliseconds.
//!
//! Only one session may exist at a time; a second `show` while one is live
//! fails with `OverlayBusy` and does not perturb the first session.

pub mod render;
pub mod state;
pub mod types;

#[cfg(target_os = "windows")]
mod wndproc;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::commands::capture::CaptureFrame;
use crate::error::{AppError, AppResult};
use crate::platform::monitors::VirtualScreenBounds;

#[cfg(target_os = "windows")]
use state::Selection;
use types::SelectionResult;

/// Track whether a selection session is in progress (prevents concurrent
/// overlays process-wide).
static OVERLAY_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Host pump idle sleep. Bounds both input latency for channel commands and
/// idle CPU.
const PUMP_IDLE_SLEEP_MS: u64 = 5;

enum OverlayCommand {
    Show {
        frame: Arc<CaptureFrame>,
        bounds: VirtualScreenBounds,
        scale: f64,
        result_tx: Sender<SelectionResult>,
    },
    Hide,
    Stop,
}

/// Handle to the overlay host thread.
pub struct OverlayHost {
    tx: Mutex<Option<Sender<OverlayCommand>>>,
}

lazy_static! {
    pub static ref OVERLAY: OverlayHost = OverlayHost {
        tx: Mutex::new(None),
    };
}

impl OverlayHost {
    /// Spawn the host thread, register the window class, and create the
    /// hidden overlay window. Errors here are fatal to startup.
    pub fn start(&self) -> AppResult<()> {
        #[cfg(target_os = "windows")]
        {
            let mut guard = self.tx.lock();
            if guard.is_some() {
                return Ok(());
            }

            let (tx, rx) = bounded::<OverlayCommand>(8);
            let (init_tx, init_rx) = bounded::<AppResult<()>>(1);

            std::thread::Builder::new()
                .name("overlay-host".to_string())
                .spawn(move || host::run(rx, init_tx))
                .map_err(|e| AppError::Other(format!("failed to spawn overlay host: {}", e)))?;

            init_rx
                .recv()
                .map_err(|_| AppError::Other("overlay host died during init".to_string()))??;

            *guard = Some(tx);
            Ok(())
        }

        #[cfg(not(target_os = "windows"))]
        {
            log::warn!("[OVERLAY] Region selection is only available on Windows");
            Ok(())
        }
    }

    /// Begin a selection session over `frame`.
    ///
    /// Returns the one-shot channel that will carry the session's
    /// [`SelectionResult`]. Fails with `OverlayBusy` while a session is live.
    pub fn show(
        &self,
        frame: Arc<CaptureFrame>,
        bounds: VirtualScreenBounds,
        scale: f64,
    ) -> AppResult<Receiver<SelectionResult>> {
        let tx = self
            .tx
            .lock()
            .clone()
            .ok_or(AppError::Unsupported("Region selection"))?;

        if OVERLAY_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(AppError::OverlayBusy);
        }

        let (result_tx, result_rx) = bounded(1);
        if tx
            .send(OverlayCommand::Show {
                frame,
                bounds,
                scale,
                result_tx,
            })
            .is_err()
        {
            OVERLAY_ACTIVE.store(false, Ordering::SeqCst);
            return Err(AppError::Other("overlay host is gone".to_string()));
        }

        Ok(result_rx)
    }

    /// Cancel any live session and hide the window.
    pub fn hide(&self) {
        if let Some(tx) = self.tx.lock().clone() {
            let _ = tx.send(OverlayCommand::Hide);
        }
    }

    /// Stop the host thread and destroy the window.
    pub fn stop(&self) {
        let tx = self.tx.lock().take();
        if let Some(tx) = tx {
            let _ = tx.send(OverlayCommand::Stop);
        }
    }

    /// True while a selection session is in progress.
    pub fn is_active(&self) -> bool {
        OVERLAY_ACTIVE.load(Ordering::SeqCst)
    }
}

/// One in-progress selection session.
#[cfg(target_os = "windows")]
pub(crate) struct ActiveSession {
    /// Source frame converted to BGRA once, so each redraw's first pass is a
    /// straight copy.
    frame_bgra: Vec<u8>,
    pub width: u32,
    pub height: u32,
    origin_x: i32,
    origin_y: i32,
    #[allow(dead_code)]
    scale: f64,
    pub selection: Selection,
    draw: render::DrawContext,
    result_tx: Sender<SelectionResult>,
    /// Set by the window procedure on commit or cancel; the host loop
    /// finishes the session when it appears.
    pub outcome: Option<SelectionResult>,
}

/// Window-procedure-visible state, reached through GWLP_USERDATA.
#[cfg(target_os = "windows")]
pub(crate) struct OverlayWindowState {
    pub session: Option<ActiveSession>,
}

/// Compose the current selection into the session DIB and present it.
#[cfg(target_os = "windows")]
pub(crate) fn redraw(session: &mut ActiveSession, hwnd: windows::Win32::Foundation::HWND) {
    let selection = if session.selection.dragging {
        Some(session.selection.rect())
    } else {
        None
    };

    let (frame, width, height) = (&session.frame_bgra, session.width, session.height);
    session
        .draw
        .with_pixels(|pixels| render::compose(pixels, frame, width, height, selection));

    if let Err(e) = session.draw.present(hwnd, session.origin_x, session.origin_y) {
        log::warn!("[OVERLAY] present failed: {}", e);
    }
}

#[cfg(target_os = "windows")]
mod host {
    use super::*;

    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{GetLastError, HWND};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, ReleaseCapture, VK_ESCAPE};
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DestroyWindow, DispatchMessageW, LoadCursorW, PeekMessageW,
        RegisterClassW, SetForegroundWindow, SetWindowLongPtrW, SetWindowPos, ShowWindow,
        TranslateMessage, CS_HREDRAW, CS_VREDRAW, GWLP_USERDATA, HWND_TOPMOST, IDC_CROSS, MSG,
        PM_REMOVE, SWP_NOACTIVATE, SW_HIDE, SW_SHOWNOACTIVATE, WINDOW_EX_STYLE, WNDCLASSW,
        WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_POPUP,
    };

    use super::types::OVERLAY_CLASS_NAME;

    const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;

    fn register_class(class_name: &[u16]) -> AppResult<()> {
        unsafe {
            let hinstance =
                GetModuleHandleW(None).map_err(|_| AppError::win32("GetModuleHandleW"))?;

            let wc = WNDCLASSW {
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(wndproc::wnd_proc),
                hInstance: hinstance.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                hCursor: LoadCursorW(None, IDC_CROSS)
                    .map_err(|_| AppError::win32("LoadCursorW"))?,
                ..Default::default()
            };

            let atom = RegisterClassW(&wc);
            if atom == 0 && GetLastError().0 != ERROR_CLASS_ALREADY_EXISTS {
                return Err(AppError::win32("RegisterClassW"));
            }
        }
        Ok(())
    }

    fn create_window(class_name: &[u16]) -> AppResult<HWND> {
        unsafe {
            let hinstance =
                GetModuleHandleW(None).map_err(|_| AppError::win32("GetModuleHandleW"))?;

            CreateWindowExW(
                WINDOW_EX_STYLE(
                    WS_EX_LAYERED.0 | WS_EX_TOPMOST.0 | WS_EX_TOOLWINDOW.0 | WS_EX_NOACTIVATE.0,
                ),
                PCWSTR(class_name.as_ptr()),
                PCWSTR::null(),
                WS_POPUP,
                0,
                0,
                0,
                0,
                None,
                None,
                hinstance,
                None,
            )
            .map_err(|_| AppError::win32("CreateWindowExW"))
        }
    }

    /// The exact show ordering matters:
    /// hide any stale frame, build a fresh draw context, reset the selection,
    /// position to the virtual screen, draw once, then show. Showing before
    /// the first draw flashes one frame of empty window; skipping the hide
    /// leaks the previous session's last frame.
    fn begin_session(
        state: &mut OverlayWindowState,
        hwnd: HWND,
        frame: Arc<CaptureFrame>,
        bounds: VirtualScreenBounds,
        scale: f64,
        result_tx: Sender<SelectionResult>,
    ) {
        unsafe {
            let _ = ShowWindow(hwnd, SW_HIDE);
        }

        let draw = match render::DrawContext::new(frame.width, frame.height) {
            Ok(draw) => draw,
            Err(e) => {
                log::error!("[OVERLAY] failed to allocate draw context: {}", e);
                let _ = result_tx.send(SelectionResult::Cancelled);
                OVERLAY_ACTIVE.store(false, Ordering::SeqCst);
                return;
            }
        };

        let mut frame_bgra = frame.pixels.clone();
        for px in frame_bgra.chunks_exact_mut(4) {
            px.swap(0, 2);
            px[3] = 255;
        }

        let mut session = ActiveSession {
            frame_bgra,
            width: frame.width,
            height: frame.height,
            origin_x: bounds.x,
            origin_y: bounds.y,
            scale,
            selection: Selection::default(),
            draw,
            result_tx,
            outcome: None,
        };

        unsafe {
            let _ = SetWindowPos(
                hwnd,
                HWND_TOPMOST,
                bounds.x,
                bounds.y,
                frame.width as i32,
                frame.height as i32,
                SWP_NOACTIVATE,
            );
        }

        redraw(&mut session, hwnd);
        state.session = Some(session);

        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
            // Foreground so ESC reaches us even though we never activate on
            // mouse interaction.
            let _ = SetForegroundWindow(hwnd);
        }
    }

    fn finish_session(state: &mut OverlayWindowState, hwnd: HWND, result: SelectionResult) {
        unsafe {
            let _ = ShowWindow(hwnd, SW_HIDE);
        }
        if let Some(session) = state.session.take() {
            let _ = session.result_tx.send(result);
        }
        OVERLAY_ACTIVE.store(false, Ordering::SeqCst);
    }

    pub fn run(rx: crossbeam_channel::Receiver<OverlayCommand>, init_tx: Sender<AppResult<()>>) {
        let class_name: Vec<u16> = OVERLAY_CLASS_NAME
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        let hwnd = match register_class(&class_name).and_then(|_| create_window(&class_name)) {
            Ok(hwnd) => {
                let _ = init_tx.send(Ok(()));
                hwnd
            }
            Err(e) => {
                let _ = init_tx.send(Err(e));
                return;
            }
        };

        let mut state = Box::new(OverlayWindowState { session: None });
        unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, &mut *state as *mut OverlayWindowState as isize);
        }

        let mut msg = MSG::default();
        let mut esc_was_down = false;

        'pump: loop {
            unsafe {
                while PeekMessageW(&mut msg, hwnd, 0, 0, PM_REMOVE).as_bool() {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }

            // ESC via polling: a non-activating window does not reliably see
            // keyboard messages, the async key state always does.
            if state.session.is_some() {
                let esc_down =
                    unsafe { (GetAsyncKeyState(VK_ESCAPE.0 as i32) as u16 & 0x8000) != 0 };
                if esc_down && !esc_was_down {
                    if let Some(session) = &mut state.session {
                        unsafe {
                            let _ = ReleaseCapture();
                        }
                        session.outcome = Some(SelectionResult::Cancelled);
                    }
                }
                esc_was_down = esc_down;
            } else {
                esc_was_down = false;
            }

            // The window procedure records the outcome; we complete it here
            // so send/hide/flag-clear happen in one place.
            if let Some(outcome) = state.session.as_ref().and_then(|s| s.outcome) {
                finish_session(&mut state, hwnd, outcome);
            }

            while let Ok(cmd) = rx.try_recv() {
                match cmd {
                    OverlayCommand::Show {
                        frame,
                        bounds,
                        scale,
                        result_tx,
                    } => {
                        begin_session(&mut state, hwnd, frame, bounds, scale, result_tx);
                    }
                    OverlayCommand::Hide => {
                        if state.session.is_some() {
                            finish_session(&mut state, hwnd, SelectionResult::Cancelled);
                        }
                    }
                    OverlayCommand::Stop => break 'pump,
                }
            }

            std::thread::sleep(std::time::Duration::from_millis(PUMP_IDLE_SLEEP_MS));
        }

        if state.session.is_some() {
            finish_session(&mut state, hwnd, SelectionResult::Cancelled);
        }
        unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            let _ = DestroyWindow(hwnd);
        }
        log::info!("[OVERLAY] Host stopped");
    }
}
