//! Win32 window procedure for the selection overlay.
//!
//! Handles mouse input and cursor management. Per-session state reaches the
//! procedure through the GWLP_USERDATA slot, set right after window creation;
//! everything runs on the overlay host thread, so no locking is involved.

use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{BeginPaint, EndPaint, PAINTSTRUCT};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, ReleaseCapture, SetCapture, VK_ESCAPE, VK_SPACE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DefWindowProcW, GetWindowLongPtrW, LoadCursorW, SetCursor, GWLP_USERDATA, HTCLIENT, IDC_CROSS,
    IDC_SIZEALL, WM_KEYDOWN, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE, WM_PAINT, WM_RBUTTONDOWN,
    WM_SETCURSOR,
};

use super::state::clamp_to_overlay;
use super::types::SelectionResult;
use super::{redraw, OverlayWindowState};

/// Window procedure for the overlay.
///
/// # Safety
/// Win32 callback; the state pointer is only valid on the host thread.
pub unsafe extern "system" fn wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let state_ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *mut OverlayWindowState;

    match msg {
        WM_PAINT => handle_paint(hwnd),
        WM_SETCURSOR => handle_set_cursor(state_ptr, lparam),
        WM_LBUTTONDOWN => handle_mouse_down(state_ptr, hwnd, lparam),
        WM_MOUSEMOVE => handle_mouse_move(state_ptr, hwnd, lparam),
        WM_LBUTTONUP => handle_mouse_up(state_ptr, hwnd),
        WM_KEYDOWN => handle_key_down(state_ptr, wparam),
        WM_RBUTTONDOWN => LRESULT(0), // ignore right-click
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// Validate the paint region; all presentation goes through
/// UpdateLayeredWindow, never WM_PAINT.
fn handle_paint(hwnd: HWND) -> LRESULT {
    unsafe {
        let mut ps = PAINTSTRUCT::default();
        let _hdc = BeginPaint(hwnd, &mut ps);
        let _ = EndPaint(hwnd, &ps);
    }
    LRESULT(0)
}

fn handle_set_cursor(state_ptr: *mut OverlayWindowState, lparam: LPARAM) -> LRESULT {
    unsafe {
        if (lparam.0 as u32 & 0xFFFF) != HTCLIENT as u32 {
            return LRESULT(0);
        }

        // Four-way move cursor while space-translating; crosshair otherwise.
        let mut cursor_id = IDC_CROSS;
        if let Some(state) = state_ptr.as_ref() {
            if let Some(session) = &state.session {
                if session.selection.dragging && session.selection.space_held {
                    cursor_id = IDC_SIZEALL;
                }
            }
        }

        if let Ok(cursor) = LoadCursorW(None, cursor_id) {
            SetCursor(cursor);
            return LRESULT(1);
        }
    }
    LRESULT(0)
}

fn handle_mouse_down(state_ptr: *mut OverlayWindowState, hwnd: HWND, lparam: LPARAM) -> LRESULT {
    unsafe {
        if let Some(state) = state_ptr.as_mut() {
            if let Some(session) = &mut state.session {
                let (x, y) = mouse_coords(lparam);
                let p = clamp_to_overlay(x, y, session.width, session.height);
                session.selection.begin(p);
                SetCapture(hwnd);
                redraw(session, hwnd);
            }
        }
    }
    LRESULT(0)
}

fn handle_mouse_move(state_ptr: *mut OverlayWindowState, hwnd: HWND, lparam: LPARAM) -> LRESULT {
    unsafe {
        if let Some(state) = state_ptr.as_mut() {
            if let Some(session) = &mut state.session {
                if session.selection.dragging {
                    let (x, y) = mouse_coords(lparam);
                    let p = clamp_to_overlay(x, y, session.width, session.height);
                    let space_held = (GetAsyncKeyState(VK_SPACE.0 as i32) as u16 & 0x8000) != 0;
                    session.selection.update(p, space_held);
                    redraw(session, hwnd);
                }
            }
        }
    }
    LRESULT(0)
}

fn handle_mouse_up(state_ptr: *mut OverlayWindowState, hwnd: HWND) -> LRESULT {
    unsafe {
        if let Some(state) = state_ptr.as_mut() {
            if let Some(session) = &mut state.session {
                if session.selection.dragging {
                    let _ = ReleaseCapture();
                    session.selection.dragging = false;

                    let rect = session.selection.rect();
                    if session.selection.is_committable() {
                        session.outcome = Some(SelectionResult::Committed {
                            x: rect.left,
                            y: rect.top,
                            width: rect.width(),
                            height: rect.height(),
                        });
                    } else {
                        // Too small: back to idle, keep the overlay up.
                        session.selection.reset();
                        redraw(session, hwnd);
                    }
                }
            }
        }
    }
    LRESULT(0)
}

fn handle_key_down(state_ptr: *mut OverlayWindowState, wparam: WPARAM) -> LRESULT {
    unsafe {
        if wparam.0 as u32 == VK_ESCAPE.0 as u32 {
            if let Some(state) = state_ptr.as_mut() {
                if let Some(session) = &mut state.session {
                    let _ = ReleaseCapture();
                    session.outcome = Some(SelectionResult::Cancelled);
                }
            }
        }
    }
    LRESULT(0)
}

/// Extract signed client-area mouse coordinates from LPARAM.
fn mouse_coords(lparam: LPARAM) -> (i32, i32) {
    let x = (lparam.0 & 0xFFFF) as i16 as i32;
    let y = ((lparam.0 >> 16) & 0xFFFF) as i16 as i32;
    (x, y)
}
