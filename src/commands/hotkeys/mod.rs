//! Global hotkey broker.
//!
//! `RegisterHotKey` binds each registration to the *calling thread*, and the
//! matching `WM_HOTKEY` messages are only delivered through that thread's
//! message queue. The broker therefore owns one OS thread for its whole
//! lifetime and performs every registration itself:
//!
//! - Registrations arriving before the pump starts are buffered; the pump
//!   drains them first thing.
//! - Registrations arriving afterwards travel over a bounded command channel
//!   and block the caller until the pump replies with the outcome.
//! - The pump alternates `PeekMessageW` with channel draining; a 10 ms sleep
//!   bounds idle CPU. Shutdown unregisters everything before the thread exits.
//!
//! The press callback runs on the pump thread and must not call back into
//! the broker: a re-entrant register/unregister would deadlock on its own
//! reply channel.

pub mod keys;

use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde::Serialize;
use tauri::command;

use crate::config;
use crate::error::{AppError, AppResult};

use keys::KeyCombo;

/// Reserved binding ids. Small, non-zero, unique per active registration.
pub const HOTKEY_FULLSCREEN: i32 = 1;
pub const HOTKEY_REGION: i32 = 2;
pub const HOTKEY_WINDOW: i32 = 3;

/// Event names on the IPC bridge. Stable strings; the editor subscribes by
/// name and marshals to its UI thread.
pub const EVENT_HOTKEY_FULLSCREEN: &str = "hotkey:fullscreen";
pub const EVENT_HOTKEY_REGION: &str = "hotkey:region";
pub const EVENT_HOTKEY_WINDOW: &str = "hotkey:window";

/// How long a caller waits for the pump to acknowledge a command.
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Pump idle sleep; also the worst-case latency for channel commands.
const PUMP_IDLE_SLEEP: Duration = Duration::from_millis(10);

type HotkeyCallback = Box<dyn Fn(i32) + Send + 'static>;

enum BrokerCommand {
    Register {
        id: i32,
        combo: KeyCombo,
        reply: Sender<AppResult<KeyCombo>>,
    },
    Unregister {
        id: i32,
        reply: Sender<()>,
    },
    UnregisterAll {
        reply: Sender<()>,
    },
    Stop,
}

struct BrokerInner {
    tx: Option<Sender<BrokerCommand>>,
    /// Registrations requested before the pump thread exists.
    buffered: Vec<(i32, KeyCombo)>,
}

/// Handle to the broker's owner thread.
pub struct HotkeyBroker {
    inner: Mutex<BrokerInner>,
}

lazy_static! {
    pub static ref BROKER: HotkeyBroker = HotkeyBroker {
        inner: Mutex::new(BrokerInner {
            tx: None,
            buffered: Vec::new(),
        }),
    };
}

impl HotkeyBroker {
    /// Spawn the owner thread and begin delivering presses to `callback`.
    /// Idempotent: a second call is ignored.
    pub fn start(&self, callback: HotkeyCallback) {
        #[cfg(target_os = "windows")]
        {
            let mut inner = self.inner.lock();
            if inner.tx.is_some() {
                return;
            }

            let (tx, rx) = bounded::<BrokerCommand>(32);
            let buffered = std::mem::take(&mut inner.buffered);
            inner.tx = Some(tx);

            std::thread::Builder::new()
                .name("hotkey-broker".to_string())
                .spawn(move || pump::run(rx, buffered, callback))
                .expect("failed to spawn hotkey broker thread");
        }

        #[cfg(not(target_os = "windows"))]
        {
            let _ = callback;
            log::warn!("[HOTKEY] Global hotkeys are only available on Windows");
        }
    }

    /// Register `combo` under `id`, replacing any previous registration with
    /// the same id. Returns the combo actually registered (the Alt fallback
    /// may differ from the request). Blocks until the pump replies.
    pub fn register(&self, id: i32, combo: KeyCombo) -> AppResult<KeyCombo> {
        let tx = {
            let mut inner = self.inner.lock();
            match inner.tx.clone() {
                Some(tx) => tx,
                None => {
                    // Not started yet: buffer, outcome is logged at start.
                    inner.buffered.retain(|(existing, _)| *existing != id);
                    inner.buffered.push((id, combo));
                    return Ok(combo);
                }
            }
        };

        let (reply, result) = bounded(1);
        tx.send(BrokerCommand::Register { id, combo, reply })
            .map_err(|_| AppError::Other("hotkey broker is gone".to_string()))?;
        result
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|_| AppError::Other("hotkey broker did not reply".to_string()))?
    }

    /// Remove one registration. Blocks until the pump confirms.
    pub fn unregister(&self, id: i32) -> AppResult<()> {
        self.simple_command(|reply| BrokerCommand::Unregister { id, reply })
    }

    /// Remove every registration. Blocks until the pump confirms.
    pub fn unregister_all(&self) -> AppResult<()> {
        self.simple_command(|reply| BrokerCommand::UnregisterAll { reply })
    }

    /// Stop the pump thread. All hotkeys are unregistered before it exits.
    pub fn shutdown(&self) {
        let tx = self.inner.lock().tx.take();
        if let Some(tx) = tx {
            let _ = tx.send(BrokerCommand::Stop);
        }
    }

    fn simple_command(
        &self,
        build: impl FnOnce(Sender<()>) -> BrokerCommand,
    ) -> AppResult<()> {
        let tx = {
            let inner = self.inner.lock();
            inner.tx.clone()
        };
        let tx = match tx {
            Some(tx) => tx,
            None => return Ok(()),
        };

        let (reply, done) = bounded(1);
        tx.send(build(reply))
            .map_err(|_| AppError::Other("hotkey broker is gone".to_string()))?;
        done.recv_timeout(REPLY_TIMEOUT)
            .map_err(|_| AppError::Other("hotkey broker did not reply".to_string()))
    }
}

#[cfg(target_os = "windows")]
mod pump {
    use super::*;

    use std::collections::HashMap;

    use crossbeam_channel::Receiver;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_NOREPEAT,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE, WM_HOTKEY,
    };

    /// Register against the thread's message queue (no window needed);
    /// WM_HOTKEY lands in this thread's queue because we are the registrant.
    fn register_on_pump(
        registered: &mut HashMap<i32, KeyCombo>,
        id: i32,
        combo: KeyCombo,
    ) -> AppResult<KeyCombo> {
        if registered.remove(&id).is_some() {
            unsafe {
                let _ = UnregisterHotKey(HWND::default(), id);
            }
        }

        // A null hwnd binds the hotkey to this thread's message queue.
        let attempt = |c: KeyCombo| unsafe {
            RegisterHotKey(
                HWND::default(),
                id,
                HOT_KEY_MODIFIERS(c.modifiers | MOD_NOREPEAT.0),
                c.key,
            )
        };

        let effective = if attempt(combo).is_ok() {
            combo
        } else if combo.is_bare_printscreen() {
            // Some desktops pre-claim bare PrintScreen; Alt+PrintScreen is
            // the documented fallback.
            let fallback = combo.with_alt();
            if attempt(fallback).is_err() {
                return Err(AppError::win32("RegisterHotKey"));
            }
            log::warn!(
                "[HOTKEY] {} unavailable, registered {} instead",
                keys::format(combo),
                keys::format(fallback)
            );
            fallback
        } else {
            return Err(AppError::win32("RegisterHotKey"));
        };

        registered.insert(id, effective);
        Ok(effective)
    }

    fn unregister_on_pump(registered: &mut HashMap<i32, KeyCombo>, id: i32) {
        if registered.remove(&id).is_some() {
            unsafe {
                let _ = UnregisterHotKey(HWND::default(), id);
            }
        }
    }

    pub fn run(
        rx: Receiver<BrokerCommand>,
        buffered: Vec<(i32, KeyCombo)>,
        callback: HotkeyCallback,
    ) {
        let mut registered: HashMap<i32, KeyCombo> = HashMap::new();

        for (id, combo) in buffered {
            match register_on_pump(&mut registered, id, combo) {
                Ok(effective) => {
                    log::info!("[HOTKEY] Registered {} (id {})", keys::format(effective), id)
                }
                Err(e) => log::warn!(
                    "[HOTKEY] Could not register {} (id {}): {}",
                    keys::format(combo),
                    id,
                    e
                ),
            }
        }

        let mut msg = MSG::default();
        'pump: loop {
            unsafe {
                while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                    if msg.message == WM_HOTKEY {
                        callback(msg.wParam.0 as i32);
                    }
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }

            while let Ok(cmd) = rx.try_recv() {
                match cmd {
                    BrokerCommand::Register { id, combo, reply } => {
                        let _ = reply.send(register_on_pump(&mut registered, id, combo));
                    }
                    BrokerCommand::Unregister { id, reply } => {
                        unregister_on_pump(&mut registered, id);
                        let _ = reply.send(());
                    }
                    BrokerCommand::UnregisterAll { reply } => {
                        let ids: Vec<i32> = registered.keys().copied().collect();
                        for id in ids {
                            unregister_on_pump(&mut registered, id);
                        }
                        let _ = reply.send(());
                    }
                    BrokerCommand::Stop => break 'pump,
                }
            }

            std::thread::sleep(PUMP_IDLE_SLEEP);
        }

        for id in registered.keys() {
            unsafe {
                let _ = UnregisterHotKey(HWND::default(), *id);
            }
        }
        log::info!("[HOTKEY] Broker stopped");
    }
}

// ============================================================================
// Binding application
// ============================================================================

/// Outcome of applying one configured binding.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveBinding {
    pub action: String,
    pub requested: String,
    /// Canonical string of the registered combo; `None` when parsing or
    /// registration failed (logged, never fatal).
    pub effective: Option<String>,
}

/// Parse and register the three configured bindings, returning what actually
/// took effect so the front-end can display real key combos.
pub fn apply_bindings(settings: &config::HotkeySettings) -> Vec<EffectiveBinding> {
    let _ = BROKER.unregister_all();

    let requested = [
        ("fullscreen", HOTKEY_FULLSCREEN, settings.fullscreen.as_str()),
        ("region", HOTKEY_REGION, settings.region.as_str()),
        ("window", HOTKEY_WINDOW, settings.window.as_str()),
    ];

    requested
        .into_iter()
        .map(|(action, id, combo_str)| {
            let effective = match keys::parse(combo_str) {
                Ok(combo) => match BROKER.register(id, combo) {
                    Ok(registered) => Some(keys::format(registered)),
                    Err(e) => {
                        log::warn!("[HOTKEY] {} binding {:?} failed: {}", action, combo_str, e);
                        None
                    }
                },
                Err(e) => {
                    log::warn!("[HOTKEY] Skipping {} binding: {}", action, e);
                    None
                }
            };
            EffectiveBinding {
                action: action.to_string(),
                requested: combo_str.to_string(),
                effective,
            }
        })
        .collect()
}

/// Re-apply the hotkey bindings from the current settings.
#[command]
pub async fn register_hotkeys() -> AppResult<Vec<EffectiveBinding>> {
    // Registration blocks on the pump's reply channel; keep it off the
    // async runtime's core threads.
    tokio::task::spawn_blocking(|| apply_bindings(&config::current().hotkeys))
        .await
        .map_err(|e| AppError::Other(format!("hotkey apply failed: {}", e)))
}
