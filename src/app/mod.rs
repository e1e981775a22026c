//! Application shell and platform integration.
//!
//! - `tray`: notification-area icon, menu, and intents
//! - `events`: window event handlers (size tracking, close-to-tray)
//! - `single_instance`: named-mutex process guard
//! - `startup`: launch-on-login Run-key entry

pub mod events;
pub mod single_instance;
pub mod startup;
pub mod tray;
