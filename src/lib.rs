//! QuickShot native core.
//!
//! The Rust backend of a Windows screenshot utility: pixel acquisition,
//! global hotkeys, the tray icon, the region-selection overlay, and the
//! capture lifecycle. The embedded web editor consumes it through Tauri
//! commands (synchronous request/response) and events (`hotkey:*`,
//! `region:selected`, `tray:library`).

use tauri::Manager;

pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod platform;

use commands::hotkeys::{
    BROKER, EVENT_HOTKEY_FULLSCREEN, EVENT_HOTKEY_REGION, EVENT_HOTKEY_WINDOW, HOTKEY_FULLSCREEN,
    HOTKEY_REGION, HOTKEY_WINDOW,
};
use commands::region_overlay::OVERLAY;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Single instance before anything else initializes. A duplicate start is
    // a graceful exit (code 0), not an error.
    let _instance_guard = match app::single_instance::acquire() {
        Ok(Some(guard)) => Some(guard),
        Ok(None) => {
            println!("QuickShot is already running.");
            return;
        }
        Err(e) => {
            log::warn!("single-instance check failed, continuing: {}", e);
            None
        }
    };

    // Before any window exists, so captures come back at physical resolution.
    platform::declare_dpi_awareness();

    config::load();

    let builder = tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .on_window_event(app::events::handle_window_event)
        .invoke_handler(tauri::generate_handler![
            // Capture commands
            commands::capture::capture_fullscreen,
            commands::capture::capture_display,
            commands::capture::capture_region,
            commands::capture::capture_window,
            commands::capture::get_monitors,
            commands::capture::get_virtual_screen_bounds,
            commands::capture::get_windows,
            commands::capture::read_clipboard_image,
            // Region capture lifecycle
            commands::region_capture::prepare_region_capture,
            commands::region_capture::finish_region_capture,
            commands::region_capture::update_window_size,
            commands::region_capture::minimize_to_tray,
            // Hotkeys
            commands::hotkeys::register_hotkeys,
            // Library storage
            commands::storage::quick_save,
            commands::storage::save_image_as,
            commands::storage::get_capture_list,
            commands::storage::open_in_editor,
            commands::storage::delete_screenshot,
            commands::storage::get_library_folder,
            // Settings
            commands::settings::get_settings,
            commands::settings::set_settings,
            commands::settings::set_launch_on_startup,
            commands::settings::is_launch_on_startup,
            commands::settings::set_tray_tooltip,
            commands::settings::open_path_in_explorer,
            commands::settings::reveal_file_in_explorer,
            // Logging
            commands::logging::write_log,
            commands::logging::write_logs,
            commands::logging::get_log_dir,
            commands::logging::get_recent_logs,
        ])
        .setup(|app| {
            // Initialize logging system first
            if let Err(e) = commands::logging::init_logging(app.handle()) {
                eprintln!("Failed to initialize logging: {}", e);
            }

            // The overlay host registers its window class here. This is the
            // only fatal startup failure: without it region capture is gone.
            OVERLAY.start()?;

            // Tray icon: a failure is logged but the app stays usable
            // through hotkeys and the main window.
            if let Err(e) = app::tray::init(app) {
                log::warn!("tray setup failed: {}", e);
            }

            // Hotkey broker: the press callback runs on the broker thread
            // and only emits events; the editor marshals to its UI thread.
            let handle = app.handle().clone();
            BROKER.start(Box::new(move |id| {
                let event = match id {
                    HOTKEY_FULLSCREEN => EVENT_HOTKEY_FULLSCREEN,
                    HOTKEY_REGION => EVENT_HOTKEY_REGION,
                    HOTKEY_WINDOW => EVENT_HOTKEY_WINDOW,
                    _ => return,
                };
                use tauri::Emitter;
                let _ = handle.emit(event, ());
            }));
            for binding in commands::hotkeys::apply_bindings(&config::current().hotkeys) {
                match binding.effective {
                    Some(effective) => {
                        log::info!("Hotkey {}: {}", binding.action, effective)
                    }
                    None => log::warn!(
                        "Hotkey {} ({:?}) is not active",
                        binding.action,
                        binding.requested
                    ),
                }
            }

            // Keep the Run key pointing at wherever this exe lives now.
            app::startup::sync_on_launch(config::current().startup.launch_on_startup);

            // Restore the last window geometry; start hidden when the user
            // prefers launching into the tray.
            if let Some(window) = app.get_webview_window(commands::region_capture::MAIN_WINDOW) {
                let settings = config::current();
                let _ = window.set_size(tauri::PhysicalSize::new(
                    settings.window.width,
                    settings.window.height,
                ));
                if settings.startup.minimize_to_tray {
                    let _ = window.hide();
                } else {
                    let _ = window.show();
                }
            }

            Ok(())
        });

    let app = builder
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|_app_handle, event| {
        if let tauri::RunEvent::Exit = event {
            // Reverse construction order: hotkeys off the OS first, then the
            // overlay window and its GDI resources.
            BROKER.shutdown();
            OVERLAY.stop();
        }
    });
}
