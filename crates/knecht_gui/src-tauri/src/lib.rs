//! Tauri application library: chat window backed by the knecht process bridge.

pub mod commands;

use commands::{resolve_config_path, ui_event, GuiState};
use tauri::{Emitter, LogicalSize, Manager, RunEvent};

pub fn run() {
    knecht_client::init_tracing("info");

    tauri::Builder::default()
        .setup(|app| {
            let config_path = resolve_config_path(None)?;
            let cfg = knecht_client::config::load_or_default(&config_path)?;
            tracing::info!(path = %config_path.display(), "loaded configuration");

            let handle = app.handle().clone();
            let state = GuiState::new(&cfg, config_path, move |event| {
                let (name, payload) = ui_event(&event);
                if let Err(e) = handle.emit(name, payload) {
                    tracing::warn!(event = name, error = %e, "failed to emit window event");
                }
            })?;
            app.manage(state);

            if let Some(window) = app.get_webview_window("main") {
                let (width, height) = cfg.window_size();
                window.set_title(cfg.window_title())?;
                window.set_size(LogicalSize::new(width as f64, height as f64))?;
            }
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::submit_question,
            commands::cancel_question,
            commands::render_history,
            commands::get_config_path,
            commands::load_config,
            commands::save_config,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let RunEvent::Exit = event {
                // A reply still running when the window closes is abandoned.
                if let Some(state) = app.try_state::<GuiState>() {
                    state.window().cancel();
                }
                tracing::info!("chat window closed");
            }
        });
}
