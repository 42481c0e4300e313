//! Chat client library for an external LLM script (process bridge, history, rendering).
//! Used by the Tauri GUI and the `knecht` CLI.

pub mod bridge;
pub mod config;
pub mod history;
pub mod render;
pub mod session;
pub mod window;

pub use bridge::{BridgeError, ProcessBridge, ProcessResult};
pub use config::{default_config_path, BridgeSection, Config, ConfigError, WindowSection};
pub use history::{ChatEntry, EntryStatus, History};
pub use render::{render_history, RenderStyle};
pub use session::{ChatSession, PendingQuestion, SessionError, SessionState};
pub use window::{ChatWindow, Listener, WindowEvent};

/// Install the global `tracing` subscriber (stderr, `RUST_LOG` or `default_filter`).
/// Later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    });
}
