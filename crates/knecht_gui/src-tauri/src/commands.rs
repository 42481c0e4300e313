//! Tauri commands for chatting and config load/save.
//! The Tauri `#[command]` wrappers delegate to testable plain functions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use knecht_client::config::{self, BridgeSection, Config, WindowSection};
use knecht_client::{ChatWindow, SessionError, WindowEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const HISTORY_RENDERED: &str = "history-rendered";
pub const REPLY_ANSWERED: &str = "reply-answered";
pub const REPLY_FAILED: &str = "reply-failed";
pub const REPLY_CANCELLED: &str = "reply-cancelled";

// ── Window state (one per application, managed by Tauri) ────────────────

/// Everything the chat window owns. Created at startup, dropped when the app exits.
pub struct GuiState {
    window: ChatWindow,
    config_path: PathBuf,
    // Declared last so it is dropped after the window's tasks are gone.
    _runtime: tokio::runtime::Runtime,
}

impl GuiState {
    /// Build the chat window for `config`; `listener` receives every window event.
    pub fn new(
        config: &Config,
        config_path: PathBuf,
        listener: impl Fn(WindowEvent) + Send + Sync + 'static,
    ) -> Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("knecht-bridge")
            .enable_all()
            .build()
            .map_err(|e| format!("failed to create tokio runtime: {}", e))?;
        let window = ChatWindow::new(
            config.process_bridge(),
            config.render_style(),
            runtime.handle().clone(),
            listener,
        );
        Ok(Self {
            window,
            config_path,
            _runtime: runtime,
        })
    }

    pub fn window(&self) -> &ChatWindow {
        &self.window
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Map a window event to the frontend event name and JSON payload.
pub fn ui_event(event: &WindowEvent) -> (&'static str, serde_json::Value) {
    match event {
        WindowEvent::Rendered(html) => (HISTORY_RENDERED, json!(html)),
        WindowEvent::Answered { entry } => (REPLY_ANSWERED, json!({ "entry": entry })),
        WindowEvent::Failed { entry, reason } => {
            (REPLY_FAILED, json!({ "entry": entry, "reason": reason }))
        }
        WindowEvent::Cancelled { entry } => (REPLY_CANCELLED, json!({ "entry": entry })),
    }
}

/// Resolve config path from optional override, env, or default.
pub fn resolve_config_path(override_path: Option<&str>) -> Result<PathBuf, String> {
    if let Some(p) = override_path {
        return Ok(PathBuf::from(p));
    }
    if let Ok(val) = std::env::var("KNECHT_CONFIG") {
        return Ok(PathBuf::from(val));
    }
    config::default_config_path().ok_or_else(|| "Cannot determine config path".into())
}

// ── Chat ────────────────────────────────────────────────────────────────

/// Result of a submit action returned to the frontend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitReply {
    /// `false` when the input was blank and nothing happened.
    pub accepted: bool,
    /// History index of the new entry.
    pub entry: Option<usize>,
}

/// Submit `input`. Markup for both the pending entry and the answer arrives only
/// as `history-rendered` events, in the order the window produced it.
pub fn do_submit(state: &GuiState, input: &str) -> Result<SubmitReply, String> {
    let entry = state.window.submit(input).map_err(|e| match e {
        SessionError::Busy => "Please wait for the current answer".to_string(),
        other => other.to_string(),
    })?;
    Ok(SubmitReply {
        accepted: entry.is_some(),
        entry,
    })
}

/// Cancel the pending answer. Returns `false` when nothing was pending.
pub fn do_cancel(state: &GuiState) -> bool {
    state.window.cancel()
}

pub fn do_render(state: &GuiState) -> String {
    state.window.render()
}

// ── Config form ─────────────────────────────────────────────────────────

/// JSON-friendly config form values sent to/from the frontend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigForm {
    pub interpreter: String,
    pub script: String,
    pub args: Vec<String>,
    pub default_input: String,
    pub working_dir: String,
    /// 0 means no timeout.
    pub timeout_secs: u64,
    pub env: BTreeMap<String, String>,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub question_label: String,
    pub answer_label: String,
}

impl Default for ConfigForm {
    fn default() -> Self {
        Self::from(Config::default())
    }
}

impl From<Config> for ConfigForm {
    fn from(c: Config) -> Self {
        let (width, height) = c.window_size();
        let style = c.render_style();
        Self {
            title: c.window_title().to_string(),
            width,
            height,
            question_label: style.question_label,
            answer_label: style.answer_label,
            interpreter: c
                .bridge
                .interpreter
                .unwrap_or_else(|| config::DEFAULT_INTERPRETER.into()),
            script: c
                .bridge
                .script
                .unwrap_or_else(|| config::DEFAULT_SCRIPT.into()),
            args: c.bridge.args,
            default_input: c
                .bridge
                .default_input
                .unwrap_or_else(|| config::DEFAULT_INPUT.into()),
            working_dir: c
                .bridge
                .working_dir
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            timeout_secs: c.bridge.timeout_secs.unwrap_or(0),
            env: c.bridge.env,
        }
    }
}

impl From<ConfigForm> for Config {
    fn from(f: ConfigForm) -> Self {
        Config {
            bridge: BridgeSection {
                interpreter: Some(f.interpreter),
                script: Some(f.script),
                args: f.args,
                default_input: Some(f.default_input),
                working_dir: (!f.working_dir.is_empty()).then(|| PathBuf::from(f.working_dir)),
                timeout_secs: (f.timeout_secs > 0).then_some(f.timeout_secs),
                env: f.env,
            },
            window: WindowSection {
                title: Some(f.title),
                width: Some(f.width),
                height: Some(f.height),
                question_label: Some(f.question_label),
                answer_label: Some(f.answer_label),
            },
        }
    }
}

/// Load config from `path` and return form values.
pub fn do_load_config(path: &str) -> Result<ConfigForm, String> {
    let cfg = config::load(Path::new(path)).map_err(|e| e.to_string())?;
    Ok(ConfigForm::from(cfg))
}

/// Save form values to `path` as YAML. Creates parent dirs if needed.
pub fn do_save_config(path: &str, form: &ConfigForm) -> Result<(), String> {
    let cfg: Config = form.clone().into();
    config::save(Path::new(path), &cfg).map_err(|e| e.to_string())
}

// ── Tauri command wrappers ──────────────────────────────────────────────

#[tauri::command]
pub fn submit_question(
    state: tauri::State<'_, GuiState>,
    input: String,
) -> Result<SubmitReply, String> {
    do_submit(&state, &input)
}

#[tauri::command]
pub fn cancel_question(state: tauri::State<'_, GuiState>) -> bool {
    do_cancel(&state)
}

#[tauri::command]
pub fn render_history(state: tauri::State<'_, GuiState>) -> String {
    do_render(&state)
}

#[tauri::command]
pub fn get_config_path(state: tauri::State<'_, GuiState>) -> Result<String, String> {
    state
        .config_path()
        .to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| "Config path is not valid UTF-8".into())
}

#[tauri::command]
pub fn load_config(path: String) -> Result<ConfigForm, String> {
    do_load_config(&path)
}

#[tauri::command]
pub fn save_config(path: String, form: ConfigForm) -> Result<(), String> {
    do_save_config(&path, &form)
}
