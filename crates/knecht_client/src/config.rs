//! Client config load/save for `~/.knecht/config.yaml`.
//! Two sections: `bridge.*` (external command) and `window.*` (presentation).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::ProcessBridge;
use crate::render::RenderStyle;

pub const DEFAULT_INTERPRETER: &str = "python";
pub const DEFAULT_SCRIPT: &str = "openaiCaller.py";
pub const DEFAULT_INPUT: &str = "Default input";
pub const DEFAULT_TITLE: &str = "Mein KI-Knecht";
pub const DEFAULT_WINDOW_SIZE: u32 = 600;

/// Bridge section (interpreter, script, args, default_input, working_dir, timeout_secs, env).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BridgeSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Window section (title, size, block labels).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WindowSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_label: Option<String>,
}

/// Full config file.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub window: WindowSection,
}

impl Config {
    /// Build the process bridge, filling unset fields with defaults.
    pub fn process_bridge(&self) -> ProcessBridge {
        let b = &self.bridge;
        let mut bridge = ProcessBridge::new(
            b.interpreter.as_deref().unwrap_or(DEFAULT_INTERPRETER),
            b.script.as_deref().unwrap_or(DEFAULT_SCRIPT),
        )
        .with_args(b.args.iter().cloned())
        .with_default_input(b.default_input.as_deref().unwrap_or(DEFAULT_INPUT))
        .with_envs(b.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(dir) = &b.working_dir {
            bridge = bridge.with_working_dir(dir);
        }
        if let Some(secs) = b.timeout_secs {
            bridge = bridge.with_timeout(Duration::from_secs(secs));
        }
        bridge
    }

    pub fn render_style(&self) -> RenderStyle {
        let mut style = RenderStyle::default();
        if let Some(label) = &self.window.question_label {
            style.question_label = label.clone();
        }
        if let Some(label) = &self.window.answer_label {
            style.answer_label = label.clone();
        }
        style
    }

    pub fn window_title(&self) -> &str {
        self.window.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    /// Window (width, height) in logical pixels.
    pub fn window_size(&self) -> (u32, u32) {
        (
            self.window.width.unwrap_or(DEFAULT_WINDOW_SIZE),
            self.window.height.unwrap_or(DEFAULT_WINDOW_SIZE),
        )
    }
}

/// Returns the default config file path: `~/.knecht/config.yaml` (platform-specific).
pub fn default_config_path() -> Option<PathBuf> {
    let home = home_dir()?;
    Some(home.join(".knecht").join("config.yaml"))
}

#[cfg(unix)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(windows)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE").map(PathBuf::from)
}

#[cfg(not(any(unix, windows)))]
fn home_dir() -> Option<PathBuf> {
    None
}

/// Load config from a YAML file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Load config if the file exists, otherwise return built-in defaults.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        load(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

/// Save config to a YAML file. Creates parent directory if missing.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
    }
    let contents = serde_yaml::to_string(config).map_err(|e| ConfigError::Parse(e.to_string()))?;
    std::fs::write(path, contents).map_err(|e| ConfigError::Io(e.to_string()))
}

/// Config load/save error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("invalid config: {0}")]
    Parse(String),
}
