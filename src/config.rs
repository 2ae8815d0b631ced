use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent_engine::state::{ParseFallback, RunMode};
use crate::errors::{AgentError, AgentResult};

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable that overrides `backend.openai.api_key`.
pub const API_KEY_ENV: &str = "LUMINE_API_KEY";

/// Everything left as `None` here is asked for interactively at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub actuator: ActuatorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Fixed response, no model. Used to exercise the loop.
    Dummy,
    /// OpenAI-compatible chat completion endpoint (vLLM, Ollama, llama.cpp server...).
    Openai,
    /// The `/predict` + `/health` inference server.
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackendConfig {
    pub kind: Option<BackendKind>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL, e.g. `http://123.45.67.89:8000`.
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Frames wider than this are scaled down before upload.
    #[serde(default = "default_max_width")]
    pub max_width: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
            max_width: default_max_width(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Full chat-completions URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Falls back to the `LUMINE_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Whole-request timeout, streaming included.
    #[serde(default = "default_openai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            stream: false,
            max_width: default_max_width(),
            timeout_secs: default_openai_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Catalog id (`explorer`, `treasure_hunter`, ...) or `custom`.
    pub persona: Option<String>,
    /// Goal used when `persona = "custom"`.
    pub custom_goal: Option<String>,
    pub mode: Option<RunMode>,
    #[serde(default)]
    pub parse_fallback: ParseFallback,
    /// Pause between iterations in describe mode when the model said nothing.
    #[serde(default = "default_describe_interval")]
    pub describe_interval_secs: f64,
    #[serde(default)]
    pub max_iterations: Option<u64>,
    #[serde(default)]
    pub max_duration_minutes: Option<u32>,
    #[serde(default)]
    pub record_history: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            persona: None,
            custom_goal: None,
            mode: None,
            parse_fallback: ParseFallback::default(),
            describe_interval_secs: default_describe_interval(),
            max_iterations: None,
            max_duration_minutes: None,
            record_history: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureConfig {
    /// Index into the monitor list; the primary monitor when unset.
    pub monitor_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActuatorConfig {
    /// Program used for `say` actions. Receives the message as its last argument.
    /// Defaults to `say` (macOS), `espeak` (Linux) or PowerShell speech (Windows).
    pub speech_command: Option<String>,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_openai_timeout_secs() -> u64 {
    60
}

fn default_max_width() -> u32 {
    1024
}

fn default_api_base() -> String {
    "http://localhost:11434/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "qwen2-vl".to_string()
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    128
}

fn default_describe_interval() -> f64 {
    5.0
}

impl OpenAiConfig {
    pub fn resolved_api_key(&self) -> String {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.api_key.clone())
            .unwrap_or_default()
    }
}

fn resolve_config_path() -> AgentResult<Option<PathBuf>> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join(CONFIG_FILE_NAME);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    Ok(None)
}

/// Loads the config from `explicit`, or from the usual locations.
/// A missing file is only an error when the path was given explicitly.
pub fn load_config(explicit: Option<&Path>) -> AgentResult<AppConfig> {
    let path = match explicit {
        Some(p) if p.exists() => p.to_path_buf(),
        Some(p) => {
            return Err(AgentError::Config(format!(
                "config file {} does not exist",
                p.display()
            )))
        }
        None => match resolve_config_path()? {
            Some(p) => p,
            None => {
                tracing::info!("no config.toml found; using defaults");
                return Ok(AppConfig::default());
            }
        },
    };
    let content = std::fs::read_to_string(&path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), backend = ?config.backend.kind, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> AgentResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
