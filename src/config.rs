use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{DeskGroundError, DeskGroundResult};
use crate::perception::types::{CoordinateMode, Platform, ScreenSize};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "DESKGROUND_CONFIG";
/// Overrides `agent.client_password`.
pub const CLIENT_PASSWORD_ENV: &str = "DESKGROUND_CLIENT_PASSWORD";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub a11y: A11yConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub platform: Platform,
    /// Relative `[0, 1]` coordinates instead of pixels. Read once per engine.
    #[serde(default = "default_true")]
    pub relative_coordinate: bool,
    #[serde(default)]
    pub screen_size: ScreenSize,
    /// Size screenshots are resized to before being attached.
    #[serde(default)]
    pub image_size: ScreenSize,
    /// Number of past turns replayed in each prompt.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    #[serde(default = "default_password")]
    pub client_password: String,
    /// Append every turn to a JSONL transcript under the user data dir.
    #[serde(default)]
    pub save_transcript: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            relative_coordinate: true,
            screen_size: ScreenSize::default(),
            image_size: ScreenSize::default(),
            history_turns: default_history_turns(),
            client_password: default_password(),
            save_transcript: false,
        }
    }
}

impl AgentConfig {
    pub fn coordinate_mode(&self) -> CoordinateMode {
        CoordinateMode::from_relative_flag(self.relative_coordinate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct A11yConfig {
    /// Put the linearized tree into the prompt.
    #[serde(default)]
    pub with_atree: bool,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Keep nameless nodes flagged as images.
    #[serde(default = "default_true")]
    pub check_image: bool,
}

impl Default for A11yConfig {
    fn default() -> Self {
        Self {
            with_atree: false,
            max_items: default_max_items(),
            check_image: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_true")]
    pub with_image: bool,
    /// Capability definitions go into the system message rather than the
    /// observation text.
    #[serde(default = "default_true")]
    pub tool_in_sys_msg: bool,
    #[serde(default = "default_app_info_max")]
    pub app_info_max_chars: usize,
    #[serde(default = "default_result_max")]
    pub result_max_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            with_image: true,
            tool_in_sys_msg: true,
            app_info_max_chars: default_app_info_max(),
            result_max_chars: default_result_max(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_history_turns() -> usize {
    30
}

fn default_password() -> String {
    "password".into()
}

fn default_max_items() -> usize {
    300
}

fn default_app_info_max() -> usize {
    5000
}

fn default_result_max() -> usize {
    2000
}

impl AppConfig {
    /// Parse a TOML document and apply environment overrides.
    pub fn from_toml_str(content: &str) -> DeskGroundResult<Self> {
        let mut config: AppConfig = toml::from_str(content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var(CLIENT_PASSWORD_ENV) {
            if !password.is_empty() {
                tracing::debug!("client password taken from environment");
                self.agent.client_password = password;
            }
        }
    }

    pub fn validate(&self) -> DeskGroundResult<()> {
        for (name, size) in [("screen_size", self.agent.screen_size), ("image_size", self.agent.image_size)] {
            if size.width == 0 || size.height == 0 {
                return Err(DeskGroundError::Config(format!(
                    "agent.{name} must be positive, got [{}, {}]",
                    size.width, size.height
                )));
            }
        }
        if self.a11y.max_items == 0 {
            return Err(DeskGroundError::Config("a11y.max_items must be positive".into()));
        }
        Ok(())
    }
}

fn resolve_config_path() -> DeskGroundResult<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let candidate = PathBuf::from(path);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config path taken from environment");
            return Ok(candidate);
        }
        return Err(DeskGroundError::Config(format!(
            "{CONFIG_PATH_ENV} points to missing file {}",
            candidate.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("deskground").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(candidate);
        }
    }

    Err(DeskGroundError::Config(
        "config.toml not found next to executable, in working directory or in the user config dir".into(),
    ))
}

/// Load `.env`, then the first config file found.
pub fn load_config() -> DeskGroundResult<AppConfig> {
    let _ = dotenvy::dotenv();
    let path = resolve_config_path()?;
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> DeskGroundResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = AppConfig::from_toml_str(&content)?;
    tracing::info!(
        path = %path.display(),
        platform = ?config.agent.platform,
        relative = config.agent.relative_coordinate,
        "config loaded"
    );
    Ok(config)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> DeskGroundResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

pub fn save_config(config: &AppConfig) -> DeskGroundResult<()> {
    let path = resolve_config_path()?;
    save_config_to(config, &path)
}
