//! Configuration types for the Kodireba lesson runner.
//!
//! This module provides the configuration structures that control the lesson
//! API connection, editor auto-run behavior, the hint assistant, the sandbox
//! loop guard and the local lesson server.

use std::path::Path;
use std::time::Duration;

use kodireba_sandbox::SandboxOptions;
use serde::{Deserialize, Serialize};

use crate::error::{KodiError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "kodireba.json";

/// Default base URL of the lesson API.
fn default_api_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

/// Default timeout in seconds for a single API request.
const fn default_request_timeout_secs() -> u64 {
    20
}

/// Default path of the local storage file.
fn default_storage_file() -> String {
    ".kodireba/storage.json".to_string()
}

/// Default quiet period before an edit triggers a preview rebuild.
const fn default_debounce_ms() -> u64 {
    600
}

/// Default loop iteration budget per preview run.
const fn default_loop_iteration_limit() -> u64 {
    kodireba_sandbox::DEFAULT_LOOP_ITERATION_LIMIT
}

/// Default lesson catalog served by `kodireba serve`.
fn default_catalog() -> String {
    "lessons.json".to_string()
}

/// Default port for the local lesson server.
const fn default_port() -> u16 {
    3000
}

/// Default value for boolean options that default to true.
const fn default_true() -> bool {
    true
}

/// Main configuration for the Kodireba lesson runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the lesson API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout for a single API request in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Path of the JSON file backing local storage.
    #[serde(default = "default_storage_file")]
    pub storage_file: String,

    /// Editor behavior.
    #[serde(default)]
    pub editor: EditorConfig,

    /// Hint assistant behavior.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Sandbox document options.
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Local lesson server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            storage_file: default_storage_file(),
            editor: EditorConfig::default(),
            assistant: AssistantConfig::default(),
            sandbox: SandboxConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `kodireba.json` in the current directory. If not found,
    /// returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            KodiError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `KodiError::ConfigParseError` if the file exists but contains
    /// invalid JSON.
    ///
    /// Returns `KodiError::ConfigValidationError` if the configuration values
    /// are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(KodiError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| KodiError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `KodiError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(KodiError::config_validation(
                format!("apiBaseUrl must be an http(s) URL, got '{}'", self.api_base_url),
                "Set apiBaseUrl to something like http://127.0.0.1:3000 in your kodireba.json",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(KodiError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Set requestTimeoutSecs to at least 1 second in your kodireba.json",
            ));
        }

        if self.storage_file.trim().is_empty() {
            return Err(KodiError::config_validation(
                "storageFile must not be empty",
                "Provide a valid storageFile path in your kodireba.json",
            ));
        }

        if self.editor.debounce_ms == 0 || self.editor.debounce_ms > 10_000 {
            return Err(KodiError::config_validation(
                "editor.debounceMs must be between 1 and 10000",
                "Set editor.debounceMs to a value like 600 in your kodireba.json",
            ));
        }

        if self.sandbox.loop_iteration_limit == 0 {
            return Err(KodiError::config_validation(
                "sandbox.loopIterationLimit must be greater than 0",
                "Set sandbox.loopIterationLimit to at least 1, or disable sandbox.loopGuard",
            ));
        }

        if self.server.catalog.trim().is_empty() {
            return Err(KodiError::config_validation(
                "server.catalog must not be empty",
                "Provide the path of a lesson catalog in your kodireba.json",
            ));
        }

        Ok(())
    }

    /// Returns the request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Editor behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Rebuild the preview automatically after edits.
    #[serde(default = "default_true")]
    pub auto_run: bool,

    /// Quiet period in milliseconds before an edit triggers a rebuild.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            auto_run: default_true(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl EditorConfig {
    /// Returns the debounce period as a [`Duration`].
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Hint assistant behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    /// Request a hint automatically on the first failed submission.
    #[serde(default = "default_true")]
    pub auto_hint_on_first_failure: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            auto_hint_on_first_failure: default_true(),
        }
    }
}

/// Sandbox document options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxConfig {
    /// Inject the iteration budget into JavaScript loops.
    #[serde(default = "default_true")]
    pub loop_guard: bool,

    /// Iterations allowed per preview run.
    #[serde(default = "default_loop_iteration_limit")]
    pub loop_iteration_limit: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            loop_guard: default_true(),
            loop_iteration_limit: default_loop_iteration_limit(),
        }
    }
}

impl SandboxConfig {
    /// Converts to the options the sandbox builder takes.
    #[must_use]
    pub const fn options(&self) -> SandboxOptions {
        SandboxOptions {
            loop_guard: self.loop_guard,
            loop_iteration_limit: self.loop_iteration_limit,
        }
    }
}

/// Local lesson server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Path of the lesson catalog JSON file.
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            port: default_port(),
        }
    }
}
