//! Client configuration and service factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examomatic_core::engine::EngineConfig;
use examomatic_core::session::EvaluationMode;

use crate::http::{HttpQuestionService, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};

/// Top-level examomatic configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamomaticConfig {
    /// Base URL of the question-bank service.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Shuffle questions and options when starting an exam.
    #[serde(default = "default_true")]
    pub shuffle: bool,
    /// `local` or `server`.
    #[serde(default)]
    pub evaluation: EvaluationMode,
}

fn default_server_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_true() -> bool {
    true
}

impl Default for ExamomaticConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_secs: default_timeout(),
            shuffle: true,
            evaluation: EvaluationMode::Local,
        }
    }
}

impl ExamomaticConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            mode: self.evaluation,
            shuffle: self.shuffle,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not scanned again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examomatic.toml` in the current directory
/// 2. `~/.config/examomatic/config.toml`
///
/// `EXAMOMATIC_SERVER_URL` overrides the service URL.
pub fn load_config() -> Result<ExamomaticConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamomaticConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("examomatic.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamomaticConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamomaticConfig::default(),
    };

    if let Ok(url) = std::env::var("EXAMOMATIC_SERVER_URL") {
        config.server_url = url;
    }
    config.server_url = resolve_env_vars(&config.server_url);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examomatic"))
}

/// Create the HTTP service described by `config`.
pub fn create_service(config: &ExamomaticConfig) -> Result<HttpQuestionService> {
    HttpQuestionService::new(&config.server_url, config.request_timeout())
}
