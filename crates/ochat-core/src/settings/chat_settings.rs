use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::{DEFAULT_HANDLER_URL, DEFAULT_OLLAMA_URL};

pub const OLLAMA_URL_ENV: &str = "OLLAMA_URL";
pub const BACKEND_MODE_ENV: &str = "OCHAT_BACKEND_MODE";
pub const MODEL_ENV: &str = "OCHAT_MODEL";

/// Which adapter produces the fragments
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// Talk to Ollama directly; requires an explicit connect
    Direct,
    /// Post to a server-side chat route; ready at session start
    #[default]
    RouteHandler,
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "production" => Ok(BackendMode::Direct),
            "route_handler" | "handler" | "development" => Ok(BackendMode::RouteHandler),
            other => Err(format!("unknown backend mode: {}", other)),
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Direct => write!(f, "direct"),
            BackendMode::RouteHandler => write!(f, "route_handler"),
        }
    }
}

/// Where conversations and preferences are kept
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    JsonFiles,
    Sqlite,
    /// Nothing survives the process
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json_files" | "json" | "files" => Ok(StorageKind::JsonFiles),
            "sqlite" => Ok(StorageKind::Sqlite),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("unknown storage kind: {}", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub backend_mode: BackendMode,
    pub ollama_url: String,
    pub handler_url: String,
    /// Model used until the user picks another one
    pub default_model: String,
    pub storage: StorageKind,
    /// Overrides the platform data directory
    pub storage_dir: Option<PathBuf>,
    /// How often other processes' writes are polled for
    pub watch_interval_ms: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            backend_mode: BackendMode::default(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            handler_url: DEFAULT_HANDLER_URL.to_string(),
            default_model: "llama3".to_string(),
            storage: StorageKind::default(),
            storage_dir: None,
            watch_interval_ms: 500,
        }
    }
}

impl ChatSettings {
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(10))
    }

    /// Apply `OLLAMA_URL`, `OCHAT_BACKEND_MODE` and `OCHAT_MODEL` from the
    /// process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Empty values are ignored; an invalid
    /// mode is logged and ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(OLLAMA_URL_ENV) {
            self.ollama_url = url;
        }
        if let Some(mode) = lookup(BACKEND_MODE_ENV) {
            match mode.parse() {
                Ok(mode) => self.backend_mode = mode,
                Err(e) => warn!(error = %e, "Ignoring {}", BACKEND_MODE_ENV),
            }
        }
        if let Some(model) = lookup(MODEL_ENV) {
            self.default_model = model;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = ChatSettings::default();
        assert_eq!(settings.backend_mode, BackendMode::RouteHandler);
        assert_eq!(settings.ollama_url, "http://localhost:11434");
        assert_eq!(settings.storage, StorageKind::JsonFiles);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: ChatSettings =
            serde_json::from_str(r#"{"backend_mode":"direct","storage":"sqlite"}"#).unwrap();

        assert_eq!(settings.backend_mode, BackendMode::Direct);
        assert_eq!(settings.storage, StorageKind::Sqlite);
        assert_eq!(settings.default_model, "llama3");
        assert_eq!(settings.watch_interval_ms, 500);
    }

    #[test]
    fn test_overrides() {
        let settings = ChatSettings::default().with_overrides(env(&[
            ("OLLAMA_URL", "http://gpu-box:11434"),
            ("OCHAT_BACKEND_MODE", "production"),
            ("OCHAT_MODEL", "llava"),
        ]));

        assert_eq!(settings.ollama_url, "http://gpu-box:11434");
        assert_eq!(settings.backend_mode, BackendMode::Direct);
        assert_eq!(settings.default_model, "llava");
    }

    #[test]
    fn test_invalid_or_empty_overrides_are_ignored() {
        let settings = ChatSettings::default().with_overrides(env(&[
            ("OCHAT_BACKEND_MODE", "sideways"),
            ("OCHAT_MODEL", "  "),
        ]));

        assert_eq!(settings, ChatSettings::default());
    }

    #[test]
    fn test_parse_modes_and_storage_kinds() {
        assert_eq!("handler".parse::<BackendMode>(), Ok(BackendMode::RouteHandler));
        assert_eq!("Direct".parse::<BackendMode>(), Ok(BackendMode::Direct));
        assert_eq!("memory".parse::<StorageKind>(), Ok(StorageKind::Memory));
        assert!("cloud".parse::<StorageKind>().is_err());
        assert_eq!(BackendMode::RouteHandler.to_string(), "route_handler");
    }
}
