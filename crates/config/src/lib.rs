//! Configuration loading, validation, and management for fsmkit agents.
//!
//! Loads configuration from `./fsmkit.toml` (or `$FSMKIT_CONFIG`) with
//! environment variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `fsmkit.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Marker that ends one model turn. An empty string disables it.
    #[serde(default = "default_stop_word")]
    pub stop_word: Option<String>,

    /// Maximum tokens per model call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Consecutive think-only turns allowed before the run is abandoned
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Ceiling on executed steps per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Which state machine to run
    #[serde(default)]
    pub mode: AgentMode,

    /// How the runtime writes its own entries into memory
    #[serde(default)]
    pub style: ProtocolStyle,

    /// Label words recognised at the start of a model turn
    #[serde(default)]
    pub labels: LabelConfig,
}

fn default_stop_word() -> Option<String> {
    Some("PAUSE".into())
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_iterations() -> u32 {
    20
}

/// The shape of the state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Start → Reasoning ⇄ {Act → Observe, Error} → End
    #[default]
    React,
    /// One reasoning state whose tool result is the final answer
    Direct,
}

/// Delimiter convention for entries the runtime writes itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolStyle {
    /// `Observe: 5`
    #[default]
    Label,
    /// `<state>Observe</state> <content>5</content>`
    Tagged,
}

/// Accepted label words per classification, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_think_labels")]
    pub think: Vec<String>,

    #[serde(default = "default_act_labels")]
    pub act: Vec<String>,

    #[serde(default = "default_end_labels")]
    pub end: Vec<String>,

    /// Characters that terminate a leading label
    #[serde(default = "default_delimiters")]
    pub delimiters: Vec<char>,
}

fn default_think_labels() -> Vec<String> {
    vec!["think".into(), "thought".into(), "reason".into()]
}
fn default_act_labels() -> Vec<String> {
    vec!["act".into(), "action".into()]
}
fn default_end_labels() -> Vec<String> {
    vec!["end".into(), "answer".into(), "final".into()]
}
fn default_delimiters() -> Vec<char> {
    vec![':']
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            think: default_think_labels(),
            act: default_act_labels(),
            end: default_end_labels(),
            delimiters: default_delimiters(),
        }
    }
}

impl LabelConfig {
    /// Human-readable list of the primary labels, e.g. `'Think:', 'Act:', or 'End:'`.
    pub fn expected(&self) -> String {
        let delim = self.delimiters.first().copied().unwrap_or(':');
        let primary: Vec<String> = [&self.think, &self.act, &self.end]
            .iter()
            .filter_map(|set| set.first())
            .map(|label| format!("'{}{delim}'", capitalize(label)))
            .collect();
        match primary.as_slice() {
            [] => String::new(),
            [one] => one.clone(),
            [init @ .., last] => format!("{}, or {last}", init.join(", ")),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl AgentConfig {
    /// Load configuration from the default location with env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;

        // Environment variable overrides (highest priority)
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Path of the configuration file: `$FSMKIT_CONFIG` or `./fsmkit.toml`.
    pub fn config_path() -> PathBuf {
        std::env::var("FSMKIT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("fsmkit.toml"))
    }

    /// Apply `FSMKIT_*` overrides from the given lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(stop) = lookup("FSMKIT_STOP_WORD") {
            self.stop_word = Some(stop);
        }
        if let Some(value) = lookup("FSMKIT_MAX_TOKENS") {
            self.max_tokens = parse_override("FSMKIT_MAX_TOKENS", &value)?;
        }
        if let Some(value) = lookup("FSMKIT_MAX_RETRIES") {
            self.max_retries = parse_override("FSMKIT_MAX_RETRIES", &value)?;
        }
        if let Some(value) = lookup("FSMKIT_MAX_ITERATIONS") {
            self.max_iterations = parse_override("FSMKIT_MAX_ITERATIONS", &value)?;
        }
        self.normalize();
        Ok(())
    }

    fn normalize(&mut self) {
        if self.stop_word.as_deref().is_some_and(|s| s.trim().is_empty()) {
            self.stop_word = None;
        }
        if let Some(stop) = &mut self.stop_word {
            *stop = stop.trim().to_string();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be greater than 0".into(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be greater than 0".into(),
            ));
        }

        let labels = &self.labels;
        if labels.think.is_empty() || labels.act.is_empty() || labels.end.is_empty() {
            return Err(ConfigError::ValidationError(
                "labels.think, labels.act and labels.end must each name at least one label".into(),
            ));
        }

        if labels.delimiters.is_empty() {
            return Err(ConfigError::ValidationError(
                "labels.delimiters must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_override(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key} must be a non-negative integer, got '{value}'"))
    })
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            stop_word: default_stop_word(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            max_iterations: default_max_iterations(),
            mode: AgentMode::default(),
            style: ProtocolStyle::default(),
            labels: LabelConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AgentConfig::default();
        assert_eq!(config.stop_word.as_deref(), Some("PAUSE"));
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.mode, AgentMode::React);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AgentConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AgentConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = AgentConfig {
            max_iterations: 0,
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_label_set_rejected() {
        let mut config = AgentConfig::default();
        config.labels.act.clear();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AgentConfig::load_from(Path::new("/nonexistent/fsmkit.toml")).unwrap();
        assert_eq!(config, AgentConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fsmkit.toml");
        std::fs::write(
            &path,
            r#"
stop_word = ""
max_iterations = 5
mode = "direct"
style = "tagged"

[labels]
think = ["reason"]
"#,
        )
        .unwrap();

        let config = AgentConfig::load_from(&path).unwrap();
        assert_eq!(config.stop_word, None);
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.mode, AgentMode::Direct);
        assert_eq!(config.style, ProtocolStyle::Tagged);
        assert_eq!(config.labels.think, vec!["reason"]);
        // Unspecified label sets keep their defaults
        assert_eq!(config.labels.act, vec!["act", "action"]);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fsmkit.toml");
        std::fs::write(&path, "max_iterations = \"many\"").unwrap();
        let err = AgentConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("FSMKIT_MAX_ITERATIONS", "7"),
            ("FSMKIT_STOP_WORD", " STOP "),
        ]
        .into_iter()
        .collect();

        let mut config = AgentConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.stop_word.as_deref(), Some("STOP"));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn bad_env_override_rejected() {
        let mut config = AgentConfig::default();
        let err = config
            .apply_overrides(|key| (key == "FSMKIT_MAX_RETRIES").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("FSMKIT_MAX_RETRIES"));
    }

    #[test]
    fn expected_labels_read_naturally() {
        let labels = LabelConfig::default();
        assert_eq!(labels.expected(), "'Think:', 'Act:', or 'End:'");
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AgentConfig::default_toml();
        assert!(toml_str.contains("PAUSE"));
        assert!(toml_str.contains("max_iterations = 20"));
    }
}
