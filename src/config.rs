//! Configuration resolution from the environment.
//!
//! The base URL is a fixed constant. The override variables are only
//! recognised so that a warning can be shown; their values are never used.

use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;

/// The only base URL requests are ever sent to.
pub const DEFAULT_BASE_URL: &str = "https://api.gonkagate.com/v1";

pub const API_KEY_VAR: &str = "GONKAGATE_API_KEY";
pub const FALLBACK_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const MODEL_VAR: &str = "GONKAGATE_MODEL";
pub const BASE_URL_OVERRIDE_VARS: [&str; 2] = ["GONKAGATE_BASE_URL", "OPENAI_BASE_URL"];

/// Marker value some templates ship with, treated the same as "unset".
pub const MODEL_PLACEHOLDER: &str = "your_model";

/// Warning shown when a base URL override is attempted.
pub const BASE_URL_OVERRIDE_WARNING: &str =
    "GONKAGATE_BASE_URL and OPENAI_BASE_URL are ignored. Base URL is fixed to https://api.gonkagate.com/v1.";

/// Read-only view of environment variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| (*value).to_string())
    }
}

/// Configuration as read from the environment, before validation.
///
/// Loading never fails; smoke mode only needs this far.
#[derive(Debug, Clone)]
pub struct Settings {
    api_key: Option<SecretString>,
    model: Option<String>,
    base_url: String,
    base_url_override: bool,
}

impl Settings {
    /// Read settings from the given environment.
    pub fn load(env: &impl EnvSource) -> Self {
        let api_key = [API_KEY_VAR, FALLBACK_API_KEY_VAR]
            .iter()
            .find_map(|key| non_blank(env, key))
            .map(SecretString::new);

        let base_url_override = BASE_URL_OVERRIDE_VARS
            .iter()
            .any(|key| non_blank(env, key).is_some());

        Self {
            api_key,
            model: non_blank(env, MODEL_VAR),
            base_url: DEFAULT_BASE_URL.to_string(),
            base_url_override,
        }
    }

    /// Prefer an explicitly requested model over the environment.
    pub fn with_model_override(mut self, model: Option<&str>) -> Self {
        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            self.model = Some(model.to_string());
        }
        self
    }

    /// The warning to show, if a base URL override was attempted.
    pub fn warning(&self) -> Option<&'static str> {
        self.base_url_override.then_some(BASE_URL_OVERRIDE_WARNING)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that everything needed for a request is present.
    pub fn validate(&self) -> Result<Config, Error> {
        let api_key = self.api_key.clone().ok_or(Error::MissingApiKey)?;

        let model = self
            .model
            .as_deref()
            .filter(|model| *model != MODEL_PLACEHOLDER)
            .ok_or(Error::MissingModel)?;

        Ok(Config {
            api_key,
            base_url: self.base_url.clone(),
            model: model.to_string(),
        })
    }
}

/// Validated configuration used for dispatch.
#[derive(Debug, Clone)]
pub struct Config {
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl Config {
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Same configuration with a different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }
}

/// Load and validate settings in one step.
pub fn resolve_configuration(env: &impl EnvSource) -> Result<Config, Error> {
    Settings::load(env).validate()
}

fn non_blank(env: &impl EnvSource, key: &str) -> Option<String> {
    env.var(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_primary_key_wins() {
        let config = resolve_configuration(&env(&[
            (API_KEY_VAR, "gg-key"),
            (FALLBACK_API_KEY_VAR, "sk-key"),
            (MODEL_VAR, "qwen"),
        ]))
        .unwrap();
        assert_eq!(config.api_key(), "gg-key");
        assert_eq!(config.model(), "qwen");
    }

    #[test]
    fn test_blank_primary_falls_back() {
        let config = resolve_configuration(&env(&[
            (API_KEY_VAR, "   "),
            (FALLBACK_API_KEY_VAR, "sk-key"),
            (MODEL_VAR, "qwen"),
        ]))
        .unwrap();
        assert_eq!(config.api_key(), "sk-key");
    }

    #[test]
    fn test_missing_api_key() {
        let result = resolve_configuration(&env(&[(MODEL_VAR, "qwen")]));
        assert!(matches!(result, Err(Error::MissingApiKey)));

        let result = resolve_configuration(&env(&[
            (API_KEY_VAR, ""),
            (FALLBACK_API_KEY_VAR, " "),
            (MODEL_VAR, "qwen"),
        ]));
        assert!(matches!(result, Err(Error::MissingApiKey)));
    }

    #[test]
    fn test_api_key_checked_before_model() {
        let result = resolve_configuration(&env(&[]));
        assert!(matches!(result, Err(Error::MissingApiKey)));
    }

    #[test]
    fn test_missing_or_placeholder_model() {
        for model in ["", "  ", MODEL_PLACEHOLDER] {
            let result = resolve_configuration(&env(&[(API_KEY_VAR, "k"), (MODEL_VAR, model)]));
            assert!(matches!(result, Err(Error::MissingModel)), "model {model:?}");
        }
        let result = resolve_configuration(&env(&[(API_KEY_VAR, "k")]));
        assert!(matches!(result, Err(Error::MissingModel)));
    }

    #[test]
    fn test_base_url_override_is_ignored_with_one_warning() {
        let settings = Settings::load(&env(&[
            (API_KEY_VAR, "k"),
            (MODEL_VAR, "m"),
            ("GONKAGATE_BASE_URL", "http://localhost:1234"),
            ("OPENAI_BASE_URL", "http://localhost:5678"),
        ]));
        assert_eq!(settings.warning(), Some(BASE_URL_OVERRIDE_WARNING));
        let config = settings.validate().unwrap();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_no_warning_without_override() {
        let settings = Settings::load(&env(&[("OPENAI_BASE_URL", "  ")]));
        assert!(settings.warning().is_none());
        assert_eq!(settings.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_model_override_takes_precedence() {
        let settings = Settings::load(&env(&[(API_KEY_VAR, "k"), (MODEL_VAR, "from-env")]))
            .with_model_override(Some(" from-flag "));
        assert_eq!(settings.validate().unwrap().model(), "from-flag");

        let settings = Settings::load(&env(&[(API_KEY_VAR, "k"), (MODEL_VAR, "from-env")]))
            .with_model_override(Some(""));
        assert_eq!(settings.validate().unwrap().model(), "from-env");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = resolve_configuration(&env(&[(API_KEY_VAR, "super-secret"), (MODEL_VAR, "m")]))
            .unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
