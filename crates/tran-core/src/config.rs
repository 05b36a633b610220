//! Configuration management for tran.
//!
//! Loads configuration from ${TRAN_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;
use tran_providers::prompt::{PromptStyle, render_system_prompt};
use tran_types::TranslationConfig;
use url::Url;

/// Environment variable that supplies the credential when the file has none.
pub const API_KEY_ENV: &str = "TRAN_API_KEY";

/// Environment variable that overrides the configured base URL.
pub const BASE_URL_ENV: &str = "TRAN_BASE_URL";

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for tran configuration.
    //!
    //! TRAN_HOME resolution order:
    //! 1. TRAN_HOME environment variable (if set)
    //! 2. ~/.config/tran (default)

    use std::path::PathBuf;

    /// Returns the tran home directory.
    pub fn tran_home() -> PathBuf {
        if let Ok(home) = std::env::var("TRAN_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".config").join("tran"),
            |h| h.join(".config").join("tran"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        tran_home().join("config.toml")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API base URL; `/v1` is appended when missing.
    pub api_base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub model: String,
    pub target_language: String,
    pub prompt_style: PromptStyle,
    /// Overrides the preset prompt. `{{ target_language }}` is substituted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    /// Caret-window budget in chars.
    pub max_chars: usize,
    /// Minimum spacing between live replacements.
    pub throttle_ms: u64,
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: Self::DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: Self::DEFAULT_MODEL.to_string(),
            target_language: Self::DEFAULT_TARGET_LANGUAGE.to_string(),
            prompt_style: PromptStyle::default(),
            custom_prompt: None,
            max_chars: Self::DEFAULT_MAX_CHARS,
            throttle_ms: Self::DEFAULT_THROTTLE_MS,
            connect_timeout_secs: Self::DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
    pub const DEFAULT_TARGET_LANGUAGE: &'static str = "English";
    pub const DEFAULT_MAX_CHARS: usize = 500;
    pub const DEFAULT_THROTTLE_MS: u64 = 80;
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

    /// Loads configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default config, refusing to overwrite.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Serialized view for `config show`, with the credential masked.
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if !shown.api_key.is_empty() {
            shown.api_key = "<redacted>".to_string();
        }
        toml::to_string_pretty(&shown).context("Failed to serialize config")
    }

    /// Resolves the wire configuration, applying environment overrides.
    pub fn translation_config(&self) -> Result<TranslationConfig> {
        self.resolve(
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(BASE_URL_ENV).ok(),
        )
    }

    fn resolve(
        &self,
        env_api_key: Option<String>,
        env_base_url: Option<String>,
    ) -> Result<TranslationConfig> {
        let api_key = if self.api_key.trim().is_empty() {
            env_api_key.unwrap_or_default()
        } else {
            self.api_key.clone()
        };
        let base_url = env_base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.api_base_url.clone());

        Ok(TranslationConfig {
            target_language: self.target_language.clone(),
            prompt_template: self.prompt_template(),
            max_chars: self.max_chars,
            model: self.model.clone(),
            endpoint: normalize_base_url(&base_url)?,
            api_key: api_key.trim().to_string(),
        })
    }

    /// The custom prompt when it renders, otherwise the preset.
    fn prompt_template(&self) -> String {
        let preset = self.prompt_style.template();
        match self.custom_prompt.as_deref().map(str::trim) {
            Some("") | None => preset.to_string(),
            Some(custom) => match render_system_prompt(custom, &self.target_language) {
                Ok(_) => custom.to_string(),
                Err(err) => {
                    warn!("Custom prompt failed to render, using {} preset: {err}", self.prompt_style);
                    preset.to_string()
                }
            },
        }
    }
}

/// Trims, drops trailing slashes and appends `/v1` when missing.
///
/// # Errors
/// Returns an error if the result is not an http(s) URL.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("API base URL is empty");
    }
    let normalized = if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    };

    let url = Url::parse(&normalized)
        .with_context(|| format!("Invalid API base URL: {trimmed}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("API base URL must use http or https: {trimmed}");
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_chars, 500);
        assert_eq!(config.throttle(), Duration::from_millis(80));
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "target_language = \"Japanese\"\nprompt_style = \"formal\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.target_language, "Japanese");
        assert_eq!(config.prompt_style, PromptStyle::Formal);
        assert_eq!(config.model, Config::DEFAULT_MODEL);
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_chars = \"lots\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_init_writes_template_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subdir").join("config.toml");

        Config::init(&path).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());

        let err = Config::init(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url(" https://api.openai.com/ ").unwrap(),
            "https://api.openai.com/v1"
        );
        assert_eq!(
            normalize_base_url("http://localhost:8080/v1//").unwrap(),
            "http://localhost:8080/v1"
        );
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("not a url").is_err());
        assert!(normalize_base_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_credential_and_base_url_precedence() {
        let mut config = Config::default();
        let resolved = config
            .resolve(Some("sk-env".to_string()), Some("http://127.0.0.1:9/".to_string()))
            .unwrap();
        assert_eq!(resolved.api_key, "sk-env");
        assert_eq!(resolved.endpoint, "http://127.0.0.1:9/v1");

        config.api_key = "sk-file".to_string();
        let resolved = config.resolve(Some("sk-env".to_string()), None).unwrap();
        assert_eq!(resolved.api_key, "sk-file");
        assert_eq!(resolved.endpoint, "https://api.openai.com/v1");
    }

    #[test]
    fn test_missing_credential_resolves_empty() {
        let resolved = Config::default().resolve(None, None).unwrap();
        assert!(!resolved.has_credential());
    }

    #[test]
    fn test_custom_prompt_falls_back_on_render_error() {
        let mut config = Config {
            custom_prompt: Some("Into {{ target_language }}, briefly.".to_string()),
            ..Config::default()
        };
        let resolved = config.resolve(None, None).unwrap();
        assert_eq!(resolved.prompt_template, "Into {{ target_language }}, briefly.");

        config.custom_prompt = Some("Into {{ target_lang }}".to_string());
        let resolved = config.resolve(None, None).unwrap();
        assert_eq!(resolved.prompt_template, PromptStyle::Concise.template());
    }

    #[test]
    fn test_display_masks_credential() {
        let config = Config {
            api_key: "sk-secret".to_string(),
            ..Config::default()
        };
        let shown = config.to_display_toml().unwrap();
        assert!(shown.contains("<redacted>"));
        assert!(!shown.contains("sk-secret"));
    }
}
