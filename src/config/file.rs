//! TOML configuration file loading
//!
//! Supports `~/.config/animatron/config.toml` as a persistent config
//! source. All fields are optional — the file is a partial overlay on top
//! of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Active personality name (e.g. "teddy")
    #[serde(default)]
    pub personality: Option<String>,

    /// Directory holding personality TOML files
    #[serde(default)]
    pub personality_dir: Option<PathBuf>,

    /// Directory holding pre-synthesized filler audio
    #[serde(default)]
    pub filler_dir: Option<PathBuf>,

    /// Directory for debug WAV dumps (unset = dumps disabled)
    #[serde(default)]
    pub debug_dump_dir: Option<PathBuf>,

    /// Cloud service configuration
    #[serde(default)]
    pub services: ServicesFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Cloud model identifiers
#[derive(Debug, Default, Deserialize)]
pub struct ServicesFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// STT language hint (e.g. "en")
    pub stt_language: Option<String>,

    /// Chat model (e.g. "gpt-4o-mini")
    pub chat_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Load the TOML config file from `path`, or the standard location.
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be
/// parsed.
pub fn load_config_file(path: Option<&PathBuf>) -> ConfigFile {
    let path = match path {
        Some(p) => p.clone(),
        None => match config_file_path() {
            Some(p) => p,
            None => return ConfigFile::default(),
        },
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/animatron/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("animatron").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let config: ConfigFile = toml::from_str(
            r#"
            personality = "teddy"

            [services]
            chat_model = "gpt-4o-mini"
            "#,
        )
        .unwrap();

        assert_eq!(config.personality.as_deref(), Some("teddy"));
        assert_eq!(config.services.chat_model.as_deref(), Some("gpt-4o-mini"));
        assert!(config.services.tts_model.is_none());
        assert!(config.api_keys.openai.is_none());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert!(config.personality.is_none());
    }
}
