//! Runtime configuration
//!
//! One explicit `Config` value built at startup from defaults, the TOML
//! file overlay, and environment variables, then passed by reference into
//! component constructors. No global settings object.

pub mod file;

use std::path::PathBuf;

use crate::persona::Personality;

/// Cloud service model identifiers
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    pub stt_model: String,
    pub stt_language: Option<String>,
    pub chat_model: String,
    pub tts_model: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            stt_language: Some("en".to_string()),
            chat_model: "gpt-4o-mini".to_string(),
            tts_model: "tts-1".to_string(),
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Active personality, loaded from its TOML file
    pub personality: Personality,

    /// Directory of filler audio, keyed below by personality and device
    pub filler_dir: PathBuf,

    /// Directory for debug WAV dumps; `None` disables dumps
    pub debug_dump_dir: Option<PathBuf>,

    /// Cloud service models
    pub services: ServicesConfig,

    /// OpenAI API key
    pub openai_api_key: Option<String>,
}

impl Config {
    /// Assemble configuration: defaults, then the TOML overlay, then
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if the personality file cannot be loaded.
    pub fn load(
        config_path: Option<&PathBuf>,
        personality_override: Option<&str>,
    ) -> crate::Result<Self> {
        let overlay = file::load_config_file(config_path);

        let personality_dir = overlay
            .personality_dir
            .unwrap_or_else(|| PathBuf::from("personalities"));
        let personality_name = personality_override
            .map(str::to_string)
            .or(overlay.personality)
            .unwrap_or_else(|| "teddy".to_string());
        let personality = Personality::load(&personality_dir, &personality_name)?;

        let mut services = ServicesConfig::default();
        if let Some(model) = overlay.services.stt_model {
            services.stt_model = model;
        }
        if let Some(lang) = overlay.services.stt_language {
            services.stt_language = Some(lang);
        }
        if let Some(model) = overlay.services.chat_model {
            services.chat_model = model;
        }
        if let Some(model) = overlay.services.tts_model {
            services.tts_model = model;
        }

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or(overlay.api_keys.openai);

        Ok(Self {
            personality,
            filler_dir: overlay.filler_dir.unwrap_or_else(|| PathBuf::from("fillers")),
            debug_dump_dir: overlay.debug_dump_dir,
            services,
            openai_api_key,
        })
    }

    /// Check the configuration, returning one message per problem.
    ///
    /// Callers append device validation errors and refuse to start if the
    /// combined list is non-empty.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.openai_api_key.is_none() {
            errors.push("no OpenAI API key (set OPENAI_API_KEY or api_keys.openai)".to_string());
        }
        errors.extend(self.personality.validate());

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_reported() {
        let config = Config {
            personality: Personality::default(),
            filler_dir: PathBuf::from("fillers"),
            debug_dump_dir: None,
            services: ServicesConfig::default(),
            openai_api_key: None,
        };
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("API key")));
    }

    #[test]
    fn valid_config_passes() {
        let config = Config {
            personality: Personality::default(),
            filler_dir: PathBuf::from("fillers"),
            debug_dump_dir: None,
            services: ServicesConfig::default(),
            openai_api_key: Some("sk-test".to_string()),
        };
        assert!(config.validate().is_empty());
    }
}
