//! Personality definitions
//!
//! A personality bundles everything that makes one toy character distinct:
//! system prompt, wake phrase, voice parameters, filler phrases, device
//! kind, and servo tuning. Loaded once from TOML at startup, immutable
//! thereafter.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceKind, DeviceTuning};
use crate::tts::VoiceParams;
use crate::{Error, Result};

/// One character configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personality {
    /// Identifier, matches the TOML filename and filler directory
    pub name: String,

    /// LLM system prompt defining the character
    pub system_prompt: String,

    /// Phrase that must appear in a transcript to start a conversation
    pub wake_phrase: String,

    /// TTS voice identifier
    #[serde(default = "default_voice")]
    pub voice: String,

    /// TTS speed multiplier
    #[serde(default = "default_speed")]
    pub voice_speed: f32,

    /// Free-text delivery instructions for the TTS voice
    #[serde(default)]
    pub voice_style: Option<String>,

    /// Texts of the pre-synthesized filler clips, in filename order
    #[serde(default)]
    pub filler_phrases: Vec<String>,

    /// Which output device this personality drives
    #[serde(default)]
    pub device: DeviceKind,

    /// Gain and expression tuning
    #[serde(default)]
    pub tuning: DeviceTuning,
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_speed() -> f32 {
    1.0
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            name: "teddy".to_string(),
            system_prompt: "You are a friendly talking teddy bear. Keep replies short and warm."
                .to_string(),
            wake_phrase: "hey teddy".to_string(),
            voice: default_voice(),
            voice_speed: default_speed(),
            voice_style: None,
            filler_phrases: Vec::new(),
            device: DeviceKind::Animatronic,
            tuning: DeviceTuning::default(),
        }
    }
}

impl Personality {
    /// Load `<dir>/<name>.toml`
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or malformed.
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let path = dir.join(format!("{name}.toml"));
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Personality(format!("{}: {e}", path.display())))?;
        let personality: Self = toml::from_str(&content)
            .map_err(|e| Error::Personality(format!("{}: {e}", path.display())))?;

        tracing::info!(
            name = personality.name,
            device = personality.device.name(),
            wake_phrase = personality.wake_phrase,
            "personality loaded"
        );
        Ok(personality)
    }

    /// Voice parameters for the synthesizer
    #[must_use]
    pub fn voice_params(&self) -> VoiceParams {
        VoiceParams {
            voice: self.voice.clone(),
            speed: self.voice_speed,
            style: self.voice_style.clone(),
        }
    }

    /// Per-personality checks, aggregated into the startup validation
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("personality name is empty".to_string());
        }
        if self.wake_phrase.trim().is_empty() {
            errors.push("wake_phrase is empty".to_string());
        }
        if self.system_prompt.trim().is_empty() {
            errors.push("system_prompt is empty".to_string());
        }
        if !(0.25..=4.0).contains(&self.voice_speed) {
            errors.push(format!("voice_speed {} out of range 0.25-4.0", self.voice_speed));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let personality: Personality = toml::from_str(
            r#"
            name = "grizzle"
            system_prompt = "You are a gruff but kind bear."
            wake_phrase = "hey grizzle"
            "#,
        )
        .unwrap();

        assert_eq!(personality.name, "grizzle");
        assert_eq!(personality.voice, "alloy");
        assert_eq!(personality.device, DeviceKind::Animatronic);
        assert!(personality.validate().is_empty());
    }

    #[test]
    fn parses_full_toml() {
        let personality: Personality = toml::from_str(
            r#"
            name = "parrot"
            system_prompt = "You are a sarcastic parrot."
            wake_phrase = "hello polly"
            voice = "fable"
            voice_speed = 1.2
            voice_style = "squawky and theatrical"
            filler_phrases = ["Let me think...", "Hmm, good question!"]
            device = "speaker"

            [tuning]
            voice_gain = 1.0
            control_gain = 0.5
            eyes_base = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(personality.device, DeviceKind::Speaker);
        assert_eq!(personality.filler_phrases.len(), 2);
        assert!((personality.tuning.eyes_base - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn validation_catches_bad_speed() {
        let personality = Personality {
            voice_speed: 9.0,
            ..Personality::default()
        };
        let errors = personality.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("voice_speed"));
    }
}
