//! Text-to-speech collaborator

use reqwest::blocking::Client;
use serde::Serialize;

use crate::{Error, Result};

/// Speech synthesis contract. Returns MP3-encoded audio.
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` into encoded audio
    ///
    /// # Errors
    ///
    /// Returns error on service failure.
    fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Voice parameters for synthesis, set per personality
#[derive(Debug, Clone)]
pub struct VoiceParams {
    pub voice: String,
    pub speed: f32,
    /// Free-text delivery instructions, e.g. "warm and slightly gravelly"
    pub style: Option<String>,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: "alloy".to_string(),
            speed: 1.0,
            style: None,
        }
    }
}

/// OpenAI speech endpoint synthesis
pub struct OpenAiTts {
    client: Client,
    api_key: String,
    model: String,
    params: VoiceParams,
}

impl OpenAiTts {
    #[must_use]
    pub fn new(api_key: String, model: String, params: VoiceParams) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            params,
        }
    }
}

impl Synthesizer for OpenAiTts {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::Synthesis("empty text".to_string()));
        }

        let request = SpeechRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: self.params.voice.clone(),
            speed: self.params.speed,
            instructions: self.params.style.clone(),
            response_format: "mp3".to_string(),
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .map_err(|e| Error::Synthesis(format!("TTS request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Synthesis(format!("TTS API error: {status} - {body}")));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::Synthesis(format!("failed to read TTS body: {e}")))?;

        if bytes.is_empty() {
            return Err(Error::Synthesis("TTS returned empty audio".to_string()));
        }

        Ok(bytes.to_vec())
    }
}

#[derive(Serialize)]
struct SpeechRequest {
    model: String,
    input: String,
    voice: String,
    speed: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    response_format: String,
}
