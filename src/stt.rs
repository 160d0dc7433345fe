//! Speech-to-text collaborator

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;

use crate::{Error, Result};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Speech transcription contract.
///
/// `Ok(None)` means the audio contained no recognizable speech; errors
/// mean the transcription service itself failed.
pub trait Transcriber: Send + Sync {
    /// Transcribe WAV-encoded audio to text
    ///
    /// # Errors
    ///
    /// Returns error on service failure.
    fn transcribe(&self, wav_bytes: &[u8]) -> Result<Option<String>>;
}

/// Bounded retry around any transcriber.
///
/// Retries only on service errors; an empty transcript is a final answer.
pub fn transcribe_with_retry(stt: &dyn Transcriber, wav_bytes: &[u8]) -> Result<Option<String>> {
    let mut last_err = None;
    for attempt in 1..=RETRY_ATTEMPTS {
        match stt.transcribe(wav_bytes) {
            Ok(text) => return Ok(text),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "transcription attempt failed");
                last_err = Some(e);
                if attempt < RETRY_ATTEMPTS {
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::Transcription("no attempts made".to_string())))
}

/// OpenAI Whisper transcription
pub struct WhisperStt {
    client: Client,
    api_key: String,
    model: String,
    language: Option<String>,
}

impl WhisperStt {
    #[must_use]
    pub fn new(api_key: String, model: String, language: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            language,
        }
    }
}

impl Transcriber for WhisperStt {
    fn transcribe(&self, wav_bytes: &[u8]) -> Result<Option<String>> {
        let part = Part::bytes(wav_bytes.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Transcription(format!("invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        if let Some(ref lang) = self.language {
            form = form.text("language", lang.clone());
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .map_err(|e| Error::Transcription(format!("Whisper request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Transcription(format!(
                "Whisper API error: {status} - {body}"
            )));
        }

        let result: TranscriptionResponse = response
            .json()
            .map_err(|e| Error::Transcription(format!("failed to parse Whisper response: {e}")))?;

        let text = result.text.trim().to_string();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyStt {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl Transcriber for FlakyStt {
        fn transcribe(&self, _wav: &[u8]) -> Result<Option<String>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(Error::Transcription("temporary failure".to_string()))
            } else {
                Ok(Some("hello".to_string()))
            }
        }
    }

    #[test]
    fn retries_through_transient_failures() {
        let stt = FlakyStt {
            calls: AtomicU32::new(0),
            fail_first: 2,
        };
        let result = transcribe_with_retry(&stt, &[]).unwrap();
        assert_eq!(result.as_deref(), Some("hello"));
        assert_eq!(stt.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn gives_up_after_bounded_attempts() {
        let stt = FlakyStt {
            calls: AtomicU32::new(0),
            fail_first: 10,
        };
        assert!(transcribe_with_retry(&stt, &[]).is_err());
        assert_eq!(stt.calls.load(Ordering::SeqCst), 3);
    }

    struct SilentStt;

    impl Transcriber for SilentStt {
        fn transcribe(&self, _wav: &[u8]) -> Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn empty_transcript_is_not_retried() {
        let result = transcribe_with_retry(&SilentStt, &[]).unwrap();
        assert!(result.is_none());
    }
}
