//! Channel compositor: device-specific stereo output
//!
//! A motor-control device carries voice on the left channel and the PPM
//! control track on the right; a simple speaker duplicates the voice on
//! both. The variant set is fixed, so devices are a closed enum built by
//! [`OutputDevice::create`], not a runtime registry.

pub mod convert;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::resample;
use crate::sentiment::SentimentAnalyzer;
use crate::signal::lipsync::channel_matrix;
use crate::signal::ppm::PpmGenerator;
use crate::{Error, Result};

pub use convert::VoiceConverter;

/// Native sample rate of the control-signal encoder
pub const PPM_NATIVE_RATE: u32 = 44_100;

/// Which physical device the compositor targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Motor-control toy: left = voice, right = PPM control track
    #[default]
    Animatronic,
    /// Plain stereo speaker, voice on both channels
    Speaker,
}

impl DeviceKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Animatronic => "animatronic",
            Self::Speaker => "speaker",
        }
    }
}

/// Gain and expression tuning for a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTuning {
    /// Voice track gain, 0.0-2.0. Boosted above 1.0 on motor devices to
    /// stand clear of control-channel bleed.
    pub voice_gain: f32,
    /// Control track gain, 0.0-1.0. Attenuated to limit electrical bleed
    /// into the voice channel.
    pub control_gain: f32,
    /// Resting eye openness, 0.0-1.0
    pub eyes_base: f32,
}

impl Default for DeviceTuning {
    fn default() -> Self {
        Self {
            voice_gain: 1.25,
            control_gain: 0.75,
            eyes_base: 0.9,
        }
    }
}

/// One composed sentence chunk: interleaved stereo samples plus rate
#[derive(Debug, Clone)]
pub struct DeviceOutput {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DeviceOutput {
    /// Playback duration in seconds
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / 2.0 / f64::from(self.sample_rate)
    }
}

/// Device-specific audio composition
pub enum OutputDevice {
    Animatronic {
        tuning: DeviceTuning,
        sentiment: SentimentAnalyzer,
        encoder: PpmGenerator,
    },
    Speaker {
        tuning: DeviceTuning,
        sentiment: SentimentAnalyzer,
        converter: Option<Arc<dyn VoiceConverter>>,
    },
}

impl OutputDevice {
    /// Static factory for the fixed variant set
    pub fn create(kind: DeviceKind, tuning: DeviceTuning) -> Self {
        match kind {
            DeviceKind::Animatronic => Self::Animatronic {
                tuning,
                sentiment: SentimentAnalyzer::new(),
                encoder: PpmGenerator::new(PPM_NATIVE_RATE),
            },
            DeviceKind::Speaker => Self::Speaker {
                tuning,
                sentiment: SentimentAnalyzer::new(),
                converter: None,
            },
        }
    }

    /// Speaker variant with an external voice-conversion hook
    pub fn speaker_with_converter(tuning: DeviceTuning, converter: Arc<dyn VoiceConverter>) -> Self {
        Self::Speaker {
            tuning,
            sentiment: SentimentAnalyzer::new(),
            converter: Some(converter),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Animatronic { .. } => DeviceKind::Animatronic,
            Self::Speaker { .. } => DeviceKind::Speaker,
        }
    }

    /// Check tuning parameters against their documented ranges.
    ///
    /// Returns one message per violation; empty means valid. Callers
    /// aggregate these with global config errors and refuse to start on any.
    pub fn validate_configuration(&self) -> Vec<String> {
        let tuning = match self {
            Self::Animatronic { tuning, .. } | Self::Speaker { tuning, .. } => tuning,
        };

        let mut errors = Vec::new();
        if !(0.0..=2.0).contains(&tuning.voice_gain) {
            errors.push(format!(
                "voice_gain {} out of range 0.0-2.0",
                tuning.voice_gain
            ));
        }
        if !(0.0..=1.0).contains(&tuning.control_gain) {
            errors.push(format!(
                "control_gain {} out of range 0.0-1.0",
                tuning.control_gain
            ));
        }
        if !(0.0..=1.0).contains(&tuning.eyes_base) {
            errors.push(format!("eyes_base {} out of range 0.0-1.0", tuning.eyes_base));
        }
        errors
    }

    /// Compose one spoken chunk into device-ready stereo audio.
    ///
    /// `voice` is mono PCM at `sample_rate`; `text` is the text it speaks.
    ///
    /// # Errors
    ///
    /// Returns error if resampling or signal generation fails, or if the
    /// voice buffer is empty.
    pub fn compose(&self, voice: &[f32], sample_rate: u32, text: &str) -> Result<DeviceOutput> {
        if voice.is_empty() {
            return Err(Error::Device("empty voice buffer".to_string()));
        }

        match self {
            Self::Animatronic {
                tuning,
                sentiment,
                encoder,
            } => Self::compose_motor(tuning, sentiment, encoder, voice, sample_rate, text),
            Self::Speaker {
                tuning,
                sentiment,
                converter,
            } => Self::compose_speaker(tuning, sentiment, converter.as_deref(), voice, sample_rate, text),
        }
    }

    /// Motor-control composition: voice left, PPM control right.
    ///
    /// The voice is resampled up to the encoder's native rate; the control
    /// track is generated at that rate directly and never resampled, its
    /// pulse timing must stay exact.
    #[allow(clippy::cast_precision_loss)]
    fn compose_motor(
        tuning: &DeviceTuning,
        sentiment: &SentimentAnalyzer,
        encoder: &PpmGenerator,
        voice: &[f32],
        sample_rate: u32,
        text: &str,
    ) -> Result<DeviceOutput> {
        let score = sentiment.analyze(text);
        let voice_44k = resample(voice, sample_rate, PPM_NATIVE_RATE)?;
        let duration = voice_44k.len() as f64 / f64::from(PPM_NATIVE_RATE);

        let matrix = channel_matrix(&voice_44k, PPM_NATIVE_RATE, text, tuning.eyes_base, score);
        let control = encoder.generate_signal(duration, &matrix);

        let frames = voice_44k.len().min(control.len());
        let mut interleaved = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            interleaved.push(voice_44k[i] * tuning.voice_gain);
            interleaved.push(control[i] * tuning.control_gain);
        }

        tracing::debug!(
            frames,
            sentiment = score,
            channel_frames = matrix.len(),
            "composed motor-device chunk"
        );

        Ok(DeviceOutput {
            samples: interleaved,
            sample_rate: PPM_NATIVE_RATE,
        })
    }

    /// Simple-playback composition: converted or raw voice on both channels
    fn compose_speaker(
        tuning: &DeviceTuning,
        sentiment: &SentimentAnalyzer,
        converter: Option<&dyn VoiceConverter>,
        voice: &[f32],
        sample_rate: u32,
        text: &str,
    ) -> Result<DeviceOutput> {
        // Sentiment is computed for log consistency across devices even
        // though nothing downstream consumes it here
        let score = sentiment.analyze(text);

        let (voice, rate) = match converter.and_then(|c| c.convert(voice, sample_rate)) {
            Some((converted, rate)) => {
                tracing::debug!(rate, "voice conversion applied");
                (converted, rate)
            }
            None => (voice.to_vec(), sample_rate),
        };

        let voice = resample(&voice, rate, PPM_NATIVE_RATE)?;
        let mut interleaved = Vec::with_capacity(voice.len() * 2);
        for sample in voice {
            let s = sample * tuning.voice_gain;
            interleaved.push(s);
            interleaved.push(s);
        }

        tracing::debug!(sentiment = score, samples = interleaved.len(), "composed speaker chunk");

        Ok(DeviceOutput {
            samples: interleaved,
            sample_rate: PPM_NATIVE_RATE,
        })
    }
}
