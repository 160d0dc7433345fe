//! Optional voice-conversion hook for simple-playback devices

/// Post-process hook applied to the voice track before composition.
///
/// Implementations wrap an external inference service. Returning `None`
/// means conversion was unavailable; the caller falls back to the
/// unconverted voice.
pub trait VoiceConverter: Send + Sync {
    /// Convert mono PCM, returning the converted samples and their rate
    fn convert(&self, samples: &[f32], sample_rate: u32) -> Option<(Vec<f32>, u32)>;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}
