//! Syllable-based lip sync: speech audio + text -> servo channel frames
//!
//! Syllables give the jaw its timing: the text is tokenized with a
//! hyphenation dictionary (vowel-run heuristic when the dictionary cannot
//! split a word), the audio is partitioned into equal segments per syllable,
//! and each syllable contributes a closed-open-closed envelope whose peak
//! tracks segment amplitude. Per-frame asymmetric smoothing gives fast
//! mouth-open and slower mouth-close, which keeps the jaw servo from
//! chattering.

use std::sync::OnceLock;

use hyphenation::{Hyphenator, Language, Load, Standard};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use regex::Regex;

use crate::signal::eyes::{BLINK_PROBABILITY, EyeController};
use crate::signal::ppm::{FRAME_PERIOD_US, PpmGenerator};
use crate::signal::{CH_EYES, CH_LOWER_JAW, CH_UPPER_JAW, ChannelFrame, ChannelMatrix};

/// Amplitude gain mapping speech level to mouth opening
const MOUTH_GAIN: f32 = 12.0;

/// Upper jaw tracks the lower jaw at this ratio
const UPPER_JAW_RATIO: f32 = 0.7;

/// Smoothing blend kept from the previous frame when the mouth opens
const ATTACK: f32 = 0.15;

/// Smoothing blend kept from the previous frame when the mouth closes
const RELEASE: f32 = 0.35;

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z0-9']+").expect("valid word regex"))
}

fn dictionary() -> Option<&'static Standard> {
    static DICT: OnceLock<Option<Standard>> = OnceLock::new();
    DICT.get_or_init(|| match Standard::from_embedded(Language::EnglishUS) {
        Ok(dict) => Some(dict),
        Err(e) => {
            tracing::warn!(error = %e, "hyphenation dictionary unavailable, using heuristic");
            None
        }
    })
    .as_ref()
}

/// Count syllables in a single word, falling back to vowel runs
fn word_syllables(word: &str) -> usize {
    if let Some(dict) = dictionary() {
        let breaks = dict.hyphenate(word).breaks.len();
        if breaks > 0 {
            return breaks + 1;
        }
    }
    vowel_run_estimate(word)
}

/// Heuristic: one syllable per contiguous vowel group, minimum one
fn vowel_run_estimate(word: &str) -> usize {
    let mut count = 0usize;
    let mut in_vowel = false;
    for c in word.chars() {
        let vowel = matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !in_vowel {
            count += 1;
        }
        in_vowel = vowel;
    }
    count.max(1)
}

/// Total syllable count of `text`, 0 for text with no words
#[must_use]
pub fn syllable_count(text: &str) -> usize {
    word_pattern()
        .find_iter(&text.to_lowercase())
        .map(|m| word_syllables(m.as_str()))
        .sum()
}

/// Per-syllable mouth envelope: closed -> amplitude-scaled open -> closed.
///
/// Returns a flat half-open value when the text yields no syllables.
#[allow(clippy::cast_precision_loss)]
fn syllable_envelope(audio: &[f32], text: &str) -> Vec<f32> {
    let syllables = syllable_count(text);
    if syllables == 0 || audio.is_empty() {
        return vec![0.5];
    }

    let samples_per_syllable = (audio.len() / syllables).max(1);
    let mut envelope = Vec::with_capacity(syllables * 3);

    for idx in 0..syllables {
        let start = idx * samples_per_syllable;
        if start >= audio.len() {
            envelope.extend_from_slice(&[0.0, 0.0, 0.0]);
            continue;
        }
        let end = (start + samples_per_syllable).min(audio.len());
        let segment = &audio[start..end];

        let peak = segment.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let rms = (segment.iter().map(|s| s * s).sum::<f32>() / segment.len() as f32).sqrt();
        let amplitude = 0.7 * peak + 0.3 * rms;
        let opening = (amplitude * MOUTH_GAIN).clamp(0.0, 1.0);

        envelope.extend_from_slice(&[0.0, opening, 0.0]);
    }

    tracing::debug!(
        syllables,
        envelope_points = envelope.len(),
        "syllable envelope built"
    );
    envelope
}

/// Build the full channel matrix for one utterance.
///
/// `audio` is mono speech at `sample_rate`; `text` is what is being spoken;
/// `eyes_base` is the personality's base eye openness in [0, 1];
/// `sentiment` in [-1, 1]. One frame is produced per PPM period covering
/// the audio duration.
#[must_use]
pub fn channel_matrix(
    audio: &[f32],
    sample_rate: u32,
    text: &str,
    eyes_base: f32,
    sentiment: f32,
) -> ChannelMatrix {
    channel_matrix_with_blink(
        audio,
        sample_rate,
        text,
        eyes_base,
        sentiment,
        BLINK_PROBABILITY,
        SmallRng::from_entropy(),
    )
}

/// [`channel_matrix`] with an explicit blink probability and RNG, for
/// deterministic tests.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn channel_matrix_with_blink(
    audio: &[f32],
    sample_rate: u32,
    text: &str,
    eyes_base: f32,
    sentiment: f32,
    blink_probability: f32,
    rng: SmallRng,
) -> ChannelMatrix {
    let duration = audio.len() as f64 / f64::from(sample_rate);
    let num_frames = PpmGenerator::new(sample_rate).frames_for_duration(duration);
    let samples_per_frame =
        (u64::from(FRAME_PERIOD_US) * u64::from(sample_rate) / 1_000_000) as usize;

    let envelope = syllable_envelope(audio, text);
    let mut eyes = EyeController::new(eyes_base, sentiment, blink_probability, rng);

    let mut frames: ChannelMatrix = vec![ChannelFrame::default(); num_frames];
    let mut prev_mouth = 0.0f32;

    for (frame_idx, frame) in frames.iter_mut().enumerate() {
        let start_sample = frame_idx * samples_per_frame;

        let mouth = if start_sample < audio.len() && duration > 0.0 {
            let elapsed = start_sample as f64 / f64::from(sample_rate);
            let env_idx = ((elapsed / duration) * envelope.len() as f64) as usize;
            let target = envelope[env_idx.min(envelope.len() - 1)];

            // Asymmetric smoothing: quick to open, slower to close
            let blend = if target > prev_mouth { ATTACK } else { RELEASE };
            blend * prev_mouth + (1.0 - blend) * target
        } else {
            0.0
        };

        frame[CH_LOWER_JAW] = (mouth * 255.0) as u8;
        frame[CH_UPPER_JAW] = (mouth * UPPER_JAW_RATIO * 255.0) as u8;
        frame[CH_EYES] = eyes.command(frame_idx, num_frames);
        prev_mouth = mouth;
    }

    log_utterance_stats(&frames, eyes.blink_count());
    frames
}

/// Per-utterance diagnostics: mouth activity ratio and eye statistics.
/// Tuning aids, not correctness-critical.
#[allow(clippy::cast_precision_loss)]
fn log_utterance_stats(frames: &ChannelMatrix, blink_count: usize) {
    if frames.is_empty() {
        return;
    }

    let active = frames.iter().filter(|f| f[CH_LOWER_JAW] > 0).count();
    let ratio = active as f32 / frames.len() as f32;
    if ratio < 0.1 {
        tracing::warn!(
            active,
            total = frames.len(),
            "low mouth activity: lip sync may be mistuned"
        );
    }

    let mut eye_values: Vec<u8> = frames.iter().map(|f| f[CH_EYES]).collect();
    eye_values.sort_unstable();
    tracing::info!(
        frames = frames.len(),
        mouth_active = active,
        eye_min = eye_values[0],
        eye_median = eye_values[eye_values.len() / 2],
        eye_max = eye_values[eye_values.len() - 1],
        blinks = blink_count,
        "utterance channel matrix generated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(duration_secs: f32, rate: u32, amplitude: f32) -> Vec<f32> {
        let n = (duration_secs * rate as f32) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
            })
            .collect()
    }

    #[test]
    fn vowel_runs_estimate_syllables() {
        assert_eq!(vowel_run_estimate("cat"), 1);
        assert_eq!(vowel_run_estimate("table"), 2);
        assert_eq!(vowel_run_estimate("strength"), 1);
        // Never zero, even for degenerate input
        assert_eq!(vowel_run_estimate("hmm"), 1);
    }

    #[test]
    fn syllable_count_handles_sentences() {
        assert!(syllable_count("hello world") >= 2);
        assert_eq!(syllable_count(""), 0);
        assert_eq!(syllable_count("!!! ..."), 0);
    }

    #[test]
    fn matrix_covers_audio_duration() {
        let rate = 16000;
        let audio = sine(1.0, rate, 0.3);
        let frames = channel_matrix_with_blink(
            &audio,
            rate,
            "hello there friend",
            0.9,
            0.0,
            0.0,
            SmallRng::seed_from_u64(1),
        );
        // ~60.24 frames per second, plus the trailing partial frame
        assert!(frames.len() >= 60 && frames.len() <= 62, "got {}", frames.len());
    }

    #[test]
    fn loud_audio_moves_the_mouth() {
        let rate = 16000;
        let audio = sine(1.0, rate, 0.3);
        let frames = channel_matrix_with_blink(
            &audio,
            rate,
            "la la la la la",
            0.9,
            0.0,
            0.0,
            SmallRng::seed_from_u64(1),
        );
        let active = frames.iter().filter(|f| f[CH_LOWER_JAW] > 0).count();
        assert!(active > frames.len() / 10, "mouth should move for loud speech");
    }

    #[test]
    fn upper_jaw_tracks_lower_jaw() {
        let rate = 16000;
        let audio = sine(0.5, rate, 0.4);
        let frames = channel_matrix_with_blink(
            &audio,
            rate,
            "testing jaw ratio",
            0.9,
            0.0,
            0.0,
            SmallRng::seed_from_u64(1),
        );
        for frame in &frames {
            let lower = f32::from(frame[CH_LOWER_JAW]);
            let upper = f32::from(frame[CH_UPPER_JAW]);
            assert!((upper - lower * UPPER_JAW_RATIO).abs() <= 2.0);
        }
    }

    #[test]
    fn mouth_opens_faster_than_it_closes() {
        let rate = 16000;
        let mut audio = sine(0.5, rate, 0.5);
        audio.extend(std::iter::repeat_n(0.0f32, audio.len()));

        let frames = channel_matrix_with_blink(
            &audio,
            rate,
            "la la la la",
            0.9,
            0.0,
            0.0,
            SmallRng::seed_from_u64(3),
        );

        let mut max_rise = 0i32;
        let mut max_fall = 0i32;
        for pair in frames.windows(2) {
            let delta = i32::from(pair[1][CH_LOWER_JAW]) - i32::from(pair[0][CH_LOWER_JAW]);
            max_rise = max_rise.max(delta);
            max_fall = max_fall.max(-delta);
        }

        assert!(max_rise > 0 && max_fall > 0, "expected movement both ways");
        // Attack keeps 0.15 of the previous frame, release keeps 0.35:
        // the steepest opening step must beat the steepest closing step
        assert!(max_rise > max_fall, "rise {max_rise} vs fall {max_fall}");
    }

    #[test]
    fn silent_audio_keeps_mouth_closed() {
        let rate = 16000;
        let audio = vec![0.0f32; rate as usize];
        let frames = channel_matrix_with_blink(
            &audio,
            rate,
            "quiet words",
            0.9,
            0.0,
            0.0,
            SmallRng::seed_from_u64(1),
        );
        assert!(frames.iter().all(|f| f[CH_LOWER_JAW] == 0));
    }

    #[test]
    fn eye_channel_pinned_at_boundaries() {
        let rate = 16000;
        let audio = sine(1.0, rate, 0.3);
        let base = 0.9f32;
        let expected = ((1.0 - base) * 255.0).round() as u8;

        for sentiment in [-1.0f32, 0.5, 1.0] {
            let frames = channel_matrix_with_blink(
                &audio,
                rate,
                "checking the eyes",
                base,
                sentiment,
                0.0,
                SmallRng::seed_from_u64(1),
            );
            let n = frames.len();
            for i in 0..3 {
                assert_eq!(frames[i][CH_EYES], expected);
                assert_eq!(frames[n - 1 - i][CH_EYES], expected);
            }
        }
    }
}
