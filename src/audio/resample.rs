//! Sample-rate conversion via rubato
//!
//! The voice track gets resampled up to the PPM encoder's native rate
//! before composition; the control track is never resampled, its timing
//! must stay exact.

use rubato::{FftFixedIn, Resampler};

use crate::{Error, Result};

const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Resample mono audio from `from_rate` to `to_rate`.
///
/// Output length is `round(len * to_rate / from_rate)`; the input tail is
/// zero-padded through the resampler rather than dropped.
///
/// # Errors
///
/// Returns error if the resampler cannot be constructed or fails.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let expected =
        (samples.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).round() as usize;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, SUB_CHUNKS, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let mut input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    // Pad to a whole number of chunks so the tail is not lost
    let padded = input.len().div_ceil(CHUNK_SIZE) * CHUNK_SIZE;
    input.resize(padded, 0.0);

    let mut output: Vec<f64> = Vec::with_capacity(expected + CHUNK_SIZE);
    for chunk in input.chunks(CHUNK_SIZE) {
        let result = resampler
            .process(&[chunk.to_vec()], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    output.truncate(expected);
    Ok(output.iter().map(|&s| s as f32).collect())
}

/// Resample interleaved stereo audio by converting each channel separately
///
/// # Errors
///
/// Returns error if resampling either channel fails.
pub fn resample_stereo(interleaved: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(interleaved.to_vec());
    }

    let left: Vec<f32> = interleaved.iter().step_by(2).copied().collect();
    let right: Vec<f32> = interleaved.iter().skip(1).step_by(2).copied().collect();

    let left = resample(&left, from_rate, to_rate)?;
    let right = resample(&right, from_rate, to_rate)?;

    let frames = left.len().min(right.len());
    let mut out = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        out.push(left[i]);
        out.push(right[i]);
    }
    Ok(out)
}
