//! Audio output backend
//!
//! The playback actor talks to a trait, not to the OS audio stack: open the
//! device, write one stereo buffer (blocking until it has played or the
//! watchdog gives up), close with a bounded wait. Timing quirks of a given
//! platform's audio stack live in [`BackendPolicy`], never in the pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::audio::resample::resample_stereo;
use crate::{Error, Result};

/// Backend-specific timing policy.
///
/// The delay constants are empirically tuned per platform audio stack;
/// defaults are conservative, not universal.
#[derive(Debug, Clone)]
pub struct BackendPolicy {
    /// Maximum time to spend opening the device, across retries
    pub open_timeout: Duration,
    /// Backoff between device-open retries (doubles per attempt)
    pub reopen_backoff: Duration,
    /// Maximum wait for a close/drain before abandoning the stream
    pub close_timeout: Duration,
    /// Abort a write if no playback progress for this long
    pub stall_window: Duration,
    /// Abort a write when elapsed exceeds this multiple of the buffer's
    /// expected duration
    pub duration_multiplier: f32,
}

impl Default for BackendPolicy {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(3),
            reopen_backoff: Duration::from_millis(100),
            close_timeout: Duration::from_secs(2),
            stall_window: Duration::from_secs(5),
            duration_multiplier: 3.5,
        }
    }
}

/// Blocking stereo audio output
pub trait AudioBackend: Send + Sync {
    /// Write one interleaved stereo buffer, blocking until it has played
    /// out or the watchdog aborts it.
    ///
    /// # Errors
    ///
    /// Returns error on device failure or watchdog abort.
    fn write(&self, interleaved: &[f32], sample_rate: u32) -> Result<()>;

    /// Whether a buffer is currently playing
    fn is_playing(&self) -> bool;

    /// Abort any in-progress write
    fn force_stop(&self);
}

/// cpal-based output to the default device
pub struct CpalBackend {
    policy: BackendPolicy,
    playing: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
}

impl CpalBackend {
    /// Create a backend with the given timing policy
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available.
    pub fn new(policy: BackendPolicy) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio backend initialized"
        );

        Ok(Self {
            policy,
            playing: Arc::new(AtomicBool::new(false)),
            abort: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Find a stereo output config for `sample_rate`, or fall back to the
    /// device default rate (the buffer is resampled to match).
    fn pick_config(device: &cpal::Device, sample_rate: u32) -> Result<(StreamConfig, u32)> {
        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            });

        if let Some(config) = supported {
            let config = config.with_sample_rate(SampleRate(sample_rate)).config();
            return Ok((config, sample_rate));
        }

        let default = device
            .default_output_config()
            .map_err(|e| Error::Audio(e.to_string()))?;
        let rate = default.sample_rate().0;
        let mut config = default.config();
        config.channels = 2;
        tracing::debug!(requested = sample_rate, device_rate = rate, "falling back to device rate");
        Ok((config, rate))
    }

    /// Open the device with retry and exponential backoff, bounded by the
    /// policy's open timeout.
    fn open_stream(
        &self,
        samples: Arc<Vec<f32>>,
        position: Arc<AtomicUsize>,
        finished: Arc<AtomicBool>,
        sample_rate: u32,
    ) -> Result<cpal::Stream> {
        let started = Instant::now();
        let mut backoff = self.policy.reopen_backoff;

        loop {
            match self.try_open_stream(
                Arc::clone(&samples),
                Arc::clone(&position),
                Arc::clone(&finished),
                sample_rate,
            ) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    if started.elapsed() + backoff > self.policy.open_timeout {
                        return Err(Error::Device(format!("device open timed out: {e}")));
                    }
                    tracing::warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "device open failed, retrying");
                    std::thread::sleep(backoff);
                    backoff *= 2;
                }
            }
        }
    }

    fn try_open_stream(
        &self,
        samples: Arc<Vec<f32>>,
        position: Arc<AtomicUsize>,
        finished: Arc<AtomicBool>,
        sample_rate: u32,
    ) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;
        let (config, _) = Self::pick_config(&device, sample_rate)?;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Acquire);
                    for out in data.iter_mut() {
                        if pos < samples.len() {
                            *out = samples[pos];
                            pos += 1;
                        } else {
                            finished.store(true, Ordering::Release);
                            *out = 0.0;
                        }
                    }
                    position.store(pos, Ordering::Release);
                },
                |err| {
                    tracing::error!(error = %err, "audio output stream error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        Ok(stream)
    }
}

impl AudioBackend for CpalBackend {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write(&self, interleaved: &[f32], sample_rate: u32) -> Result<()> {
        if interleaved.is_empty() {
            return Ok(());
        }

        self.abort.store(false, Ordering::SeqCst);
        self.playing.store(true, Ordering::SeqCst);
        let result = self.write_inner(interleaved, sample_rate);
        self.playing.store(false, Ordering::SeqCst);
        result
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn force_stop(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }
}

impl CpalBackend {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_inner(&self, interleaved: &[f32], sample_rate: u32) -> Result<()> {
        // Probe what rate the device will actually run at; resample to it
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;
        let (_, device_rate) = Self::pick_config(&device, sample_rate)?;

        let buffer = if device_rate == sample_rate {
            interleaved.to_vec()
        } else {
            tracing::debug!(from = sample_rate, to = device_rate, "resampling for device");
            resample_stereo(interleaved, sample_rate, device_rate)?
        };

        let total = buffer.len();
        let expected = Duration::from_secs_f64(total as f64 / 2.0 / f64::from(device_rate));
        let deadline = expected.mul_f32(self.policy.duration_multiplier) + Duration::from_millis(500);

        let samples = Arc::new(buffer);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = self.open_stream(
            Arc::clone(&samples),
            Arc::clone(&position),
            Arc::clone(&finished),
            device_rate,
        )?;

        // Watchdog loop: finish normally, or abort on overall deadline,
        // write stall, or external force_stop.
        let started = Instant::now();
        let mut last_position = 0usize;
        let mut last_progress = Instant::now();

        let outcome = loop {
            if finished.load(Ordering::Acquire) {
                break Ok(());
            }
            if self.abort.load(Ordering::SeqCst) {
                break Err(Error::Device("playback aborted".to_string()));
            }
            if started.elapsed() > deadline {
                break Err(Error::Device(format!(
                    "playback exceeded {}ms deadline",
                    deadline.as_millis()
                )));
            }

            let pos = position.load(Ordering::Acquire);
            if pos > last_position {
                last_position = pos;
                last_progress = Instant::now();
            } else if last_progress.elapsed() > self.policy.stall_window {
                break Err(Error::Device(format!(
                    "no write progress for {}ms",
                    self.policy.stall_window.as_millis()
                )));
            }

            std::thread::sleep(Duration::from_millis(50));
        };

        // Close with a bounded drain, then abandon the stream either way
        let close_started = Instant::now();
        while !finished.load(Ordering::Acquire)
            && outcome.is_ok()
            && close_started.elapsed() < self.policy.close_timeout
        {
            std::thread::sleep(Duration::from_millis(10));
        }
        drop(stream);

        match &outcome {
            Ok(()) => tracing::debug!(samples = total, "playback complete"),
            Err(e) => tracing::warn!(error = %e, "playback abandoned"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_sane() {
        let policy = BackendPolicy::default();
        assert!(policy.duration_multiplier > 1.0);
        assert!(policy.stall_window > Duration::ZERO);
        assert!(policy.open_timeout >= policy.reopen_backoff);
    }
}
