//! Wake listening
//!
//! An energy-based detector segments speech out of the capture stream; the
//! daemon verifies the wake phrase against the transcript afterward. The
//! listener keeps consuming frames while paused (skipping detection) and
//! resets its rolling state on resume so stale pre-pause audio can never
//! trigger.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::capture::AudioCapture;
use crate::Result;

/// RMS energy above which a frame counts as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length for a valid segment (samples at 16 kHz)
const MIN_SPEECH_SAMPLES: usize = 4_800;

/// Trailing silence that ends a segment (samples)
const SILENCE_SAMPLES: usize = 8_000;

/// Ignore re-triggers within this window of the last one
const DEBOUNCE_WINDOW: Duration = Duration::from_secs(2);

/// Invoked with the captured speech segment on each detection
pub type DetectionCallback = Arc<dyn Fn(Vec<f32>) + Send + Sync>;

/// Speech segmentation over capture frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmenterState {
    Quiet,
    Accumulating,
}

struct SpeechSegmenter {
    state: SegmenterState,
    buffer: Vec<f32>,
    silence_run: usize,
}

impl SpeechSegmenter {
    fn new() -> Self {
        Self {
            state: SegmenterState::Quiet,
            buffer: Vec::new(),
            silence_run: 0,
        }
    }

    /// Feed one frame; returns a complete speech segment when one ends
    fn feed(&mut self, frame: &[f32]) -> Option<Vec<f32>> {
        let is_speech = rms_energy(frame) > ENERGY_THRESHOLD;

        match self.state {
            SegmenterState::Quiet => {
                if is_speech {
                    self.state = SegmenterState::Accumulating;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(frame);
                    self.silence_run = 0;
                }
            }
            SegmenterState::Accumulating => {
                self.buffer.extend_from_slice(frame);
                if is_speech {
                    self.silence_run = 0;
                } else {
                    self.silence_run += frame.len();
                }

                if self.silence_run > SILENCE_SAMPLES {
                    let trailing = self.silence_run;
                    let segment = std::mem::take(&mut self.buffer);
                    self.reset();
                    let speech_len = segment.len().saturating_sub(trailing);
                    if speech_len > MIN_SPEECH_SAMPLES {
                        return Some(segment);
                    }
                    // Too short to be an utterance; treat as noise
                }
            }
        }

        None
    }

    fn reset(&mut self) {
        self.state = SegmenterState::Quiet;
        self.buffer.clear();
        self.silence_run = 0;
    }
}

/// Case-insensitive wake-phrase check against an STT transcript
#[must_use]
pub fn contains_wake_phrase(transcript: &str, phrase: &str) -> bool {
    let transcript: String = transcript
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    transcript.contains(&phrase.to_lowercase())
}

/// Cloneable pause control, usable from state callbacks
#[derive(Clone)]
pub struct WakeHandle {
    paused: Arc<AtomicBool>,
}

impl WakeHandle {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        tracing::debug!("wake detection paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        tracing::debug!("wake detection resumed");
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Continuous wake listener over microphone capture
pub struct WakeListener {
    capture: AudioCapture,
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    callback: DetectionCallback,
}

impl WakeListener {
    /// # Errors
    ///
    /// Returns error if the microphone cannot be opened.
    pub fn new(callback: DetectionCallback) -> Result<Self> {
        Ok(Self {
            capture: AudioCapture::new()?,
            paused: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            callback,
        })
    }

    /// Start capture and the detection thread
    ///
    /// # Errors
    ///
    /// Returns error if the capture stream cannot be started.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let frames = self.capture.start()?;
        self.running.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);

        let paused = Arc::clone(&self.paused);
        let running = Arc::clone(&self.running);
        let callback = Arc::clone(&self.callback);

        let worker = std::thread::Builder::new()
            .name("wake-listener".to_string())
            .spawn(move || listen_loop(&frames, &paused, &running, &callback))
            .map_err(|e| crate::Error::WakeWord(format!("failed to spawn listener: {e}")))?;

        self.worker = Some(worker);
        tracing::info!("wake listener started");
        Ok(())
    }

    /// Stop capture and join the detection thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.capture.stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        tracing::info!("wake listener stopped");
    }

    /// Suspend detection; frames keep draining
    pub fn pause(&self) {
        self.handle().pause();
    }

    /// Resume detection; rolling state is cleared by the listener thread
    pub fn resume(&self) {
        self.handle().resume();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Pause control that can be cloned into callbacks and other threads
    #[must_use]
    pub fn handle(&self) -> WakeHandle {
        WakeHandle {
            paused: Arc::clone(&self.paused),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && self.running.load(Ordering::SeqCst)
    }
}

impl Drop for WakeListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen_loop(
    frames: &Receiver<Vec<f32>>,
    paused: &AtomicBool,
    running: &AtomicBool,
    callback: &DetectionCallback,
) {
    let mut segmenter = SpeechSegmenter::new();
    let mut was_paused = false;
    let mut last_trigger: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        let frame = match frames.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if paused.load(Ordering::SeqCst) {
            // Drain but do not score
            was_paused = true;
            continue;
        }

        if was_paused {
            // Stale pre-pause audio must not trigger
            segmenter.reset();
            was_paused = false;
        }

        let Some(segment) = segmenter.feed(&frame) else {
            continue;
        };

        if let Some(at) = last_trigger
            && at.elapsed() < DEBOUNCE_WINDOW
        {
            tracing::debug!("detection debounced");
            continue;
        }
        last_trigger = Some(Instant::now());

        tracing::debug!(samples = segment.len(), "speech segment detected");
        callback(segment);
    }
}

/// RMS energy of a frame
#[allow(clippy::cast_precision_loss)]
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
