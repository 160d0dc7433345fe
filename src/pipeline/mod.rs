//! Streaming playback pipeline
//!
//! Overlaps response generation with playback: a cached filler phrase is
//! queued first to mask cloud latency, then each synthesized sentence
//! chunk follows in strict FIFO order through a dedicated playback actor.
//! Generation blocks on TTS and composition while the actor blocks on the
//! device for the previous item; that overlap is the whole point.

pub mod chunker;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::audio::{AudioBackend, decode_mp3, write_stereo_wav};
use crate::device::{DeviceOutput, OutputDevice};
use crate::error::SynthesisError;
use crate::filler::{FillerCache, FillerEntry};
use crate::llm::ConversationEngine;
use crate::state::{ConversationState, StateMachine};
use crate::tts::Synthesizer;
use crate::{Error, Result};

/// Produces spoken PCM for a text chunk.
///
/// The production implementation wraps an encoded-audio synthesizer; the
/// seam exists so composition and ordering can be exercised without a
/// cloud service.
pub trait VoiceSource: Send + Sync {
    /// Speak `text`, returning mono PCM and its sample rate
    ///
    /// # Errors
    ///
    /// Returns a per-chunk failure value, never a panic.
    fn speak(&self, text: &str) -> std::result::Result<(Vec<f32>, u32), SynthesisError>;
}

/// [`VoiceSource`] over an MP3-producing [`Synthesizer`]
pub struct SynthesizerVoice {
    tts: Arc<dyn Synthesizer>,
}

impl SynthesizerVoice {
    pub fn new(tts: Arc<dyn Synthesizer>) -> Self {
        Self { tts }
    }
}

impl VoiceSource for SynthesizerVoice {
    fn speak(&self, text: &str) -> std::result::Result<(Vec<f32>, u32), SynthesisError> {
        let mp3 = self
            .tts
            .synthesize(text)
            .map_err(|e| SynthesisError::Tts(e.to_string()))?;
        decode_mp3(&mp3).map_err(|e| SynthesisError::Tts(e.to_string()))
    }
}

/// Pacing delay before the filler is queued
const FILLER_DELAY: Duration = Duration::from_millis(500);

/// Consecutive pre-success failures that force the Speaking transition
const FAILURE_ESCALATION_THRESHOLD: u32 = 3;

/// Cooperative cancellation shared by the generation and playback actors.
///
/// A new wake trigger or shutdown cancels between items; neither actor
/// checks mid-write.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// One queued playback unit, owned by whichever actor currently holds it
pub enum PlaybackItem {
    Filler {
        samples: Arc<Vec<f32>>,
        sample_rate: u32,
    },
    Chunk { output: DeviceOutput, seq: usize },
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Dump composed chunks as WAV files into this directory
    pub debug_dump_dir: Option<PathBuf>,
}

/// Orchestrates filler selection, chunked generation, and sequential playback
pub struct Pipeline {
    state: Arc<StateMachine>,
    backend: Arc<dyn AudioBackend>,
    device: Arc<OutputDevice>,
    fillers: Arc<FillerCache>,
    voice: Arc<dyn VoiceSource>,
    sequential_active: Arc<AtomicBool>,
    cancel: CancelToken,
    config: PipelineConfig,
    rng: Mutex<SmallRng>,
}

impl Pipeline {
    pub fn new(
        state: Arc<StateMachine>,
        backend: Arc<dyn AudioBackend>,
        device: Arc<OutputDevice>,
        fillers: Arc<FillerCache>,
        voice: Arc<dyn VoiceSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            state,
            backend,
            device,
            fillers,
            voice,
            sequential_active: Arc::new(AtomicBool::new(false)),
            cancel: CancelToken::new(),
            config,
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Flag read by the recovery watchdog: a multi-chunk response is still
    /// streaming, hands off.
    pub fn sequential_active_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.sequential_active)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run one full response sequence for a transcribed user utterance.
    ///
    /// Always leaves the state machine in Listening (successful response)
    /// or Idle (nothing was spoken, or the generation path failed), and
    /// always clears the sequential-playback flag.
    pub fn handle_utterance(&self, engine: &mut ConversationEngine, user_text: &str) {
        self.cancel.reset();
        self.sequential_active.store(true, Ordering::SeqCst);

        let outcome = self.run_sequence(engine, user_text);

        self.sequential_active.store(false, Ordering::SeqCst);

        match outcome {
            Ok(successes) if successes > 0 => {
                // Allow multi-turn follow-up without a fresh wake word
                self.state
                    .transition(ConversationState::Listening, "continue_conversation");
            }
            Ok(_) => {
                tracing::warn!("no response chunks were produced");
                self.state
                    .transition(ConversationState::Idle, "generation_failed");
            }
            Err(e) => {
                tracing::error!(error = %e, "response sequence failed");
                self.state.transition(ConversationState::Idle, "error");
            }
        }
    }

    /// Generation side of the sequence; returns chunk success count.
    fn run_sequence(&self, engine: &mut ConversationEngine, user_text: &str) -> Result<u32> {
        // Filler chosen before any state transition so its text can prime
        // the model
        let filler = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| Error::Audio("filler rng poisoned".to_string()))?;
            self.fillers.select(&mut rng).cloned()
        };
        let filler_text = filler.as_ref().map(|f| f.text.clone());

        if !self
            .state
            .transition(ConversationState::Processing, "utterance_received")
        {
            tracing::warn!(state = self.state.state().name(), "could not enter Processing");
        }

        let (tx, rx) = unbounded::<PlaybackItem>();
        let playback = {
            let backend = Arc::clone(&self.backend);
            let state = Arc::clone(&self.state);
            let cancel = self.cancel.clone();
            std::thread::Builder::new()
                .name("playback".to_string())
                .spawn(move || playback_worker(&rx, backend.as_ref(), &state, &cancel))
                .map_err(|e| Error::Audio(format!("failed to spawn playback actor: {e}")))?
        };

        let generated = self.generate(engine, user_text, filler, filler_text.as_deref(), &tx);

        // Dropping the sender closes the queue; the actor drains and exits
        drop(tx);
        let played = playback.join().unwrap_or_default();
        tracing::debug!(played, "playback actor drained");

        generated
    }

    fn generate(
        &self,
        engine: &mut ConversationEngine,
        user_text: &str,
        filler: Option<FillerEntry>,
        filler_text: Option<&str>,
        tx: &Sender<PlaybackItem>,
    ) -> Result<u32> {
        // Pacing delay so the filler lands a beat after speech-end rather
        // than cutting the user off
        std::thread::sleep(FILLER_DELAY);
        if let Some(entry) = filler {
            let _ = tx.send(PlaybackItem::Filler {
                samples: Arc::clone(&entry.samples),
                sample_rate: entry.sample_rate,
            });
        }

        let stream = engine.respond_chunked(user_text, filler_text)?;

        let mut successes = 0u32;
        let mut consecutive_failures = 0u32;
        let mut escalated = false;

        for (seq, (chunk, is_final)) in stream.enumerate() {
            if is_final {
                break;
            }
            if self.cancel.is_cancelled() {
                tracing::info!("generation cancelled");
                break;
            }

            match self.synthesize_chunk(&chunk) {
                Ok(output) => {
                    self.dump_chunk(seq, &output);
                    successes += 1;
                    consecutive_failures = 0;
                    if tx.send(PlaybackItem::Chunk { output, seq }).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(seq, consecutive_failures, error = %e, "chunk dropped");

                    // Bound the dead air: if nothing has played and three
                    // chunks in a row failed, stop pretending we are still
                    // thinking
                    if !escalated
                        && successes == 0
                        && consecutive_failures >= FAILURE_ESCALATION_THRESHOLD
                    {
                        escalated = true;
                        self.state
                            .transition(ConversationState::Speaking, "response_partial");
                    }
                }
            }
        }

        Ok(successes)
    }

    /// Synthesize and compose one text chunk.
    ///
    /// Failures are values the orchestrator inspects, never panics.
    fn synthesize_chunk(&self, text: &str) -> std::result::Result<DeviceOutput, SynthesisError> {
        let (voice, rate) = self.voice.speak(text)?;
        self.device
            .compose(&voice, rate, text)
            .map_err(|e| SynthesisError::Compose(e.to_string()))
    }

    fn dump_chunk(&self, seq: usize, output: &DeviceOutput) {
        let Some(dir) = &self.config.debug_dump_dir else {
            return;
        };
        let name = format!("chunk_{}_{seq:03}.wav", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(name);
        if let Err(e) = write_stereo_wav(&path, &output.samples, output.sample_rate) {
            tracing::warn!(error = %e, path = %path.display(), "debug dump failed");
        }
    }

    /// Whether the output device is mid-write (recovery check 2)
    pub fn is_playing(&self) -> bool {
        self.backend.is_playing()
    }

    /// Abort any in-progress device write
    pub fn force_stop_playback(&self) {
        self.backend.force_stop();
    }
}

/// Playback actor: drains the queue strictly in FIFO order, blocking on
/// the device per item. Device failures are logged and the queue keeps
/// moving; the actor itself never dies early.
fn playback_worker(
    rx: &Receiver<PlaybackItem>,
    backend: &dyn AudioBackend,
    state: &StateMachine,
    cancel: &CancelToken,
) -> u32 {
    let mut played = 0u32;
    let mut first_chunk = true;

    while let Ok(item) = rx.recv() {
        if cancel.is_cancelled() {
            backend.force_stop();
            continue; // keep draining so the sender never blocks
        }

        let (samples, rate, label): (&[f32], u32, &str) = match &item {
            PlaybackItem::Filler { samples, sample_rate } => (samples, *sample_rate, "filler"),
            PlaybackItem::Chunk { output, .. } => {
                // Speaking is entered once, on the first real chunk; later
                // chunks would only churn the transition history
                if first_chunk {
                    state.transition(ConversationState::Speaking, "response_ready");
                    first_chunk = false;
                }
                (&output.samples, output.sample_rate, "chunk")
            }
        };

        match backend.write(samples, rate) {
            Ok(()) => {
                played += 1;
                tracing::debug!(label, samples = samples.len(), "item played");
            }
            Err(e) => {
                tracing::warn!(label, error = %e, "device write failed, continuing queue");
            }
        }
    }

    played
}
