//! Daemon - the main toy service
//!
//! Wires capture, wake listening, STT, the conversation engine, TTS, the
//! channel compositor, and the playback pipeline together, then runs the
//! control loop until interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, unbounded};
use regex::RegexBuilder;

use crate::audio::{BackendPolicy, CpalBackend, samples_to_wav};
use crate::capture::CAPTURE_RATE;
use crate::config::Config;
use crate::device::OutputDevice;
use crate::filler::FillerCache;
use crate::llm::{ConversationEngine, OpenAiChat};
use crate::pipeline::{Pipeline, PipelineConfig, SynthesizerVoice};
use crate::recovery::{RecoveryContext, RecoveryMonitor};
use crate::state::{ConversationState, StateMachine};
use crate::stt::{Transcriber, WhisperStt, transcribe_with_retry};
use crate::tts::OpenAiTts;
use crate::wake::{WakeListener, contains_wake_phrase};
use crate::{Error, Result};

/// Main loop tick
const TICK: Duration = Duration::from_millis(100);

/// Recovery sweep interval
const RECOVERY_INTERVAL: Duration = Duration::from_secs(5);

/// Listening with no follow-up speech for this long ends the conversation
const CONVERSATION_TIMEOUT: Duration = Duration::from_secs(30);

/// The animatronic daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Validate configuration and construct the daemon.
    ///
    /// # Errors
    ///
    /// Returns error listing every configuration problem found.
    pub fn new(config: Config) -> Result<Self> {
        let device = OutputDevice::create(config.personality.device, config.personality.tuning.clone());

        let mut errors = config.validate();
        errors.extend(device.validate_configuration());
        if !errors.is_empty() {
            return Err(Error::Config(format!(
                "refusing to start: {}",
                errors.join("; ")
            )));
        }

        Ok(Self { config })
    }

    /// Run until SIGINT
    ///
    /// # Errors
    ///
    /// Returns error if a collaborator cannot be constructed.
    #[allow(clippy::too_many_lines)]
    pub fn run(self) -> Result<()> {
        let personality = &self.config.personality;
        tracing::info!(
            personality = personality.name,
            device = personality.device.name(),
            "daemon starting"
        );

        let api_key = self
            .config
            .openai_api_key
            .clone()
            .ok_or_else(|| Error::Config("missing OpenAI API key".to_string()))?;

        let state = Arc::new(StateMachine::new());
        let device = Arc::new(OutputDevice::create(
            personality.device,
            personality.tuning.clone(),
        ));
        let fillers = Arc::new(FillerCache::load(
            &self.config.filler_dir,
            &personality.name,
            personality.device.name(),
            &personality.filler_phrases,
        )?);
        let backend = Arc::new(CpalBackend::new(BackendPolicy::default())?);

        let stt = WhisperStt::new(
            api_key.clone(),
            self.config.services.stt_model.clone(),
            self.config.services.stt_language.clone(),
        );
        let tts = Arc::new(OpenAiTts::new(
            api_key.clone(),
            self.config.services.tts_model.clone(),
            personality.voice_params(),
        ));
        let mut engine = ConversationEngine::new(
            Box::new(OpenAiChat::new(api_key, self.config.services.chat_model.clone())),
            personality.system_prompt.clone(),
        );

        let pipeline = Pipeline::new(
            Arc::clone(&state),
            backend,
            device,
            fillers,
            Arc::new(SynthesizerVoice::new(tts)),
            PipelineConfig {
                debug_dump_dir: self.config.debug_dump_dir.clone(),
            },
        );
        let recovery = RecoveryMonitor::new(Arc::clone(&state), pipeline.sequential_active_flag());

        // Speech segments flow from the listener thread to the control loop
        let (segments_tx, segments_rx) = unbounded::<Vec<f32>>();
        let mut wake = WakeListener::new(Arc::new(move |segment| {
            let _ = segments_tx.send(segment);
        }))?;
        wake.start()?;

        // Playback would feed straight back into the microphone, so wake
        // detection pauses for Processing and resumes once the toy is
        // quiet again
        let wake_handle = wake.handle();
        {
            let handle = wake_handle.clone();
            state.register_callback(ConversationState::Processing, Arc::new(move || handle.pause()));
            let handle = wake_handle.clone();
            state.register_callback(ConversationState::Listening, Arc::new(move || handle.resume()));
            let handle = wake_handle.clone();
            state.register_callback(ConversationState::Idle, Arc::new(move || handle.resume()));
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        {
            let shutdown = Arc::clone(&shutdown);
            let cancel = pipeline.cancel_token();
            ctrlc::set_handler(move || {
                tracing::info!("interrupt received, shutting down");
                shutdown.store(true, Ordering::SeqCst);
                cancel.cancel();
            })
            .map_err(|e| Error::Config(format!("failed to install signal handler: {e}")))?;
        }

        tracing::info!(wake_phrase = personality.wake_phrase, "listening for wake phrase");

        let mut last_recovery = Instant::now();
        while !shutdown.load(Ordering::SeqCst) {
            match segments_rx.recv_timeout(TICK) {
                Ok(segment) => {
                    self.handle_segment(&segment, &stt, &state, &pipeline, &mut engine);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            // A conversation left hanging in Listening eventually ends
            if state.state() == ConversationState::Listening
                && state.idle_duration() > CONVERSATION_TIMEOUT
            {
                state.transition(ConversationState::Idle, "conversation_timeout");
                engine.clear_history();
            }

            if last_recovery.elapsed() >= RECOVERY_INTERVAL {
                last_recovery = Instant::now();
                recovery.sweep(&RecoveryContext {
                    wake_paused: wake_handle.is_paused(),
                    device_playing: pipeline.is_playing(),
                    resume_wake: &|| wake_handle.resume(),
                    stop_playback: &|| pipeline.force_stop_playback(),
                });
            }
        }

        wake.stop();
        tracing::info!("daemon stopped");
        Ok(())
    }

    /// Process one captured speech segment end to end
    fn handle_segment(
        &self,
        segment: &[f32],
        stt: &dyn Transcriber,
        state: &Arc<StateMachine>,
        pipeline: &Pipeline,
        engine: &mut ConversationEngine,
    ) {
        let current = state.state();
        if matches!(current, ConversationState::Processing | ConversationState::Speaking) {
            tracing::debug!(state = current.name(), "segment ignored mid-response");
            return;
        }

        let wav = match samples_to_wav(segment, CAPTURE_RATE) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode captured segment");
                return;
            }
        };

        let transcript = match transcribe_with_retry(stt, &wav) {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::debug!("segment contained no speech");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed, dropping utterance");
                if current == ConversationState::Listening {
                    state.transition(ConversationState::Idle, "transcription_failed");
                }
                return;
            }
        };
        tracing::info!(transcript, "utterance transcribed");

        let wake_phrase = &self.config.personality.wake_phrase;
        let utterance = if current == ConversationState::Idle {
            if !contains_wake_phrase(&transcript, wake_phrase) {
                tracing::debug!("no wake phrase, staying idle");
                return;
            }
            state.transition(ConversationState::Listening, "wake_word");

            match strip_wake_phrase(&transcript, wake_phrase) {
                Some(command) => command,
                None => return, // wake phrase alone; wait for the follow-up
            }
        } else {
            transcript
        };

        pipeline.handle_utterance(engine, &utterance);

        if state.state() == ConversationState::Idle {
            engine.clear_history();
        }
    }
}

/// Remove the wake phrase from a transcript, returning the remaining
/// command if any meaningful text is left.
fn strip_wake_phrase(transcript: &str, phrase: &str) -> Option<String> {
    let pattern = RegexBuilder::new(&regex::escape(phrase))
        .case_insensitive(true)
        .build()
        .ok()?;

    let stripped = pattern.replace(transcript, "");
    let command = stripped
        .trim()
        .trim_start_matches([',', '.', '!', '?'])
        .trim()
        .to_string();

    if command.split_whitespace().count() >= 2 {
        Some(command)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_wake_phrase_and_keeps_command() {
        let command = strip_wake_phrase("Hey Teddy, tell me a story", "hey teddy");
        assert_eq!(command.as_deref(), Some("tell me a story"));
    }

    #[test]
    fn bare_wake_phrase_yields_no_command() {
        assert!(strip_wake_phrase("Hey Teddy!", "hey teddy").is_none());
        assert!(strip_wake_phrase("hey teddy please", "hey teddy").is_none());
    }
}
