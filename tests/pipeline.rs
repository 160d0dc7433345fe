//! Playback pipeline integration tests
//!
//! Exercises queue ordering and failure escalation without audio hardware
//! or cloud services: a recording backend captures device-write order, and
//! mock collaborators stand in for the chat model and synthesizer.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use animatron::audio::AudioBackend;
use animatron::filler::{FillerCache, FillerEntry};
use animatron::llm::{ChatMessage, ChatModel, ConversationEngine};
use animatron::{
    ConversationState, DeviceKind, DeviceTuning, OutputDevice, Pipeline, PipelineConfig,
    StateMachine, SynthesisError, VoiceSource,
};

const RATE: u32 = 44_100;

/// Records every write's label in call order instead of touching hardware
struct RecordingBackend {
    writes: Mutex<Vec<usize>>,
}

impl RecordingBackend {
    fn new() -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
        }
    }

    fn write_lengths(&self) -> Vec<usize> {
        self.writes.lock().unwrap().clone()
    }
}

impl AudioBackend for RecordingBackend {
    fn write(&self, interleaved: &[f32], _sample_rate: u32) -> animatron::Result<()> {
        self.writes.lock().unwrap().push(interleaved.len());
        Ok(())
    }

    fn is_playing(&self) -> bool {
        false
    }

    fn force_stop(&self) {}
}

/// Fixed-response chat model
struct ScriptedChat {
    response: String,
}

impl ChatModel for ScriptedChat {
    fn complete(&self, _messages: &[ChatMessage]) -> animatron::Result<String> {
        Ok(self.response.clone())
    }
}

/// Sine-producing voice source; optionally fails the first N chunks
struct ToneVoice {
    fail_first: usize,
    calls: Mutex<usize>,
}

impl ToneVoice {
    fn new(fail_first: usize) -> Self {
        Self {
            fail_first,
            calls: Mutex::new(0),
        }
    }
}

impl VoiceSource for ToneVoice {
    fn speak(&self, _text: &str) -> Result<(Vec<f32>, u32), SynthesisError> {
        let mut calls = self.calls.lock().unwrap();
        let call = *calls;
        *calls += 1;

        if call < self.fail_first {
            return Err(SynthesisError::Tts("scripted failure".to_string()));
        }

        let samples: Vec<f32> = (0..RATE / 2)
            .map(|i| {
                let t = i as f32 / RATE as f32;
                0.4 * (2.0 * std::f32::consts::PI * 330.0 * t).sin()
            })
            .collect();
        Ok((samples, RATE))
    }
}

fn filler_cache(samples_len: usize) -> Arc<FillerCache> {
    Arc::new(FillerCache::from_entries(vec![FillerEntry {
        samples: Arc::new(vec![0.1; samples_len]),
        sample_rate: RATE,
        text: "Let me think about that".to_string(),
    }]))
}

fn speaker_device() -> Arc<OutputDevice> {
    Arc::new(OutputDevice::create(DeviceKind::Speaker, DeviceTuning::default()))
}

fn build(
    backend: &Arc<RecordingBackend>,
    voice: ToneVoice,
    response: &str,
    filler_len: usize,
) -> (Pipeline, Arc<StateMachine>, ConversationEngine) {
    let state = Arc::new(StateMachine::new());
    let pipeline = Pipeline::new(
        Arc::clone(&state),
        Arc::clone(backend) as Arc<dyn AudioBackend>,
        speaker_device(),
        filler_cache(filler_len),
        Arc::new(voice),
        PipelineConfig::default(),
    );
    let engine = ConversationEngine::new(
        Box::new(ScriptedChat {
            response: response.to_string(),
        }),
        "test prompt".to_string(),
    );
    (pipeline, state, engine)
}

#[test]
fn filler_is_written_before_first_chunk() {
    let backend = Arc::new(RecordingBackend::new());
    // Filler length is distinct from chunk lengths so write order is
    // identifiable from the recorded sizes alone
    let filler_len = 1_234;
    let (pipeline, state, mut engine) =
        build(&backend, ToneVoice::new(0), "First sentence. Second sentence. Third one.", filler_len);

    state.transition(ConversationState::Listening, "wake_word");
    pipeline.handle_utterance(&mut engine, "tell me something");

    let writes = backend.write_lengths();
    assert!(writes.len() >= 2, "expected filler plus at least one chunk");
    assert_eq!(writes[0], filler_len, "filler must play first");
    for &len in &writes[1..] {
        assert_ne!(len, filler_len);
    }
}

#[test]
fn successful_response_returns_to_listening() {
    let backend = Arc::new(RecordingBackend::new());
    let (pipeline, state, mut engine) =
        build(&backend, ToneVoice::new(0), "All good. Thanks for asking!", 500);

    state.transition(ConversationState::Listening, "wake_word");
    pipeline.handle_utterance(&mut engine, "how are you");

    assert_eq!(state.state(), ConversationState::Listening);
    let history = state.history(1);
    assert_eq!(history[0].trigger, "continue_conversation");
    assert!(!pipeline.sequential_active_flag().load(Ordering::SeqCst));
}

#[test]
fn chunks_preserve_generation_order() {
    let backend = Arc::new(RecordingBackend::new());
    let (pipeline, state, mut engine) = build(
        &backend,
        ToneVoice::new(0),
        "One. Two. Three. Four. Five. Six.",
        700,
    );

    state.transition(ConversationState::Listening, "wake_word");
    pipeline.handle_utterance(&mut engine, "count");

    // 6 sentences -> 3 chunks, plus the filler
    assert_eq!(backend.write_lengths().len(), 4);
}

#[test]
fn speaking_is_entered_once_per_response() {
    let backend = Arc::new(RecordingBackend::new());
    let (pipeline, state, mut engine) = build(
        &backend,
        ToneVoice::new(0),
        "One. Two. Three. Four. Five. Six.",
        700,
    );

    state.transition(ConversationState::Listening, "wake_word");
    pipeline.handle_utterance(&mut engine, "count");

    // Three chunks played, but only the first records response_ready
    let ready = state
        .history(64)
        .into_iter()
        .filter(|t| t.trigger == "response_ready")
        .count();
    assert_eq!(ready, 1);
}

#[test]
fn three_failures_before_success_force_speaking() {
    let backend = Arc::new(RecordingBackend::new());
    // Every chunk fails; the escalation must fire and the sequence must
    // then fall back to Idle since nothing was spoken
    let (pipeline, state, mut engine) = build(
        &backend,
        ToneVoice::new(usize::MAX),
        "A. B. C. D. E. F. G. H.",
        600,
    );

    state.transition(ConversationState::Listening, "wake_word");
    pipeline.handle_utterance(&mut engine, "anything");

    let triggers: Vec<String> = state
        .history(16)
        .into_iter()
        .map(|t| t.trigger)
        .collect();
    assert!(
        triggers.contains(&"response_partial".to_string()),
        "escalation trigger missing from {triggers:?}"
    );
    assert_eq!(state.state(), ConversationState::Idle);
    assert_eq!(triggers.last().map(String::as_str), Some("generation_failed"));
}

#[test]
fn intermittent_failures_do_not_escalate_after_success() {
    let backend = Arc::new(RecordingBackend::new());
    // First chunk succeeds, rest fail: no response_partial allowed
    struct FirstOnly {
        calls: Mutex<usize>,
    }
    impl VoiceSource for FirstOnly {
        fn speak(&self, _text: &str) -> Result<(Vec<f32>, u32), SynthesisError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Ok((vec![0.2; 4_410], RATE))
            } else {
                Err(SynthesisError::Tts("late failure".to_string()))
            }
        }
    }

    let state = Arc::new(StateMachine::new());
    let pipeline = Pipeline::new(
        Arc::clone(&state),
        Arc::clone(&backend) as Arc<dyn AudioBackend>,
        speaker_device(),
        filler_cache(800),
        Arc::new(FirstOnly {
            calls: Mutex::new(0),
        }),
        PipelineConfig::default(),
    );
    let mut engine = ConversationEngine::new(
        Box::new(ScriptedChat {
            response: "A. B. C. D. E. F. G. H. I. J.".to_string(),
        }),
        "p".to_string(),
    );

    state.transition(ConversationState::Listening, "wake_word");
    pipeline.handle_utterance(&mut engine, "anything");

    let triggers: Vec<String> = state.history(32).into_iter().map(|t| t.trigger).collect();
    assert!(!triggers.contains(&"response_partial".to_string()));
    assert_eq!(state.state(), ConversationState::Listening);
}

#[test]
fn cancellation_stops_generation() {
    let backend = Arc::new(RecordingBackend::new());
    let (pipeline, state, mut engine) = build(
        &backend,
        ToneVoice::new(0),
        "One. Two. Three. Four. Five. Six. Seven. Eight.",
        900,
    );

    // Cancel lands during the filler pacing delay, before any chunk is
    // generated: at most the filler reaches the device
    state.transition(ConversationState::Listening, "wake_word");
    let cancel = pipeline.cancel_token();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(100));
        cancel.cancel();
    });
    pipeline.handle_utterance(&mut engine, "long story please");
    canceller.join().unwrap();

    assert!(backend.write_lengths().len() <= 1);
}
