//! Animatron - conversational animatronic toy driver
//!
//! Turns synthesized speech into two synchronized outputs: the voice a
//! listener hears, and an audio-rate PPM control signal that moves the
//! toy's mouth and eye servos in sync with it. Cloud latency is masked by
//! a pre-recorded filler phrase played while the response streams in.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Daemon                            │
//! │  Wake Listener │ STT │ Conversation Engine │ Recovery │
//! └───────────────────────┬──────────────────────────────┘
//!                         │ sentences
//! ┌───────────────────────▼──────────────────────────────┐
//! │              Streaming Playback Pipeline              │
//! │  filler-first FIFO │ TTS │ Channel Compositor         │
//! └───────────────────────┬──────────────────────────────┘
//!                         │ stereo: L=voice R=control
//! ┌───────────────────────▼──────────────────────────────┐
//! │   Signal Encoder (PPM) │ Lip Sync │ Eyes │ Backend    │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod daemon;
pub mod device;
pub mod error;
pub mod filler;
pub mod llm;
pub mod persona;
pub mod pipeline;
pub mod recovery;
pub mod sentiment;
pub mod signal;
pub mod state;
pub mod stt;
pub mod tts;
pub mod wake;

pub use config::Config;
pub use daemon::Daemon;
pub use device::{DeviceKind, DeviceOutput, DeviceTuning, OutputDevice};
pub use error::{Error, Result, SynthesisError};
pub use persona::Personality;
pub use pipeline::{CancelToken, Pipeline, PipelineConfig, PlaybackItem, SynthesizerVoice, VoiceSource};
pub use signal::{ChannelFrame, ChannelMatrix, PpmGenerator};
pub use state::{ConversationState, StateMachine, StateTransition};
