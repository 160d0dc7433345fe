//! Servo control signal generation
//!
//! Turns synthesized speech into the PPM control track that moves the toy:
//! lip sync derives per-frame channel values from audio and text, the eye
//! controller adds expression and blinks, and the PPM encoder renders the
//! frames into an audio-rate pulse train.

pub mod eyes;
pub mod filter;
pub mod lipsync;
pub mod ppm;

pub use eyes::EyeController;
pub use lipsync::{channel_matrix, channel_matrix_with_blink, syllable_count};
pub use ppm::{PpmGenerator, gap_us};

/// One PPM frame: 8 channel values, 0-255 each
pub type ChannelFrame = [u8; 8];

/// Ordered channel frames covering a full utterance
pub type ChannelMatrix = Vec<ChannelFrame>;

/// Eye servo channel (inverted polarity: higher = more closed)
pub const CH_EYES: usize = 1;

/// Upper jaw channel, driven at 70% of the lower jaw
pub const CH_UPPER_JAW: usize = 2;

/// Lower jaw channel, the primary mouth actuator
pub const CH_LOWER_JAW: usize = 3;
