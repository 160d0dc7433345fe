//! Eye channel control with a blink state machine
//!
//! The eye servo command has inverted polarity: a higher numeric value
//! drives the eyelids further closed. The controller works in "openness"
//! space (0 = closed, 1 = open) and inverts on output.
//!
//! The first and last frames of an utterance are pinned to the personality's
//! base position so every interaction starts and ends with a known face.

use rand::Rng;
use rand::rngs::SmallRng;

/// Frames pinned to the base position at each end of the utterance
pub const PINNED_FRAMES: usize = 3;

/// Sentiment modulation range of the eye target
const SENTIMENT_RANGE: f32 = 0.08;

/// Blink phase durations in frames
const CLOSING_FRAMES: usize = 5;
const HELD_FRAMES: usize = 2;
const OPENING_FRAMES: usize = 5;

/// Chance per eligible frame of starting a blink
pub const BLINK_PROBABILITY: f32 = 0.008;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlinkPhase {
    Idle,
    Closing,
    Held,
    Opening,
}

/// Per-utterance eye command generator
pub struct EyeController {
    base: f32,
    sentiment: f32,
    blink_probability: f32,
    rng: SmallRng,
    phase: BlinkPhase,
    phase_frame: usize,
    openness: f32,
    pre_blink: f32,
    blink_count: usize,
}

impl EyeController {
    /// Create a controller for one utterance.
    ///
    /// `base` is the personality's eye openness in [0, 1]; `sentiment` in
    /// [-1, 1] nudges the target. Tests pass `blink_probability` 0.0 for
    /// deterministic output.
    #[must_use]
    pub fn new(base: f32, sentiment: f32, blink_probability: f32, rng: SmallRng) -> Self {
        let base = base.clamp(0.0, 1.0);
        Self {
            base,
            sentiment: sentiment.clamp(-1.0, 1.0),
            blink_probability,
            rng,
            phase: BlinkPhase::Idle,
            phase_frame: 0,
            openness: base,
            pre_blink: base,
            blink_count: 0,
        }
    }

    /// Blinks started so far
    #[must_use]
    pub const fn blink_count(&self) -> usize {
        self.blink_count
    }

    /// Sentiment-adjusted eye target, before the open floor
    fn target(&self) -> f32 {
        (self.base + self.sentiment * SENTIMENT_RANGE).clamp(0.0, 1.0)
    }

    /// Minimum openness outside a blink
    fn open_floor(&self) -> f32 {
        (self.base * 0.85).max(0.75)
    }

    /// Servo command for frame `frame_idx` of `total_frames`.
    ///
    /// Returns the polarity-inverted 0-255 command value.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn command(&mut self, frame_idx: usize, total_frames: usize) -> u8 {
        let pinned =
            frame_idx < PINNED_FRAMES || frame_idx + PINNED_FRAMES >= total_frames;

        if pinned {
            // Known position at utterance boundaries; abort any blink
            self.phase = BlinkPhase::Idle;
            self.phase_frame = 0;
            self.openness = self.base;
            return Self::invert(self.base);
        }

        match self.phase {
            BlinkPhase::Idle => {
                if self.rng.r#gen::<f32>() < self.blink_probability {
                    self.pre_blink = self.openness;
                    self.phase = BlinkPhase::Closing;
                    self.phase_frame = 0;
                    self.blink_count += 1;
                } else {
                    self.openness = self.target().max(self.open_floor()).min(1.0);
                }
            }
            BlinkPhase::Closing => {
                self.phase_frame += 1;
                let t = self.phase_frame as f32 / CLOSING_FRAMES as f32;
                self.openness = self.pre_blink * (1.0 - t);
                if self.phase_frame >= CLOSING_FRAMES {
                    self.phase = BlinkPhase::Held;
                    self.phase_frame = 0;
                }
            }
            BlinkPhase::Held => {
                self.phase_frame += 1;
                self.openness = 0.0;
                if self.phase_frame >= HELD_FRAMES {
                    self.phase = BlinkPhase::Opening;
                    self.phase_frame = 0;
                }
            }
            BlinkPhase::Opening => {
                self.phase_frame += 1;
                let t = self.phase_frame as f32 / OPENING_FRAMES as f32;
                // Reopen toward the freshly recomputed target
                let reopened = self.target().max(self.open_floor());
                self.openness = reopened * t;
                if self.phase_frame >= OPENING_FRAMES {
                    self.phase = BlinkPhase::Idle;
                    self.phase_frame = 0;
                }
            }
        }

        Self::invert(self.openness)
    }

    /// Map openness to the inverted-polarity servo command
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn invert(openness: f32) -> u8 {
        ((1.0 - openness.clamp(0.0, 1.0)) * 255.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn controller(base: f32, sentiment: f32, p: f32) -> EyeController {
        EyeController::new(base, sentiment, p, SmallRng::seed_from_u64(7))
    }

    #[test]
    fn boundary_frames_are_pinned() {
        let total = 60;
        let base = 0.9f32;
        let expected = ((1.0 - base) * 255.0).round() as u8;

        // Sentiment must not affect pinned frames
        for sentiment in [-1.0, 0.0, 1.0] {
            let mut eyes = controller(base, sentiment, 0.0);
            let commands: Vec<u8> = (0..total).map(|i| eyes.command(i, total)).collect();
            for i in 0..3 {
                assert_eq!(commands[i], expected, "frame {i} should be pinned");
                assert_eq!(commands[total - 1 - i], expected, "tail frame should be pinned");
            }
        }
    }

    #[test]
    fn stays_mostly_open_without_blinks() {
        let mut eyes = controller(0.9, 0.0, 0.0);
        for i in 0..200 {
            let cmd = eyes.command(i, 200);
            // openness >= 0.765 -> command <= 60
            assert!(cmd <= 60, "frame {i}: command {cmd} implies too-closed eyes");
        }
        assert_eq!(eyes.blink_count(), 0);
    }

    #[test]
    fn forced_blink_closes_then_reopens() {
        // Probability 1.0 triggers a blink on the first eligible frame
        let mut eyes = controller(0.9, 0.0, 1.0);
        let total = 40;

        for i in 0..3 {
            eyes.command(i, total);
        }

        // Frame 3 starts the blink (Closing phase entered, first step down)
        let mut commands = Vec::new();
        for i in 3..(3 + CLOSING_FRAMES + HELD_FRAMES + OPENING_FRAMES) {
            commands.push(eyes.command(i, total));
        }
        assert!(eyes.blink_count() >= 1);

        // Held phase hits fully closed (command 255)
        assert!(commands.contains(&255), "blink should fully close the eyes");

        // Closing commands increase (eyes closing), opening commands decrease
        let closing = &commands[..CLOSING_FRAMES];
        assert!(closing.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn sentiment_shifts_target_between_pins() {
        let mut happy = controller(0.8, 1.0, 0.0);
        let mut sad = controller(0.8, -1.0, 0.0);
        let total = 30;
        for i in 0..10 {
            happy.command(i, total);
            sad.command(i, total);
        }
        // Happier = more open = lower command
        assert!(happy.command(10, total) <= sad.command(10, total));
    }
}
