//! Microphone capture
//!
//! Frames are pushed through a channel rather than accumulated in a
//! shared buffer: the wake listener must keep draining them even while
//! detection is paused, or the OS capture buffer backs up.

use crossbeam_channel::{Receiver, Sender, unbounded};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Capture rate for speech (16 kHz mono)
pub const CAPTURE_RATE: u32 = 16_000;

/// Streams mono frames from the default input device
pub struct AudioCapture {
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// # Errors
    ///
    /// Returns error if no suitable input device exists.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(CAPTURE_RATE)
                    && c.max_sample_rate() >= SampleRate(CAPTURE_RATE)
            })
            .ok_or_else(|| Error::Audio("no mono 16kHz input config found".to_string()))?;

        let config = supported.with_sample_rate(SampleRate(CAPTURE_RATE)).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = CAPTURE_RATE,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            stream: None,
        })
    }

    /// Start the stream; returns the receiving end of the frame channel.
    ///
    /// The sender lives inside the capture callback, so dropping the
    /// stream (via [`stop`](Self::stop)) disconnects the receiver.
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built.
    pub fn start(&mut self) -> Result<Receiver<Vec<f32>>> {
        if self.stream.is_some() {
            return Err(Error::Audio("capture already running".to_string()));
        }

        let (tx, rx): (Sender<Vec<f32>>, Receiver<Vec<f32>>) = unbounded();

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(data.to_vec());
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(rx)
    }

    /// Stop the stream, disconnecting the frame channel
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("audio capture stopped");
        }
    }

    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        CAPTURE_RATE
    }
}
