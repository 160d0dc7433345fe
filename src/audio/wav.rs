//! WAV encode/decode helpers

use std::path::Path;

use crate::{Error, Result};

/// Convert mono f32 samples to 16-bit WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Read a WAV file into interleaved f32 samples.
///
/// Returns `(samples, channels, sample_rate)`. Integer formats are
/// normalized to [-1, 1].
///
/// # Errors
///
/// Returns error if the file cannot be read or decoded.
pub fn read_wav_file(path: &Path) -> Result<(Vec<f32>, u16, u32)> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| Error::Audio(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let max = f32::from(i16::MAX);
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| f32::from(v) / max))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| Error::Audio(e.to_string()))?,
                32 => reader
                    .samples::<i32>()
                    .map(|s| {
                        #[allow(clippy::cast_precision_loss)]
                        s.map(|v| v as f32 / 2_147_483_648.0)
                    })
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| Error::Audio(e.to_string()))?,
                bits => {
                    return Err(Error::Audio(format!("unsupported WAV bit depth: {bits}")));
                }
            }
        }
    };

    Ok((samples, spec.channels, spec.sample_rate))
}

/// Write interleaved stereo f32 samples as a 16-bit WAV file (debug dumps)
///
/// # Errors
///
/// Returns error if the file cannot be written.
pub fn write_stereo_wav(path: &Path, interleaved: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| Error::Audio(format!("{}: {e}", path.display())))?;
    for &sample in interleaved {
        #[allow(clippy::cast_possible_truncation)]
        let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(sample_i16)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }
    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_is_valid() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0, -1.0];
        let wav = samples_to_wav(&samples, 16000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > 44);
    }

    #[test]
    fn stereo_wav_roundtrip() {
        let dir = std::env::temp_dir();
        let path = dir.join("animatron_test_stereo.wav");
        let interleaved: Vec<f32> = (0..200).map(|i| f32::from(i16::from(i % 2 == 0)) * 0.5).collect();

        write_stereo_wav(&path, &interleaved, 44100).unwrap();
        let (samples, channels, rate) = read_wav_file(&path).unwrap();

        assert_eq!(channels, 2);
        assert_eq!(rate, 44100);
        assert_eq!(samples.len(), interleaved.len());

        let _ = std::fs::remove_file(&path);
    }
}
