//! Pre-synthesized filler phrases
//!
//! Fillers are short clips played immediately after speech-end to mask
//! cloud latency. All audio for the active personality+device pair is
//! decoded into memory at startup; runtime selection is an O(1) random
//! pick with no disk I/O.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;
use rand::rngs::SmallRng;

use crate::audio::{read_wav_file, resample_stereo};
use crate::device::PPM_NATIVE_RATE;
use crate::{Error, Result};

/// One preloaded filler clip: interleaved stereo audio plus its text
#[derive(Debug, Clone)]
pub struct FillerEntry {
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
    pub text: String,
}

/// In-memory filler store for one personality+device pair
pub struct FillerCache {
    entries: Vec<FillerEntry>,
}

impl FillerCache {
    /// Load every WAV under `<base>/<personality>/<device>/`, pairing files
    /// with `phrases` in sorted-filename order.
    ///
    /// Mono files are duplicated to stereo; everything is resampled to the
    /// composition rate so the playback actor never switches rates between
    /// the filler and the first chunk.
    ///
    /// # Errors
    ///
    /// Returns error if the directory is unreadable or contains no WAVs.
    pub fn load(base: &Path, personality: &str, device: &str, phrases: &[String]) -> Result<Self> {
        let dir = base.join(personality).join(device);
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| Error::Config(format!("filler dir {}: {e}", dir.display())))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "wav"))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(Error::Config(format!(
                "no filler audio in {}",
                dir.display()
            )));
        }

        let mut entries = Vec::with_capacity(paths.len());
        for (i, path) in paths.iter().enumerate() {
            let (samples, channels, rate) = read_wav_file(path)?;
            let stereo = match channels {
                1 => {
                    let mut out = Vec::with_capacity(samples.len() * 2);
                    for s in samples {
                        out.push(s);
                        out.push(s);
                    }
                    out
                }
                2 => samples,
                n => {
                    return Err(Error::Config(format!(
                        "{}: unsupported channel count {n}",
                        path.display()
                    )));
                }
            };
            let stereo = resample_stereo(&stereo, rate, PPM_NATIVE_RATE)?;

            entries.push(FillerEntry {
                samples: Arc::new(stereo),
                sample_rate: PPM_NATIVE_RATE,
                text: phrases.get(i).cloned().unwrap_or_default(),
            });
        }

        tracing::info!(count = entries.len(), personality, device, "filler cache loaded");
        Ok(Self { entries })
    }

    /// Build a cache from already-decoded entries (tests, offline tools)
    pub fn from_entries(entries: Vec<FillerEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick one filler at random
    pub fn select(&self, rng: &mut SmallRng) -> Option<&FillerEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.entries.len());
        self.entries.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn entry(text: &str) -> FillerEntry {
        FillerEntry {
            samples: Arc::new(vec![0.0; 882]),
            sample_rate: PPM_NATIVE_RATE,
            text: text.to_string(),
        }
    }

    #[test]
    fn selects_from_all_entries() {
        let cache = FillerCache::from_entries(vec![entry("a"), entry("b"), entry("c")]);
        let mut rng = SmallRng::seed_from_u64(7);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            seen.insert(cache.select(&mut rng).unwrap().text.clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn empty_cache_selects_nothing() {
        let cache = FillerCache::from_entries(Vec::new());
        let mut rng = SmallRng::seed_from_u64(7);
        assert!(cache.select(&mut rng).is_none());
    }
}
