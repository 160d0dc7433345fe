//! Audio plumbing: codecs, resampling, and the output backend

pub mod backend;
pub mod mp3;
pub mod resample;
pub mod wav;

pub use backend::{AudioBackend, BackendPolicy, CpalBackend};
pub use mp3::decode_mp3;
pub use resample::{resample, resample_stereo};
pub use wav::{read_wav_file, samples_to_wav, write_stereo_wav};
