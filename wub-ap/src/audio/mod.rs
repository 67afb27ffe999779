//! Audio backends, decoding and resampling

pub mod backend;
pub mod decoder;
pub mod device;
pub mod headless;
pub mod resampler;
pub mod types;

pub use backend::{create_backend, AudioBackend, AudioHandle, BackendKind, OnComplete};
pub use decoder::SimpleDecoder;
pub use device::DeviceBackend;
pub use headless::{DurationProbe, HeadlessBackend, SymphoniaProbe};
pub use resampler::Resampler;
pub use types::DecodedAudio;
