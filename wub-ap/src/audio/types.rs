//! Core audio data types

/// Fully decoded asset held in RAM.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Stereo interleaved: [L, R, L, R, ...]
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of stereo frames
    pub fn frames(&self) -> u64 {
        (self.samples.len() / 2) as u64
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        frames_to_ms(self.frames(), self.sample_rate)
    }
}

/// Convert a frame count to milliseconds at `sample_rate`
pub fn frames_to_ms(frames: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    let ms = u128::from(frames) * 1000 / u128::from(sample_rate);
    u64::try_from(ms).unwrap_or(u64::MAX)
}

/// Convert milliseconds to a frame count at `sample_rate`
pub fn ms_to_frames(ms: u64, sample_rate: u32) -> u64 {
    let frames = u128::from(ms) * u128::from(sample_rate) / 1000;
    u64::try_from(frames).unwrap_or(u64::MAX)
}

/// Fold interleaved audio with any channel count down (or up) to stereo.
///
/// Mono is duplicated to both sides; channels beyond the first two are dropped.
pub fn to_stereo(interleaved: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        2 => interleaved.to_vec(),
        1 => interleaved.iter().flat_map(|&s| [s, s]).collect(),
        n => interleaved
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}
