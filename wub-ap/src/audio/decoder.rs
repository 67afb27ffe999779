//! Audio decoder using symphonia
//!
//! Decodes MP3, FLAC, AAC, Vorbis and WAV assets to interleaved stereo f32,
//! and probes asset durations from container metadata.

use crate::audio::types::{frames_to_ms, to_stereo, DecodedAudio};
use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Simple whole-file audio decoder using symphonia.
pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode an entire audio file.
    ///
    /// # Returns
    /// Interleaved stereo f32 samples at the file's native sample rate
    ///
    /// # Errors
    /// - `AssetLoad`: file cannot be opened
    /// - `Decode`: unsupported format, no audio track, or fatal decode error
    pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
        debug!("Decoding entire file: {}", path.display());

        let (mut format, track_id, codec_params) = Self::open(path)?;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut interleaved = Vec::new();
        let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of file");
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!("Stream reset required, stopping decode");
                    break;
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Failed to read packet: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channels = spec.channels.count();

                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    interleaved.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet, skip it
                    warn!("Decode error: {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Fatal decode error: {}", e)));
                }
            }
        }

        let samples = to_stereo(&interleaved, channels);
        let audio = DecodedAudio::new(samples, sample_rate);

        debug!(
            "Decoded {} frames at {}Hz ({}ms, {} source channels)",
            audio.frames(),
            sample_rate,
            audio.duration_ms(),
            channels
        );

        Ok(audio)
    }

    /// Determine an asset's duration in milliseconds.
    ///
    /// Uses the container's frame count when present, otherwise decodes the
    /// file and counts frames.
    pub fn probe_duration_ms(path: &Path) -> Result<u64> {
        let (_format, _track_id, codec_params) = Self::open(path)?;

        if let (Some(n_frames), Some(sample_rate)) = (codec_params.n_frames, codec_params.sample_rate) {
            let duration_ms = frames_to_ms(n_frames, sample_rate);
            debug!("Probed {}: {}ms from metadata", path.display(), duration_ms);
            return Ok(duration_ms);
        }

        debug!(
            "No frame count in {}, decoding to measure duration",
            path.display()
        );
        Ok(Self::decode_file(path)?.duration_ms())
    }

    /// Open and probe a file, selecting its first audio track
    fn open(path: &Path) -> Result<(Box<dyn FormatReader>, u32, CodecParameters)> {
        let file = File::open(path)
            .map_err(|e| Error::AssetLoad(format!("Failed to open {}: {}", path.display(), e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("Failed to probe {}: {}", path.display(), e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        Ok((format, track_id, codec_params))
    }
}
