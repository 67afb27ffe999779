//! Audible audio backend using cpal
//!
//! Each `load_and_play` spawns a dedicated output thread. The thread decodes
//! the whole asset, resamples it to the device rate, then owns the cpal
//! stream until the asset finishes or the handle is stopped. Control flows
//! through a shared atomic cursor (read by the realtime callback) plus a
//! channel back to the output thread.

use crate::audio::backend::{AudioBackend, AudioHandle, BackendKind, OnComplete};
use crate::audio::decoder::SimpleDecoder;
use crate::audio::resampler::Resampler;
use crate::audio::types::{frames_to_ms, ms_to_frames};
use crate::error::{Error, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Backend playing through the system output device
pub struct DeviceBackend {
    /// Requested output device (None = system default)
    device_name: Option<String>,
}

impl DeviceBackend {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    /// True when the host exposes a default output device
    pub fn has_output_device() -> bool {
        cpal::default_host().default_output_device().is_some()
    }

    /// Find the requested device, falling back to the default device.
    fn open_device(device_name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                return Ok(device);
            }

            warn!(
                "Requested device '{}' not found, falling back to default device",
                name
            );
        }

        host.default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
    }

    /// Prefer stereo f32 at the device's default rate.
    fn get_best_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let default_config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let rate = default_config.sample_rate();

        let preferred = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .find(|config| {
                config.channels() == 2
                    && config.sample_format() == SampleFormat::F32
                    && config.min_sample_rate() <= rate
                    && config.max_sample_rate() >= rate
            });

        if let Some(supported) = preferred {
            let sample_format = supported.sample_format();
            return Ok((supported.with_sample_rate(rate).config(), sample_format));
        }

        let sample_format = default_config.sample_format();
        Ok((default_config.config(), sample_format))
    }
}

#[async_trait]
impl AudioBackend for DeviceBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Device
    }

    async fn initialize(&self) -> Result<()> {
        let device = Self::open_device(self.device_name.as_deref())?;
        let (config, sample_format) = Self::get_best_config(&device)?;

        info!(
            "Using audio device: {} ({}Hz, {} channels, {:?})",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate.0,
            config.channels,
            sample_format
        );
        Ok(())
    }

    async fn load_and_play(
        &self,
        path: &Path,
        volume: f32,
        on_complete: OnComplete,
    ) -> Result<Box<dyn AudioHandle>> {
        let cursor = Arc::new(Cursor::default());
        let (control_tx, control_rx) = mpsc::channel();
        let (ack_tx, ack_rx) = oneshot::channel();

        let job = OutputJob {
            path: path.to_path_buf(),
            volume: volume.clamp(0.0, 1.0),
            device_name: self.device_name.clone(),
            cursor: Arc::clone(&cursor),
            finished_tx: control_tx.clone(),
        };

        std::thread::Builder::new()
            .name("wub-output".to_string())
            .spawn(move || run_output(job, control_rx, ack_tx, on_complete))
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {}", e)))?;

        let loaded = ack_rx
            .await
            .map_err(|_| Error::AudioOutput("Output thread exited during startup".to_string()))??;

        Ok(Box::new(DeviceHandle {
            cursor,
            control: control_tx,
            loaded,
        }))
    }
}

/// Playback position shared with the realtime callback
#[derive(Default)]
struct Cursor {
    frame: AtomicU64,
    paused: AtomicBool,
    stopped: AtomicBool,
    finished: AtomicBool,
}

enum Control {
    /// Callback wrote the last frame
    Finished,
    /// Handle stopped or dropped
    Stop,
}

#[derive(Debug, Clone, Copy)]
struct Loaded {
    sample_rate: u32,
    total_frames: u64,
    duration_ms: u64,
}

struct OutputJob {
    path: PathBuf,
    volume: f32,
    device_name: Option<String>,
    cursor: Arc<Cursor>,
    finished_tx: mpsc::Sender<Control>,
}

/// Body of the output thread: start the stream, report startup, then wait
/// for the end of the asset or a stop.
fn run_output(
    job: OutputJob,
    control_rx: mpsc::Receiver<Control>,
    ack_tx: oneshot::Sender<Result<Loaded>>,
    on_complete: OnComplete,
) {
    let cursor = Arc::clone(&job.cursor);

    let (stream, loaded) = match start_stream(job) {
        Ok(started) => started,
        Err(e) => {
            let _ = ack_tx.send(Err(e));
            return;
        }
    };

    if ack_tx.send(Ok(loaded)).is_err() {
        debug!("Playback request abandoned during startup");
        return;
    }

    while let Ok(msg) = control_rx.recv() {
        match msg {
            Control::Finished => {
                if !cursor.stopped.load(Ordering::SeqCst) {
                    on_complete();
                }
                break;
            }
            Control::Stop => break,
        }
    }

    if let Err(e) = stream.pause() {
        warn!("Failed to pause stream: {}", e);
    }
    debug!("Output thread exiting");
}

fn start_stream(job: OutputJob) -> Result<(Stream, Loaded)> {
    let device = DeviceBackend::open_device(job.device_name.as_deref())?;
    let (config, sample_format) = DeviceBackend::get_best_config(&device)?;
    let output_rate = config.sample_rate.0;

    let decoded = SimpleDecoder::decode_file(&job.path)?;
    let samples = Resampler::resample(&decoded.samples, decoded.sample_rate, output_rate, 2)?;

    let total_frames = (samples.len() / 2) as u64;
    let loaded = Loaded {
        sample_rate: output_rate,
        total_frames,
        duration_ms: frames_to_ms(total_frames, output_rate),
    };

    let source = Arc::new(samples);
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, source, &job)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, source, &job)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, source, &job)?,
        sample_format => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                sample_format
            )));
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

    info!(
        "Playing {} ({}ms at {}Hz)",
        job.path.display(),
        loaded.duration_ms,
        output_rate
    );

    Ok((stream, loaded))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    source: Arc<Vec<f32>>,
    job: &OutputJob,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let volume = job.volume;
    let cursor = Arc::clone(&job.cursor);
    let finished_tx = job.finished_tx.clone();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if write_output(data, channels, &source, &cursor, volume) {
                    let _ = finished_tx.send(Control::Finished);
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

/// Fill one device buffer from the stereo `source` at the cursor.
///
/// Returns true exactly once, for the buffer that reaches the end.
fn write_output<T>(
    data: &mut [T],
    channels: usize,
    source: &[f32],
    cursor: &Cursor,
    volume: f32,
) -> bool
where
    T: SizedSample + FromSample<f32>,
{
    let silent = cursor.paused.load(Ordering::Acquire)
        || cursor.stopped.load(Ordering::Acquire)
        || cursor.finished.load(Ordering::Acquire);

    if silent || channels == 0 {
        data.fill(T::EQUILIBRIUM);
        return false;
    }

    let total_frames = (source.len() / 2) as u64;
    let start = cursor.frame.load(Ordering::Acquire);
    let mut frame_idx = start;

    for out in data.chunks_mut(channels) {
        if frame_idx >= total_frames {
            out.fill(T::EQUILIBRIUM);
            continue;
        }

        let base = frame_idx as usize * 2;
        let left = (source[base] * volume).clamp(-1.0, 1.0);
        let right = (source[base + 1] * volume).clamp(-1.0, 1.0);

        out[0] = T::from_sample(left);
        if channels > 1 {
            out[1] = T::from_sample(right);
            for extra in out.iter_mut().skip(2) {
                *extra = T::EQUILIBRIUM;
            }
        }
        frame_idx += 1;
    }

    // A concurrent seek wins over this buffer's advance
    if cursor
        .frame
        .compare_exchange(start, frame_idx, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return false;
    }

    frame_idx >= total_frames && !cursor.finished.swap(true, Ordering::AcqRel)
}

/// Handle to one asset playing on the output device
pub struct DeviceHandle {
    cursor: Arc<Cursor>,
    control: mpsc::Sender<Control>,
    loaded: Loaded,
}

impl AudioHandle for DeviceHandle {
    fn pause(&self) -> Result<()> {
        self.cursor.paused.store(true, Ordering::Release);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.cursor.paused.store(false, Ordering::Release);
        Ok(())
    }

    fn seek(&self, position_ms: u64) -> Result<u64> {
        let applied = position_ms.min(self.loaded.duration_ms);
        let frame = ms_to_frames(applied, self.loaded.sample_rate).min(self.loaded.total_frames);
        self.cursor.frame.store(frame, Ordering::Release);
        Ok(applied)
    }

    fn stop(&self) -> Result<()> {
        if !self.cursor.stopped.swap(true, Ordering::AcqRel) {
            // Output thread may already be gone after natural completion
            let _ = self.control.send(Control::Stop);
        }
        Ok(())
    }

    fn position_ms(&self) -> u64 {
        let frame = self
            .cursor
            .frame
            .load(Ordering::Acquire)
            .min(self.loaded.total_frames);
        frames_to_ms(frame, self.loaded.sample_rate)
    }

    fn duration_ms(&self) -> Option<u64> {
        Some(self.loaded.duration_ms)
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
