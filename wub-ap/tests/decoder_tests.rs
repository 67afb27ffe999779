//! Decoder and duration probe tests against generated WAV files

mod helpers;

use helpers::{generate_mono_wav, generate_sine_wav};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wub_ap::audio::{
    AudioBackend, AudioHandle, DurationProbe, HeadlessBackend, SimpleDecoder, SymphoniaProbe,
};
use wub_ap::Error;

#[test]
fn test_decode_stereo_wav() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    generate_sine_wav(&path, 44_100, 500, 440.0).unwrap();

    let audio = SimpleDecoder::decode_file(&path).unwrap();

    assert_eq!(audio.sample_rate, 44_100);
    assert_eq!(audio.frames(), 22_050);
    assert_eq!(audio.duration_ms(), 500);
    assert!(audio.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    assert!(audio.samples.iter().any(|s| s.abs() > 0.1));
}

#[test]
fn test_decode_mono_wav_duplicates_channels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mono.wav");
    generate_mono_wav(&path, 22_050, 1_000, 220.0).unwrap();

    let audio = SimpleDecoder::decode_file(&path).unwrap();

    assert_eq!(audio.sample_rate, 22_050);
    assert_eq!(audio.frames(), 22_050);
    assert!(audio
        .samples
        .chunks_exact(2)
        .all(|frame| frame[0] == frame[1]));
}

#[test]
fn test_probe_duration_from_metadata() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bowl.wav");
    generate_sine_wav(&path, 48_000, 2_500, 330.0).unwrap();

    assert_eq!(SimpleDecoder::probe_duration_ms(&path).unwrap(), 2_500);
    assert_eq!(SymphoniaProbe.duration_ms(&path).unwrap(), 2_500);
}

#[test]
fn test_missing_file_is_asset_load_error() {
    let result = SimpleDecoder::decode_file(Path::new("/nonexistent/narration.mp3"));
    assert!(matches!(result, Err(Error::AssetLoad(_))));

    let result = SimpleDecoder::probe_duration_ms(Path::new("/nonexistent/narration.mp3"));
    assert!(matches!(result, Err(Error::AssetLoad(_))));
}

#[test]
fn test_garbage_file_is_decode_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.wav");
    std::fs::write(&path, b"this is not audio at all").unwrap();

    let result = SimpleDecoder::decode_file(&path);
    assert!(matches!(result, Err(Error::Decode(_))));
}

#[tokio::test(start_paused = true)]
async fn test_headless_backend_plays_real_asset() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    generate_sine_wav(&path, 44_100, 500, 440.0).unwrap();

    let backend = HeadlessBackend::new(Arc::new(SymphoniaProbe));
    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = backend
        .load_and_play(
            &path,
            1.0,
            Box::new(move || {
                let _ = tx.send(());
            }),
        )
        .await
        .unwrap();

    assert_eq!(handle.duration_ms(), Some(500));

    tokio::time::sleep(Duration::from_millis(510)).await;
    assert!(rx.await.is_ok());
    assert_eq!(handle.position_ms(), 500);
}

#[tokio::test]
async fn test_headless_backend_rejects_missing_asset() {
    let backend = HeadlessBackend::new(Arc::new(SymphoniaProbe));

    let result = backend
        .load_and_play(Path::new("/nonexistent/bowl.mp3"), 1.0, Box::new(|| {}))
        .await;

    assert!(matches!(result, Err(Error::AssetLoad(_))));
    assert_eq!(backend.active_handles(), 0);
}
