//! Microphone capture pipeline
//!
//! Owns the input stream on a dedicated thread (cpal streams are not
//! Send). Each delivered chunk is normalized to f32, appended to the
//! shared ring, and its level is published to the UI channel without
//! ever blocking the capture callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::audio::buffer::{CaptureChunk, SharedCaptureRing};
use crate::config::CaptureConfig;
use crate::constants::{CAPTURE_CHANNELS, CAPTURE_SAMPLE_RATE};
use crate::error::AudioError;

/// Microphone capture session. At most one exists at a time; the engine
/// enforces that invariant.
pub struct CapturePipeline {
    running: Arc<AtomicBool>,
    ring: SharedCaptureRing,
    level_tx: Sender<f32>,
    config: CaptureConfig,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Option<Receiver<AudioError>>,
}

impl CapturePipeline {
    pub fn new(ring: SharedCaptureRing, level_tx: Sender<f32>, config: CaptureConfig) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            ring,
            level_tx,
            config,
            thread_handle: None,
            error_rx: None,
        }
    }

    /// Open the default input device at 48 kHz / 16-bit / mono and start
    /// delivering chunks. Blocks until the stream is playing or failed.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let (error_tx, error_rx) = bounded::<AudioError>(16);
        self.error_rx = Some(error_rx);

        let running = self.running.clone();
        let running_for_loop = self.running.clone();
        let ring = self.ring.clone();
        let level_tx = self.level_tx.clone();
        let buffer_frames = CAPTURE_SAMPLE_RATE * self.config.buffer_ms / 1000;

        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = match open_input_stream(
                    buffer_frames,
                    ring,
                    level_tx,
                    running.clone(),
                    error_tx,
                ) {
                    Ok(stream) => stream,
                    Err(e) => {
                        running.store(false, Ordering::SeqCst);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    running.store(false, Ordering::SeqCst);
                    let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                    return;
                }

                let _ = ready_tx.send(Ok(()));

                // Keep the thread (and thereby the stream) alive while running
                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }

                // Stream is dropped here, releasing the device
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.thread_handle = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!("Microphone capture started");
                Ok(())
            }
            Ok(Err(e)) => {
                self.join_thread();
                Err(e)
            }
            Err(_) => {
                self.join_thread();
                Err(AudioError::StreamError(
                    "Capture thread exited before reporting readiness".to_string(),
                ))
            }
        }
    }

    /// Halt the stream and release the device. No-op when not running.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) && self.thread_handle.is_none() {
            return;
        }
        self.join_thread();
        tracing::info!("Microphone capture stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Most recent stream error reported by the driver, if any
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_input_stream(
    buffer_frames: u32,
    ring: SharedCaptureRing,
    level_tx: Sender<f32>,
    running: Arc<AtomicBool>,
    error_tx: Sender<AudioError>,
) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| AudioError::DeviceNotFound("No default input device".to_string()))?;

    let data_callback = {
        let running = running.clone();
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            if !running.load(Ordering::Relaxed) {
                return;
            }

            let samples: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();

            let level = chunk_level(data);
            // Fire-and-forget: a slow UI drops readings, never stalls capture
            let _ = level_tx.try_send(level);

            ring.push(CaptureChunk::new(samples));
        }
    };

    let error_callback = move |err: cpal::StreamError| {
        let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
    };

    let mut config = StreamConfig {
        channels: CAPTURE_CHANNELS,
        sample_rate: SampleRate(CAPTURE_SAMPLE_RATE),
        buffer_size: BufferSize::Fixed(buffer_frames),
    };

    // Some hosts reject fixed buffer sizes; retry with the driver default
    match device.build_input_stream(&config, data_callback.clone(), error_callback.clone(), None) {
        Ok(stream) => Ok(stream),
        Err(e) => {
            tracing::warn!(
                "Fixed capture buffer of {} frames rejected ({}), using driver default",
                buffer_frames,
                e
            );
            config.buffer_size = BufferSize::Default;
            device
                .build_input_stream(&config, data_callback, error_callback, None)
                .map_err(|e| AudioError::StreamError(e.to_string()))
        }
    }
}

/// Normalized instantaneous level of one i16 chunk: mean absolute
/// amplitude over full scale, in [0, 1]
fn chunk_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|&s| (s as f32).abs()).sum();
    sum / samples.len() as f32 / 32768.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::shared_ring;

    #[test]
    fn test_level_silence_is_zero() {
        assert_eq!(chunk_level(&[0; 480]), 0.0);
        assert_eq!(chunk_level(&[]), 0.0);
    }

    #[test]
    fn test_level_full_scale_is_one() {
        let level = chunk_level(&[i16::MIN; 480]);
        assert!((level - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_level_half_scale() {
        let level = chunk_level(&[16384; 480]);
        assert!((level - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_level_is_sign_independent() {
        let pos = chunk_level(&[12000; 100]);
        let neg = chunk_level(&[-12000; 100]);
        assert!((pos - neg).abs() < 1e-6);
    }

    #[test]
    fn test_stop_when_not_running_is_noop() {
        let (level_tx, _level_rx) = bounded(8);
        let mut pipeline = CapturePipeline::new(shared_ring(4), level_tx, CaptureConfig::default());
        pipeline.stop();
        pipeline.stop();
        assert!(!pipeline.is_running());
    }
}
