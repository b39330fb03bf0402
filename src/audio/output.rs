//! Output sinks pulling mixed audio into hardware
//!
//! Each sink owns a cpal output stream on a dedicated thread and pulls
//! the shared mixer from the driver's real-time callback. Two sinks may
//! run concurrently: the primary (virtual-cable) sink and the local
//! monitor sink on the system default device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::bounded;

use crate::audio::device::find_output_device;
use crate::constants::{MIX_CHANNELS, MIX_SAMPLE_RATE};
use crate::error::AudioError;
use crate::mixer::Mixer;

/// A running hardware output bound to the mixer as its sole sample source
pub struct OutputSink {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    device_name: Option<String>,
}

impl OutputSink {
    /// Open `device_name` (or the system default when `None`) at the
    /// mixer's fixed format and start pulling. Blocks until the stream is
    /// playing or failed.
    pub fn bind(mixer: Arc<Mixer>, device_name: Option<&str>) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let running_for_thread = running.clone();
        let running_for_loop = running.clone();
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let name_owned = device_name.map(|s| s.to_string());
        let name_for_thread = name_owned.clone();

        let handle = thread::Builder::new()
            .name("output-sink".to_string())
            .spawn(move || {
                let stream = match open_output_stream(name_for_thread.as_deref(), mixer) {
                    Ok(stream) => stream,
                    Err(e) => {
                        running_for_thread.store(false, Ordering::SeqCst);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    running_for_thread.store(false, Ordering::SeqCst);
                    let _ = ready_tx.send(Err(AudioError::DeviceInitFailed(e.to_string())));
                    return;
                }

                let _ = ready_tx.send(Ok(()));

                while running_for_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }

                // Stream dropped here, releasing the device
            })
            .map_err(|e| AudioError::DeviceInitFailed(e.to_string()))?;

        let mut sink = Self {
            running,
            thread_handle: Some(handle),
            device_name: name_owned,
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!(
                    "Output sink bound to {}",
                    sink.device_name.as_deref().unwrap_or("default device")
                );
                Ok(sink)
            }
            Ok(Err(e)) => {
                sink.stop();
                Err(e)
            }
            Err(_) => {
                sink.stop();
                Err(AudioError::DeviceInitFailed(
                    "Output thread exited before reporting readiness".to_string(),
                ))
            }
        }
    }

    /// Halt and release the stream. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_output_stream(
    device_name: Option<&str>,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream, AudioError> {
    let device = find_output_device(device_name)?;

    let config = StreamConfig {
        channels: MIX_CHANNELS,
        sample_rate: SampleRate(MIX_SAMPLE_RATE),
        buffer_size: BufferSize::Default,
    };

    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                mixer.read(data);
            },
            |err| tracing::error!("Output stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::DeviceInitFailed(e.to_string()))
}

/// Manages the primary (cable) sink and the optional local monitor sink.
///
/// The two sinks are independent: rebinding the primary on a device
/// change, or toggling the monitor, never touches the other stream.
#[derive(Default)]
pub struct SinkManager {
    primary: Option<OutputSink>,
    monitor: Option<OutputSink>,
}

impl SinkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the primary sink to the given device (or the default)
    pub fn bind_primary(
        &mut self,
        mixer: &Arc<Mixer>,
        device_name: Option<&str>,
    ) -> Result<(), AudioError> {
        if let Some(mut old) = self.primary.take() {
            old.stop();
        }
        self.primary = Some(OutputSink::bind(mixer.clone(), device_name)?);
        Ok(())
    }

    /// Tear down and recreate the primary sink on a new device, leaving
    /// the monitor sink running
    pub fn rebind_primary(
        &mut self,
        mixer: &Arc<Mixer>,
        device_name: Option<&str>,
    ) -> Result<(), AudioError> {
        self.bind_primary(mixer, device_name)
    }

    /// Add or remove the local monitor sink on the system default device
    pub fn set_monitor(&mut self, enabled: bool, mixer: &Arc<Mixer>) -> Result<(), AudioError> {
        if enabled {
            if self.monitor.is_none() {
                self.monitor = Some(OutputSink::bind(mixer.clone(), None)?);
            }
        } else if let Some(mut sink) = self.monitor.take() {
            sink.stop();
        }
        Ok(())
    }

    /// Halt and release every sink. Idempotent.
    pub fn stop_all(&mut self) {
        if let Some(mut sink) = self.primary.take() {
            sink.stop();
        }
        if let Some(mut sink) = self.monitor.take() {
            sink.stop();
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn has_monitor(&self) -> bool {
        self.monitor.is_some()
    }
}

impl Drop for SinkManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_all_when_empty_is_noop() {
        let mut sinks = SinkManager::new();
        sinks.stop_all();
        sinks.stop_all();
        assert!(!sinks.has_primary());
        assert!(!sinks.has_monitor());
    }

    #[test]
    fn test_monitor_disable_without_monitor_is_noop() {
        let mut sinks = SinkManager::new();
        let mixer = Arc::new(Mixer::new());
        sinks.set_monitor(false, &mixer).unwrap();
        assert!(!sinks.has_monitor());
    }
}
