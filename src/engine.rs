//! Engine façade tying capture, mixing, and output together
//!
//! [`AudioEngine`] owns every moving part and is the only public entry
//! point: device enumeration and selection, the capture session
//! lifecycle, sound-effect playback, and the local monitor toggle.

use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::audio::buffer::shared_ring;
use crate::audio::capture::CapturePipeline;
use crate::audio::device::{select_default, AudioEndpoint, DeviceRegistry};
use crate::audio::output::SinkManager;
use crate::codec::open_decoder;
use crate::config::AppConfig;
use crate::constants::LEVEL_CHANNEL_CAPACITY;
use crate::error::{AudioError, Result};
use crate::mixer::{CaptureSource, Mixer, PlaybackSource, SlotId};

/// The soundboard audio engine.
///
/// A capture session goes mic thread -> ring -> mixer -> output sinks;
/// `start_capture` brings the whole chain up and `stop_capture` tears it
/// down. Between sessions only the device registry and the selected
/// device survive.
pub struct AudioEngine {
    config: AppConfig,
    registry: DeviceRegistry,
    /// Endpoint id of the chosen primary output, from the current snapshot
    selected_device: Option<String>,
    capture: Option<CapturePipeline>,
    mixer: Option<Arc<Mixer>>,
    capture_slot: Option<SlotId>,
    sinks: SinkManager,
    monitor_enabled: bool,
    level_tx: Sender<f32>,
    level_rx: Receiver<f32>,
}

impl AudioEngine {
    /// Enumerate devices and pick the initial primary output per the
    /// selection policy (cable marker, then system default, then first).
    pub fn new(config: AppConfig) -> Result<Self> {
        let registry = DeviceRegistry::new()?;
        let selected_device = select_default(registry.endpoints(), &config.devices.cable_markers)
            .map(|e| e.id.clone());

        match &selected_device {
            Some(id) => tracing::info!("Selected output endpoint {}", id),
            None => tracing::warn!("No output endpoints found"),
        }

        let (level_tx, level_rx) = bounded(LEVEL_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            registry,
            selected_device,
            capture: None,
            mixer: None,
            capture_slot: None,
            sinks: SinkManager::new(),
            monitor_enabled: false,
            level_tx,
            level_rx,
        })
    }

    /// Current snapshot of output endpoints
    pub fn output_devices(&self) -> &[AudioEndpoint] {
        self.registry.endpoints()
    }

    /// The currently selected primary output endpoint, if any
    pub fn selected_device(&self) -> Option<&AudioEndpoint> {
        self.selected_device
            .as_deref()
            .and_then(|id| self.registry.find(id))
    }

    /// Re-enumerate output endpoints. If the selected device disappeared,
    /// the selection policy runs again over the new snapshot.
    pub fn refresh_devices(&mut self) -> Result<()> {
        self.registry.refresh()?;

        let still_present = self
            .selected_device
            .as_deref()
            .map(|id| self.registry.find(id).is_some())
            .unwrap_or(false);

        if !still_present {
            self.selected_device =
                select_default(self.registry.endpoints(), &self.config.devices.cable_markers)
                    .map(|e| e.id.clone());
            tracing::info!(
                "Selected device gone after refresh, now using {:?}",
                self.selected_device
            );
        }
        Ok(())
    }

    /// Route the primary output to the endpoint with the given id.
    ///
    /// While capturing, the primary sink is rebound to the new device
    /// immediately; the monitor sink and the capture chain keep running.
    pub fn select_output_device(&mut self, id: &str) -> Result<()> {
        let endpoint = self
            .registry
            .find(id)
            .ok_or_else(|| AudioError::DeviceNotFound(id.to_string()))?;
        let name = endpoint.name.clone();

        self.selected_device = Some(endpoint.id.clone());
        tracing::info!("Primary output set to {}", name);

        if let Some(mixer) = &self.mixer {
            self.sinks.rebind_primary(mixer, Some(&name))?;
        }
        Ok(())
    }

    /// Start a capture session: open the microphone, stand up the mixer
    /// with the long-lived capture slot, and bind the primary output.
    ///
    /// A failure anywhere tears down whatever came up before it, so the
    /// engine is back to idle and `start_capture` can be retried.
    pub fn start_capture(&mut self, monitor_locally: bool) -> Result<()> {
        if self.capture.is_some() {
            return Err(AudioError::AlreadyRunning.into());
        }

        let ring = shared_ring(self.config.ring_capacity());
        let mixer = Arc::new(Mixer::new());
        let capture_slot = mixer.add_source(Box::new(CaptureSource::new(ring.clone())));

        let mut capture =
            CapturePipeline::new(ring, self.level_tx.clone(), self.config.capture.clone());
        capture.start()?;

        let primary_name = self.selected_device().map(|e| e.name.clone());
        if let Err(e) = self.sinks.bind_primary(&mixer, primary_name.as_deref()) {
            capture.stop();
            return Err(e.into());
        }

        if monitor_locally {
            // A broken default device must not take the session down
            match self.sinks.set_monitor(true, &mixer) {
                Ok(()) => self.monitor_enabled = true,
                Err(e) => tracing::warn!("Local monitoring unavailable: {}", e),
            }
        }

        self.capture = Some(capture);
        self.mixer = Some(mixer);
        self.capture_slot = Some(capture_slot);
        tracing::info!("Capture session started");
        Ok(())
    }

    /// Tear down the capture session: sinks first, then the microphone.
    /// All playing sounds end with the mixer. No-op when idle.
    pub fn stop_capture(&mut self) {
        if self.capture.is_none() && !self.sinks.has_primary() {
            return;
        }

        self.sinks.stop_all();
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.mixer = None;
        self.capture_slot = None;
        self.monitor_enabled = false;
        tracing::info!("Capture session stopped");
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Decode `path` and add it to the mix. Each call creates a new slot,
    /// so the same file can overlap with itself. The slot removes itself
    /// when the file ends; the returned id allows an early stop.
    ///
    /// Without a capture session there is no mixer to add to; the request
    /// is dropped with `Ok(None)` rather than treated as a failure.
    pub fn play_sound_file(&self, path: &Path) -> Result<Option<SlotId>> {
        let Some(mixer) = &self.mixer else {
            tracing::debug!("Ignoring playback request: {}", AudioError::MixerNotReady);
            return Ok(None);
        };

        let decoder = open_decoder(path)?;
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let source = PlaybackSource::new(decoder, label.clone())?;
        let id = mixer.add_source(Box::new(source));
        tracing::info!("Playing {} in slot {:?}", label, id);
        Ok(Some(id))
    }

    /// Stop one playing sound early. Returns false when it already ended
    /// or no session is running.
    pub fn stop_sound(&self, id: SlotId) -> bool {
        self.mixer
            .as_ref()
            .map(|m| m.remove_source(id))
            .unwrap_or(false)
    }

    /// Stop every playing sound. The microphone slot stays registered and
    /// keeps flowing. No-op when idle.
    pub fn stop_all_sounds(&self) {
        if let (Some(mixer), Some(capture_slot)) = (&self.mixer, self.capture_slot) {
            mixer.remove_sources_except(&[capture_slot]);
            tracing::info!("All sounds stopped");
        }
    }

    /// Number of active mixer slots, including the capture slot
    pub fn active_sources(&self) -> usize {
        self.mixer.as_ref().map(|m| m.source_count()).unwrap_or(0)
    }

    /// Toggle playback of the mix on the system default device. Only
    /// meaningful while capturing; toggling an idle engine does nothing.
    pub fn set_local_monitoring(&mut self, enabled: bool) -> Result<()> {
        let Some(mixer) = &self.mixer else {
            tracing::debug!("Monitor toggle ignored, no capture session");
            return Ok(());
        };
        self.sinks.set_monitor(enabled, mixer)?;
        self.monitor_enabled = enabled;
        Ok(())
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor_enabled
    }

    /// Microphone level readings in [0, 1], one per capture chunk. The
    /// channel drops readings when the consumer lags; it never blocks
    /// the capture callback.
    pub fn level_receiver(&self) -> Receiver<f32> {
        self.level_rx.clone()
    }

    /// Most recent capture stream error reported by the driver, if any
    pub fn capture_error(&self) -> Option<AudioError> {
        self.capture.as_ref().and_then(|c| c.check_errors())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop_capture();
    }
}
