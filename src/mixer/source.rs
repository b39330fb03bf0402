//! Mixer input sources
//!
//! A source fills interleaved stereo buffers at the mixer's fixed format
//! and reports exhaustion through its return value; the mixer, not the
//! source, performs the removal. Ownership stays one-way.

use std::collections::VecDeque;

use crate::audio::buffer::SharedCaptureRing;
use crate::codec::convert::FormatConverter;
use crate::codec::SampleDecoder;
use crate::error::PlaybackError;

/// Result of one pull from a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRead {
    /// The first `n` samples of the buffer were written
    Samples(usize),
    /// No further samples will ever be produced
    Exhausted,
}

/// One audio source feeding the mixer, pulled from output callbacks
pub trait MixSource: Send {
    /// Fill `out` with interleaved stereo samples at the mix rate.
    ///
    /// After returning [`SourceRead::Exhausted`] once, the source must
    /// never be read again.
    fn read(&mut self, out: &mut [f32]) -> SourceRead;
}

/// The long-lived microphone slot: drains the capture ring, up-mixes mono
/// to stereo, and substitutes silence on underrun. Never exhausts.
pub struct CaptureSource {
    ring: SharedCaptureRing,
    pending: VecDeque<f32>,
}

impl CaptureSource {
    pub fn new(ring: SharedCaptureRing) -> Self {
        Self {
            ring,
            pending: VecDeque::new(),
        }
    }
}

impl MixSource for CaptureSource {
    fn read(&mut self, out: &mut [f32]) -> SourceRead {
        for frame in out.chunks_mut(2) {
            if self.pending.is_empty() {
                if let Some(chunk) = self.ring.pop() {
                    self.pending.extend(chunk.samples);
                }
            }
            // Underrun yields silence; the mic slot stays registered
            let sample = self.pending.pop_front().unwrap_or(0.0);
            for channel in frame.iter_mut() {
                *channel = sample;
            }
        }
        SourceRead::Samples(out.len())
    }
}

/// A transient sound-effect slot: an open decoder behind a format
/// converter, plus a completion flag.
///
/// The underlying decode resource is released exactly once, on the same
/// read that detects exhaustion; afterwards every read reports
/// [`SourceRead::Exhausted`] without touching anything.
pub struct PlaybackSource {
    converter: Option<FormatConverter>,
    label: String,
}

impl PlaybackSource {
    pub fn new(decoder: Box<dyn SampleDecoder>, label: String) -> Result<Self, PlaybackError> {
        let converter = FormatConverter::new(decoder)?;
        Ok(Self {
            converter: Some(converter),
            label,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl MixSource for PlaybackSource {
    fn read(&mut self, out: &mut [f32]) -> SourceRead {
        let Some(converter) = self.converter.as_mut() else {
            return SourceRead::Exhausted;
        };

        match converter.fill(out) {
            Ok(0) => {
                // Dropping the converter closes the decode resource
                self.converter = None;
                tracing::debug!("Playback of {} finished", self.label);
                SourceRead::Exhausted
            }
            Ok(n) => SourceRead::Samples(n),
            Err(e) => {
                // A corrupt file ends its own slot and nothing else
                self.converter = None;
                tracing::warn!("Playback of {} aborted: {}", self.label, e);
                SourceRead::Exhausted
            }
        }
    }
}
