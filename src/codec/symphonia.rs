//! MP3 and generic-container decoder backed by Symphonia
//!
//! Used directly for `.mp3` and as the probe-based fallback for any
//! container the explicit decoders do not claim.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::codec::SampleDecoder;
use crate::error::PlaybackError;

/// Streaming Symphonia decoder for one audio track
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
}

impl SymphoniaDecoder {
    /// Probe and open `path`; `extension` (when known) hints the probe
    pub fn open(path: &Path, extension: Option<&str>) -> Result<Self, PlaybackError> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlaybackError::FileNotFound(path.display().to_string())
            } else {
                PlaybackError::DecodeFailed(e.to_string())
            }
        })?;

        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| PlaybackError::UnsupportedFormat(e.to_string()))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                PlaybackError::UnsupportedFormat("No decodable audio track".to_string())
            })?;

        let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
            PlaybackError::DecodeFailed("Source does not declare a sample rate".to_string())
        })?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| {
                PlaybackError::DecodeFailed("Source does not declare a channel layout".to_string())
            })?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PlaybackError::UnsupportedFormat(e.to_string()))?;

        Ok(Self {
            track_id: track.id,
            format,
            decoder,
            sample_rate,
            channels,
        })
    }
}

impl SampleDecoder for SymphoniaDecoder {
    fn next_block(&mut self) -> Result<Option<Vec<f32>>, PlaybackError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                // Symphonia signals end-of-stream through an IO error
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => return Err(PlaybackError::DecodeFailed(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    if buf.samples().is_empty() {
                        continue;
                    }
                    return Ok(Some(buf.samples().to_vec()));
                }
                // A malformed packet is skipped; the rest of the file
                // may still decode
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!("Skipping malformed packet: {}", e);
                    continue;
                }
                Err(e) => return Err(PlaybackError::DecodeFailed(e.to_string())),
            }
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}
