//! Sound-file decoders
//!
//! Decoder selection is by file extension: `.wav` goes to the hound
//! reader, `.mp3` to Symphonia's MP3 codec, and anything else through
//! Symphonia's format probe as a generic fallback.

pub mod convert;
pub mod symphonia;
pub mod wav;

use std::path::Path;

use crate::error::PlaybackError;

pub use convert::FormatConverter;
pub use symphonia::SymphoniaDecoder;
pub use wav::WavDecoder;

/// A streaming decode resource producing interleaved f32 blocks in the
/// file's native format. Dropping the decoder releases the resource.
pub trait SampleDecoder: Send {
    /// Next block of interleaved samples, `None` at end-of-stream
    fn next_block(&mut self) -> Result<Option<Vec<f32>>, PlaybackError>;

    /// Native sample rate of the source
    fn sample_rate(&self) -> u32;

    /// Native channel count of the source
    fn channels(&self) -> u16;
}

/// Open a decoder for `path`, dispatching on the file extension
pub fn open_decoder(path: &Path) -> Result<Box<dyn SampleDecoder>, PlaybackError> {
    if !path.is_file() {
        return Err(PlaybackError::FileNotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "wav" => Ok(Box::new(WavDecoder::open(path)?)),
        "mp3" => Ok(Box::new(SymphoniaDecoder::open(path, Some("mp3"))?)),
        // Generic fallback: let the probe identify the container
        _ => Ok(Box::new(SymphoniaDecoder::open(
            path,
            (!extension.is_empty()).then_some(extension.as_str()),
        )?)),
    }
}
