//! Format conversion to the mixer's fixed target format
//!
//! Wraps a decoder and produces 48 kHz stereo f32: channels are up-mixed
//! (mono duplicated) or down-mixed (averaged), and the sample rate is
//! converted by linear interpolation.

use crate::codec::SampleDecoder;
use crate::constants::MIX_SAMPLE_RATE;
use crate::error::PlaybackError;

/// Pull-through converter from a decoder's native format to the mix format
pub struct FormatConverter {
    decoder: Box<dyn SampleDecoder>,
    src_channels: u16,
    resampler: StereoResampler,
    ended: bool,
}

impl FormatConverter {
    pub fn new(decoder: Box<dyn SampleDecoder>) -> Result<Self, PlaybackError> {
        let src_rate = decoder.sample_rate();
        let src_channels = decoder.channels();
        if src_rate == 0 || src_channels == 0 {
            return Err(PlaybackError::DecodeFailed(
                "Source format has zero sample rate or channels".to_string(),
            ));
        }

        Ok(Self {
            resampler: StereoResampler::new(src_rate, MIX_SAMPLE_RATE),
            src_channels,
            decoder,
            ended: false,
        })
    }

    /// Fill `out` with interleaved stereo samples at the mix rate.
    /// Returns the number of samples written; 0 means the source is
    /// exhausted and will never produce again.
    pub fn fill(&mut self, out: &mut [f32]) -> Result<usize, PlaybackError> {
        let mut written = 0;

        while written < out.len() {
            written += self.resampler.pull(&mut out[written..]);
            if written >= out.len() || self.ended {
                break;
            }

            match self.decoder.next_block()? {
                Some(block) => {
                    let stereo = interleave_to_stereo(&block, self.src_channels);
                    self.resampler.push(&stereo);
                }
                None => {
                    self.ended = true;
                    self.resampler.end_of_input();
                }
            }
        }

        Ok(written)
    }
}

/// Convert one interleaved block to stereo: mono is duplicated, stereo
/// passes through, wider layouts are averaged down to mono first
pub fn interleave_to_stereo(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples.to_vec(),
        n => samples
            .chunks(n as usize)
            .flat_map(|frame| {
                let avg = frame.iter().sum::<f32>() / frame.len() as f32;
                [avg, avg]
            })
            .collect(),
    }
}

/// Streaming linear-interpolation resampler over interleaved stereo frames
struct StereoResampler {
    /// Source frames advanced per output frame
    step: f64,
    /// Fractional read position into `buf`, in frames
    pos: f64,
    /// Buffered interleaved stereo source frames
    buf: Vec<f32>,
    flushed: bool,
}

impl StereoResampler {
    fn new(src_rate: u32, dst_rate: u32) -> Self {
        Self {
            step: src_rate as f64 / dst_rate as f64,
            pos: 0.0,
            buf: Vec::new(),
            flushed: false,
        }
    }

    fn push(&mut self, frames: &[f32]) {
        debug_assert!(frames.len() % 2 == 0);
        self.buf.extend_from_slice(frames);
    }

    /// Signal that no further input will arrive. Duplicates the final
    /// frame so interpolation can consume up to the last real sample;
    /// the passthrough path needs no neighbor.
    fn end_of_input(&mut self) {
        if !self.flushed {
            self.flushed = true;
            if self.step != 1.0 && self.buf.len() >= 2 {
                let left = self.buf[self.buf.len() - 2];
                let right = self.buf[self.buf.len() - 1];
                self.buf.push(left);
                self.buf.push(right);
            }
        }
    }

    fn pull(&mut self, out: &mut [f32]) -> usize {
        // Identical rates bypass interpolation entirely
        if self.step == 1.0 {
            let n = out.len().min(self.buf.len());
            let n = n - n % 2;
            out[..n].copy_from_slice(&self.buf[..n]);
            self.buf.drain(..n);
            return n;
        }

        let frames_avail = self.buf.len() / 2;
        let mut written = 0;

        while written + 2 <= out.len() {
            let idx = self.pos as usize;
            // The last buffered frame is held back as the interpolation
            // neighbor for the next push
            if idx + 1 >= frames_avail {
                break;
            }
            let frac = (self.pos - idx as f64) as f32;
            let base = idx * 2;
            out[written] = self.buf[base] + (self.buf[base + 2] - self.buf[base]) * frac;
            out[written + 1] = self.buf[base + 1] + (self.buf[base + 3] - self.buf[base + 1]) * frac;
            written += 2;
            self.pos += self.step;
        }

        let consumed = (self.pos as usize).min(frames_avail.saturating_sub(1));
        if consumed > 0 {
            self.buf.drain(..consumed * 2);
            self.pos -= consumed as f64;
        }

        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BlockDecoder {
        blocks: Vec<Vec<f32>>,
        rate: u32,
        channels: u16,
    }

    impl SampleDecoder for BlockDecoder {
        fn next_block(&mut self) -> Result<Option<Vec<f32>>, PlaybackError> {
            if self.blocks.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.blocks.remove(0)))
            }
        }

        fn sample_rate(&self) -> u32 {
            self.rate
        }

        fn channels(&self) -> u16 {
            self.channels
        }
    }

    fn converter(blocks: Vec<Vec<f32>>, rate: u32, channels: u16) -> FormatConverter {
        FormatConverter::new(Box::new(BlockDecoder {
            blocks,
            rate,
            channels,
        }))
        .unwrap()
    }

    #[test]
    fn test_mono_upmix() {
        assert_eq!(
            interleave_to_stereo(&[0.1, -0.2], 1),
            vec![0.1, 0.1, -0.2, -0.2]
        );
    }

    #[test]
    fn test_stereo_passthrough() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(interleave_to_stereo(&samples, 2), samples);
    }

    #[test]
    fn test_quad_downmix_averages() {
        let out = interleave_to_stereo(&[0.4, 0.0, 0.4, 0.0], 4);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.2).abs() < 1e-6);
        assert_eq!(out[0], out[1]);
    }

    #[test]
    fn test_same_rate_stereo_is_identity() {
        let mut conv = converter(vec![vec![0.1, 0.2, 0.3, 0.4]], MIX_SAMPLE_RATE, 2);

        let mut out = [0.0f32; 8];
        let n = conv.fill(&mut out).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&out[..4], &[0.1, 0.2, 0.3, 0.4]);

        assert_eq!(conv.fill(&mut out).unwrap(), 0);
        // Exhaustion is stable
        assert_eq!(conv.fill(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_spans_multiple_blocks() {
        let mut conv = converter(
            vec![vec![0.1; 4], vec![0.2; 4], vec![0.3; 4]],
            MIX_SAMPLE_RATE,
            1,
        );

        let mut out = [0.0f32; 24];
        assert_eq!(conv.fill(&mut out).unwrap(), 24);
        assert!((out[0] - 0.1).abs() < 1e-6);
        assert!((out[23] - 0.3).abs() < 1e-6);
        assert_eq!(conv.fill(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_upsampling_doubles_frame_count() {
        // 24 kHz mono into a 48 kHz mix: every source frame becomes two
        let mut conv = converter(vec![vec![0.0, 1.0, 0.0, -1.0]], 24_000, 1);

        let mut out = [0.0f32; 64];
        let n = conv.fill(&mut out).unwrap();
        assert_eq!(n, 16);

        // Midpoints are interpolated
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[2] - 0.5).abs() < 1e-6);
        assert!((out[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_downsampling_halves_frame_count() {
        let mut conv = converter(vec![vec![0.5; 32]], 96_000, 1);

        let mut out = [0.0f32; 128];
        let n = conv.fill(&mut out).unwrap();
        // 32 source frames at half rate: ~16 output frames
        assert!((30..=34).contains(&n), "got {} samples", n);
        assert!((out[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_rate_source_is_rejected() {
        let result = FormatConverter::new(Box::new(BlockDecoder {
            blocks: vec![],
            rate: 0,
            channels: 1,
        }));
        assert!(result.is_err());
    }
}
