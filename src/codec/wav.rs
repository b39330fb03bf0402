//! WAV decoder backed by hound

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec};

use crate::codec::SampleDecoder;
use crate::constants::DECODE_BLOCK_SAMPLES;
use crate::error::PlaybackError;

/// Streaming WAV reader normalizing integer samples to f32
pub struct WavDecoder {
    reader: WavReader<BufReader<File>>,
    spec: WavSpec,
}

impl WavDecoder {
    pub fn open(path: &Path) -> Result<Self, PlaybackError> {
        let reader = WavReader::open(path).map_err(|e| match e {
            hound::Error::IoError(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                PlaybackError::FileNotFound(path.display().to_string())
            }
            hound::Error::FormatError(msg) => PlaybackError::UnsupportedFormat(msg.to_string()),
            other => PlaybackError::DecodeFailed(other.to_string()),
        })?;

        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(PlaybackError::UnsupportedFormat(
                "WAV header reports zero channels or sample rate".to_string(),
            ));
        }

        Ok(Self { reader, spec })
    }
}

impl SampleDecoder for WavDecoder {
    fn next_block(&mut self) -> Result<Option<Vec<f32>>, PlaybackError> {
        let mut block = Vec::with_capacity(DECODE_BLOCK_SAMPLES);

        match self.spec.sample_format {
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(DECODE_BLOCK_SAMPLES) {
                    block.push(sample.map_err(|e| PlaybackError::DecodeFailed(e.to_string()))?);
                }
            }
            SampleFormat::Int => {
                let full_scale = (1i64 << (self.spec.bits_per_sample - 1)) as f32;
                for sample in self.reader.samples::<i32>().take(DECODE_BLOCK_SAMPLES) {
                    let s = sample.map_err(|e| PlaybackError::DecodeFailed(e.to_string()))?;
                    block.push(s as f32 / full_scale);
                }
            }
        }

        if block.is_empty() {
            Ok(None)
        } else {
            Ok(Some(block))
        }
    }

    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn channels(&self) -> u16 {
        self.spec.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, spec: WavSpec, samples: &[i16]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decodes_i16_wav_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ding.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav(&path, spec, &[0, 16384, -16384, i16::MAX]);

        let mut decoder = WavDecoder::open(&path).unwrap();
        assert_eq!(decoder.sample_rate(), 48_000);
        assert_eq!(decoder.channels(), 1);

        let block = decoder.next_block().unwrap().unwrap();
        assert_eq!(block.len(), 4);
        assert_eq!(block[0], 0.0);
        assert!((block[1] - 0.5).abs() < 1e-4);
        assert!((block[2] + 0.5).abs() < 1e-4);
        assert!(block[3] <= 1.0);

        // End of stream, repeatedly
        assert!(decoder.next_block().unwrap().is_none());
        assert!(decoder.next_block().unwrap().is_none());
    }

    #[test]
    fn test_decodes_stereo_interleaved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav(&path, spec, &[100, -100, 200, -200]);

        let mut decoder = WavDecoder::open(&path).unwrap();
        assert_eq!(decoder.channels(), 2);
        let block = decoder.next_block().unwrap().unwrap();
        assert_eq!(block.len(), 4);
        assert!(block[0] > 0.0 && block[1] < 0.0);
    }

    #[test]
    fn test_blocks_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let samples = vec![1000i16; DECODE_BLOCK_SAMPLES + 100];
        write_wav(&path, spec, &samples);

        let mut decoder = WavDecoder::open(&path).unwrap();
        let first = decoder.next_block().unwrap().unwrap();
        assert_eq!(first.len(), DECODE_BLOCK_SAMPLES);
        let second = decoder.next_block().unwrap().unwrap();
        assert_eq!(second.len(), 100);
        assert!(decoder.next_block().unwrap().is_none());
    }

    #[test]
    fn test_truncated_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        assert!(WavDecoder::open(&path).is_err());
    }
}
