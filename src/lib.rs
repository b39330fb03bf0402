//! # Soundboard Core
//!
//! Real-time microphone and sound-effect mixing routed to a virtual audio
//! cable, for feeding voice applications (Discord, Zoom) a combined signal.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Microphone (48 kHz / 16-bit / mono)                             │
//! │       │ capture thread (audio::capture)                          │
//! │       ▼                                                          │
//! │  ┌──────────────┐      ┌───────────────────────────────┐         │
//! │  │ Capture Ring │      │  Sound files (.wav / .mp3 / …)│         │
//! │  │ (~2 s, drop  │      │  codec::open_decoder          │         │
//! │  │  oldest)     │      │       │ resample + up-mix     │         │
//! │  └──────┬───────┘      └───────┼───────────────────────┘         │
//! │         │                      │                                 │
//! │         ▼                      ▼                                 │
//! │  ┌──────────────────────────────────────┐                        │
//! │  │   Mixer (48 kHz / f32 / stereo)      │                        │
//! │  │   dynamic slots, additive sum        │                        │
//! │  └──────┬──────────────────────┬────────┘                        │
//! │         │ pull                 │ pull                            │
//! │         ▼                      ▼                                 │
//! │  ┌──────────────┐      ┌──────────────────┐                      │
//! │  │ Primary sink │      │ Monitor sink     │                      │
//! │  │ (cable dev.) │      │ (default device) │                      │
//! │  └──────────────┘      └──────────────────┘                      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The capture thread and each output sink run on their own dedicated
//! threads; the mixer's slot set is the only state they share. Microphone
//! level readings flow back to the UI over a fire-and-forget channel.

pub mod audio;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod mixer;

pub use engine::AudioEngine;
pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Sample rate of the microphone input stream
    pub const CAPTURE_SAMPLE_RATE: u32 = 48_000;

    /// Channel count of the microphone input stream (mono)
    pub const CAPTURE_CHANNELS: u16 = 1;

    /// Sample rate of the mixer and both output sinks
    pub const MIX_SAMPLE_RATE: u32 = 48_000;

    /// Channel count of the mixer and both output sinks (stereo)
    pub const MIX_CHANNELS: u16 = 2;

    /// Target capture buffering interval in milliseconds
    pub const CAPTURE_BUFFER_MS: u32 = 50;

    /// Seconds of captured audio retained by the ring buffer
    pub const RING_SECONDS: u32 = 2;

    /// Capacity of the microphone level channel (drops when full)
    pub const LEVEL_CHANNEL_CAPACITY: usize = 8;

    /// Interleaved samples pulled from a decoder per block
    pub const DECODE_BLOCK_SAMPLES: usize = 4096;
}
