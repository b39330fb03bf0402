//! Error types for the soundboard core

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Capture is already running")]
    AlreadyRunning,

    #[error("Failed to initialize output device: {0}")]
    DeviceInitFailed(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Mixer is not running")]
    MixerNotReady,
}

/// Sound-file playback errors
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
