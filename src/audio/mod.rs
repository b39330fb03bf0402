//! Audio subsystem module

pub mod buffer;
pub mod capture;
pub mod device;
pub mod output;

pub use buffer::{CaptureChunk, CaptureRing, SharedCaptureRing};
pub use capture::CapturePipeline;
pub use device::{select_default, AudioEndpoint, DeviceRegistry};
pub use output::{OutputSink, SinkManager};
