//! Capture ring buffer
//!
//! Lock-free ring between the microphone callback (producer) and the
//! mixer's capture source (consumer). Overflow policy is discard-oldest:
//! the capture thread never blocks, and the ring retains only the most
//! recent audio when the consumer falls behind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

/// One chunk of normalized mono samples as delivered by the input driver
#[derive(Clone)]
pub struct CaptureChunk {
    /// Mono f32 samples in [-1, 1]
    pub samples: Vec<f32>,
}

impl CaptureChunk {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Discard-oldest ring of capture chunks
pub struct CaptureRing {
    queue: ArrayQueue<CaptureChunk>,
    dropped_chunks: AtomicUsize,
}

impl CaptureRing {
    /// Create a ring holding `capacity` chunks (~capacity × buffer interval
    /// of audio)
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            dropped_chunks: AtomicUsize::new(0),
        }
    }

    /// Push a chunk, displacing the oldest one when full. Never blocks.
    pub fn push(&self, chunk: CaptureChunk) {
        if self.queue.force_push(chunk).is_some() {
            self.dropped_chunks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Pop the oldest chunk, `None` when empty
    pub fn pop(&self) -> Option<CaptureChunk> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Chunks displaced by overflow since creation
    pub fn dropped_chunks(&self) -> usize {
        self.dropped_chunks.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a capture ring
pub type SharedCaptureRing = Arc<CaptureRing>;

/// Create a new shared capture ring
pub fn shared_ring(capacity: usize) -> SharedCaptureRing {
    Arc::new(CaptureRing::new(capacity))
}
