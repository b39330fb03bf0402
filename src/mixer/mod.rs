//! Dynamic-membership additive mixer
//!
//! The mixer is a pure summing point over opaque slots: it holds no
//! knowledge of why a source exists. Output callbacks pull via [`Mixer::read`];
//! producer threads add and remove slots concurrently. Each pull snapshots
//! the slot set under a brief lock and mixes outside it, so membership
//! changes only ever wait on a snapshot or removal, never on a full pull.

pub mod source;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

pub use source::{CaptureSource, MixSource, PlaybackSource, SourceRead};

/// Opaque handle to one mixer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

struct Slot {
    id: SlotId,
    source: Arc<Mutex<Box<dyn MixSource>>>,
}

/// Mixes all registered sources into one 48 kHz stereo f32 signal.
///
/// Mixing is plain per-sample addition: no gain normalization, no
/// limiting. Summing past full scale clips at the device and that is
/// accepted behavior.
pub struct Mixer {
    slots: Mutex<Vec<Slot>>,
    next_id: AtomicU64,
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a source. Every call creates a new independent slot, so
    /// the same file may play concurrently with itself.
    pub fn add_source(&self, source: Box<dyn MixSource>) -> SlotId {
        let id = SlotId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slots.lock().push(Slot {
            id,
            source: Arc::new(Mutex::new(source)),
        });
        tracing::debug!("Mixer slot {:?} added", id);
        id
    }

    /// Remove a slot. Returns false when the slot no longer exists
    /// (already removed, or self-removed on exhaustion).
    pub fn remove_source(&self, id: SlotId) -> bool {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        before != slots.len()
    }

    /// Remove every slot except the listed ones (used by stop-all-sounds
    /// to keep the capture slot alive)
    pub fn remove_sources_except(&self, keep: &[SlotId]) {
        let mut slots = self.slots.lock();
        slots.retain(|slot| keep.contains(&slot.id));
    }

    pub fn source_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Pull one buffer of mixed interleaved stereo samples.
    ///
    /// The slot set is snapshotted under a brief lock and every source is
    /// read outside it, so concurrent membership changes never wait on a
    /// pull in flight. Sources reporting [`SourceRead::Exhausted`] are
    /// removed before this pull returns; an exhausted source is never read
    /// again.
    pub fn read(&self, out: &mut [f32]) {
        out.fill(0.0);

        let snapshot: Vec<(SlotId, Arc<Mutex<Box<dyn MixSource>>>)> = {
            let slots = self.slots.lock();
            slots.iter().map(|s| (s.id, s.source.clone())).collect()
        };
        if snapshot.is_empty() {
            return;
        }

        let mut scratch = vec![0.0f32; out.len()];
        let mut exhausted = Vec::new();

        for (id, source) in snapshot {
            match source.lock().read(&mut scratch) {
                SourceRead::Samples(n) => {
                    let n = n.min(out.len());
                    for (acc, &s) in out.iter_mut().zip(scratch[..n].iter()) {
                        *acc += s;
                    }
                }
                SourceRead::Exhausted => {
                    tracing::debug!("Mixer slot {:?} exhausted, removed", id);
                    exhausted.push(id);
                }
            }
        }

        if !exhausted.is_empty() {
            self.slots
                .lock()
                .retain(|slot| !exhausted.contains(&slot.id));
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Plays back a fixed sample buffer, then exhausts
    struct ScriptedSource {
        samples: Vec<f32>,
        pos: usize,
        reads_after_exhaustion: Arc<AtomicUsize>,
        exhausted: bool,
    }

    impl ScriptedSource {
        fn new(samples: Vec<f32>) -> Self {
            Self {
                samples,
                pos: 0,
                reads_after_exhaustion: Arc::new(AtomicUsize::new(0)),
                exhausted: false,
            }
        }

        fn reads_after_exhaustion(&self) -> Arc<AtomicUsize> {
            self.reads_after_exhaustion.clone()
        }
    }

    impl MixSource for ScriptedSource {
        fn read(&mut self, out: &mut [f32]) -> SourceRead {
            if self.exhausted {
                self.reads_after_exhaustion.fetch_add(1, Ordering::Relaxed);
                return SourceRead::Exhausted;
            }
            let n = out.len().min(self.samples.len() - self.pos);
            if n == 0 {
                self.exhausted = true;
                return SourceRead::Exhausted;
            }
            out[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
            self.pos += n;
            SourceRead::Samples(n)
        }
    }

    #[test]
    fn test_mix_is_per_sample_sum() {
        let mixer = Mixer::new();
        mixer.add_source(Box::new(ScriptedSource::new(vec![0.1; 8])));
        mixer.add_source(Box::new(ScriptedSource::new(vec![0.25; 8])));

        let mut out = [0.0f32; 8];
        mixer.read(&mut out);
        for s in out {
            assert!((s - 0.35).abs() < 1e-6);
        }
    }

    #[test]
    fn test_no_gain_normalization_allows_clipping() {
        let mixer = Mixer::new();
        mixer.add_source(Box::new(ScriptedSource::new(vec![0.8; 4])));
        mixer.add_source(Box::new(ScriptedSource::new(vec![0.8; 4])));

        let mut out = [0.0f32; 4];
        mixer.read(&mut out);
        // Sum exceeds full scale and is left uncorrected
        assert!((out[0] - 1.6).abs() < 1e-6);
    }

    #[test]
    fn test_exhausted_slot_removed_in_same_pull_and_never_read_again() {
        let mixer = Mixer::new();
        let source = ScriptedSource::new(vec![0.5; 4]);
        let counter = source.reads_after_exhaustion();
        mixer.add_source(Box::new(source));

        let mut out = [0.0f32; 4];
        mixer.read(&mut out); // consumes all samples
        assert_eq!(mixer.source_count(), 1);

        mixer.read(&mut out); // detects exhaustion, removes the slot
        assert_eq!(mixer.source_count(), 0);
        assert!(out.iter().all(|&s| s == 0.0));

        // Further pulls cannot touch the dropped source
        mixer.read(&mut out);
        mixer.read(&mut out);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_shorter_source_removed_alone() {
        let mixer = Mixer::new();
        let ding = mixer.add_source(Box::new(ScriptedSource::new(vec![0.1; 4])));
        let buzz = mixer.add_source(Box::new(ScriptedSource::new(vec![0.2; 12])));
        assert_ne!(ding, buzz);

        let mut out = [0.0f32; 4];
        mixer.read(&mut out); // both contribute
        assert!((out[0] - 0.3).abs() < 1e-6);

        mixer.read(&mut out); // ding exhausts and is removed, buzz continues
        assert_eq!(mixer.source_count(), 1);
        assert!((out[0] - 0.2).abs() < 1e-6);

        mixer.read(&mut out); // buzz's remaining samples, uninterrupted
        assert!((out[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_remove_sources_except_keeps_capture_slot() {
        let mixer = Mixer::new();
        let capture = mixer.add_source(Box::new(ScriptedSource::new(vec![0.0; 64])));
        mixer.add_source(Box::new(ScriptedSource::new(vec![0.1; 64])));
        mixer.add_source(Box::new(ScriptedSource::new(vec![0.2; 64])));

        mixer.remove_sources_except(&[capture]);
        assert_eq!(mixer.source_count(), 1);
    }

    #[test]
    fn test_remove_source_is_exactly_once() {
        let mixer = Mixer::new();
        let id = mixer.add_source(Box::new(ScriptedSource::new(vec![0.1; 4])));
        assert!(mixer.remove_source(id));
        assert!(!mixer.remove_source(id));
    }

    #[test]
    fn test_partial_final_read_contributes_then_exhausts() {
        let mixer = Mixer::new();
        mixer.add_source(Box::new(ScriptedSource::new(vec![0.5; 3])));

        let mut out = [0.0f32; 8];
        mixer.read(&mut out);
        assert!((out[2] - 0.5).abs() < 1e-6);
        // Samples past the source's end stay silent
        assert_eq!(out[3], 0.0);

        mixer.read(&mut out);
        assert_eq!(mixer.source_count(), 0);
    }

    #[test]
    fn test_membership_changes_do_not_wait_on_a_pull() {
        use std::time::{Duration, Instant};

        /// Holds its read long enough to expose any lock held across a pull
        struct SlowSource;
        impl MixSource for SlowSource {
            fn read(&mut self, out: &mut [f32]) -> SourceRead {
                std::thread::sleep(Duration::from_millis(200));
                out.fill(0.0);
                SourceRead::Samples(out.len())
            }
        }

        let mixer = Arc::new(Mixer::new());
        mixer.add_source(Box::new(SlowSource));

        let puller = {
            let mixer = mixer.clone();
            std::thread::spawn(move || {
                let mut out = [0.0f32; 64];
                mixer.read(&mut out);
            })
        };

        // Land inside the slow read, then mutate membership
        std::thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        let id = mixer.add_source(Box::new(ScriptedSource::new(vec![0.1; 4])));
        assert!(
            start.elapsed() < Duration::from_millis(100),
            "add_source stalled behind a pull for {:?}",
            start.elapsed()
        );
        assert!(mixer.remove_source(id));

        puller.join().unwrap();
    }

    #[test]
    fn test_overreported_sample_count_is_clamped() {
        /// Claims more samples than the buffer holds
        struct LyingSource;
        impl MixSource for LyingSource {
            fn read(&mut self, out: &mut [f32]) -> SourceRead {
                out.fill(0.25);
                SourceRead::Samples(out.len() + 1000)
            }
        }

        let mixer = Mixer::new();
        mixer.add_source(Box::new(LyingSource));

        let mut out = [0.0f32; 8];
        mixer.read(&mut out);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    proptest! {
        #[test]
        fn prop_mix_equals_sum_of_contributions(
            a in proptest::collection::vec(-1.0f32..1.0, 16),
            b in proptest::collection::vec(-1.0f32..1.0, 16),
            c in proptest::collection::vec(-1.0f32..1.0, 16),
        ) {
            let mixer = Mixer::new();
            mixer.add_source(Box::new(ScriptedSource::new(a.clone())));
            mixer.add_source(Box::new(ScriptedSource::new(b.clone())));
            mixer.add_source(Box::new(ScriptedSource::new(c.clone())));

            let mut out = [0.0f32; 16];
            mixer.read(&mut out);

            for i in 0..16 {
                let expected = a[i] + b[i] + c[i];
                prop_assert!((out[i] - expected).abs() < 1e-5);
            }
        }
    }
}
