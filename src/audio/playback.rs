use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Decoded PCM waiting to be played
///
/// The realtime client appends samples as `response.audio.delta` events
/// arrive; the output device pulls fixed-size frames on its own thread.
/// Cloning yields another handle to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct PlaybackBuffer {
    samples: Arc<Mutex<VecDeque<i16>>>,
}

impl PlaybackBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append samples to the tail of the buffer
    pub fn append(&self, samples: &[i16]) {
        self.lock().extend(samples.iter().copied());
    }

    /// Take exactly `frame_count` samples from the head of the buffer
    ///
    /// When fewer than `frame_count` samples are buffered the buffer is left
    /// untouched and silence is returned instead.
    pub fn pull_frame(&self, frame_count: usize) -> Vec<i16> {
        let mut frame = vec![0i16; frame_count];
        self.fill_frame(&mut frame);
        frame
    }

    /// Allocation-free form of [`pull_frame`](Self::pull_frame) for device callbacks
    pub fn fill_frame(&self, out: &mut [i16]) {
        let mut samples = self.lock();

        let n = out.len();
        if samples.len() >= n {
            for (slot, sample) in out.iter_mut().zip(samples.drain(..n)) {
                *slot = sample;
            }
        } else {
            out.fill(0);
        }
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything that has not been played yet
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<i16>> {
        // A panicking device callback must not silence playback for good
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
