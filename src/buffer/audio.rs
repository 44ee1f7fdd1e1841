//! Ring of interleaved audio samples with drift-corrected chunking
//!
//! Lengths are counted in sample frames: one scalar per channel. With a
//! fixed chunk duration the ring hands out chunks whose lengths alternate
//! between `floor` and `ceil` of `chunk_seconds * sample_rate` so that the
//! total delivered after `n` chunks is always `round(n * chunk_seconds *
//! sample_rate)`. Without a chunk duration every pop drains what is buffered.

use super::popped::{Popped, RingView};
use super::{read_wrapped, units_for, write_wrapped};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

/// Delivery counters, advanced only by `pop_done`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryCursor {
    pub chunks: u64,
    pub samples: u64,
}

struct AudioState {
    /// `capacity * channels` interleaved scalars
    storage: Vec<f32>,
    push_position: usize,
    pop_position: usize,
    count_pushed: usize,
    ready: bool,
    delivered: DeliveryCursor,
}

pub struct AudioSampleRing {
    sample_rate: f64,
    channels: usize,
    chunk_seconds: f64,
    /// Capacity in sample frames
    capacity: usize,
    state: Mutex<AudioState>,
    scratch: Mutex<Vec<f32>>,
}

impl AudioSampleRing {
    /// Create a ring holding `capacity_seconds` of audio.
    ///
    /// A `chunk_seconds` of 0 selects variable-length mode.
    pub fn new(capacity_seconds: f64, sample_rate: u32, channels: u16, chunk_seconds: f64) -> Self {
        let capacity = units_for(capacity_seconds, sample_rate as f64).max(1);
        let channels = usize::from(channels.max(1));
        Self {
            sample_rate: sample_rate as f64,
            channels,
            chunk_seconds: chunk_seconds.max(0.0),
            capacity,
            state: Mutex::new(AudioState {
                storage: vec![0.0; capacity * channels],
                push_position: 0,
                pop_position: 0,
                count_pushed: 0,
                ready: false,
                delivered: DeliveryCursor::default(),
            }),
            scratch: Mutex::new(Vec::new()),
        }
    }

    /// Append `n` sample frames.
    ///
    /// `samples` must hold exactly `n * channels` scalars. Returns false
    /// without touching the ring if it does not, or if the run does not fit.
    pub fn push(&self, n: usize, samples: &[f32]) -> bool {
        if samples.len() != n * self.channels {
            return false;
        }
        if n == 0 {
            return true;
        }

        let mut state = self.state.lock();
        if state.count_pushed + n > self.capacity {
            return false;
        }

        let start = state.push_position * self.channels;
        write_wrapped(&mut state.storage, start, samples);
        state.push_position = (state.push_position + n) % self.capacity;
        state.count_pushed += n;
        state.ready = true;
        true
    }

    /// Read the next chunk without consuming it.
    ///
    /// `requested` is ignored in fixed-chunk mode; otherwise 0 asks for
    /// everything buffered. A starved ring yields silence of the requested
    /// length and needs a new push before it delivers again.
    pub fn pop(&self, requested: usize) -> Popped<RingView<'_, f32>> {
        let mut scratch = self.scratch.lock();
        let fresh = {
            let mut state = self.state.lock();
            let len = self.next_len(&state, requested);
            scratch.clear();
            scratch.resize(len * self.channels, 0.0);

            if state.ready && state.count_pushed >= len {
                read_wrapped(&state.storage, state.pop_position * self.channels, &mut scratch);
                true
            } else {
                state.ready = false;
                false
            }
        };

        let view = MutexGuard::map(scratch, |samples| samples.as_mut_slice());
        if fresh {
            Popped::Fresh(view)
        } else {
            Popped::Stale(view)
        }
    }

    /// Consume `n` sample frames read by the last fresh pop.
    pub fn pop_done(&self, n: usize) {
        let mut state = self.state.lock();
        if !state.ready || n > state.count_pushed {
            return;
        }

        state.pop_position = (state.pop_position + n) % self.capacity;
        state.count_pushed -= n;
        state.delivered.chunks += 1;
        state.delivered.samples += n as u64;
        if state.count_pushed == 0 {
            state.ready = false;
        }
    }

    /// Length in sample frames of the next chunk a pop(0) would return
    pub fn next_chunk_len(&self) -> usize {
        let state = self.state.lock();
        self.next_len(&state, 0)
    }

    /// Whether a pop(0) would currently return a fresh, non-empty chunk
    pub fn has_full_chunk(&self) -> bool {
        let state = self.state.lock();
        let len = self.next_len(&state, 0);
        state.ready && len > 0 && state.count_pushed >= len
    }

    fn next_len(&self, state: &AudioState, requested: usize) -> usize {
        if self.chunk_seconds > 0.0 {
            let target = ((state.delivered.chunks + 1) as f64 * self.chunk_seconds * self.sample_rate)
                .round() as u64;
            target.saturating_sub(state.delivered.samples) as usize
        } else if requested == 0 {
            state.count_pushed
        } else {
            requested
        }
    }

    pub fn delivered(&self) -> DeliveryCursor {
        self.state.lock().delivered
    }

    pub fn pushed_count(&self) -> usize {
        self.state.lock().count_pushed
    }

    pub fn fill_ratio(&self) -> f64 {
        self.pushed_count() as f64 / self.capacity as f64
    }

    /// Capacity in sample frames
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn chunk_seconds(&self) -> f64 {
        self.chunk_seconds
    }

    /// True when chunks are sized by whatever is buffered
    pub fn is_variable(&self) -> bool {
        self.chunk_seconds == 0.0
    }

    /// Zero all cursors, keeping the allocation.
    pub fn reset(&self) {
        let mut scratch = self.scratch.lock();
        scratch.clear();
        let mut state = self.state.lock();
        state.push_position = 0;
        state.pop_position = 0;
        state.count_pushed = 0;
        state.ready = false;
        state.delivered = DeliveryCursor::default();
    }
}

impl std::fmt::Debug for AudioSampleRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSampleRing")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("chunk_seconds", &self.chunk_seconds)
            .field("capacity", &self.capacity)
            .field("pushed", &self.pushed_count())
            .finish()
    }
}
