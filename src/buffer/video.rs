//! Fixed-slot ring of whole video frames

use super::popped::{Popped, RingView};
use super::units_for;
use parking_lot::{Mutex, MutexGuard};

struct VideoState {
    /// `capacity * frame_size` bytes, one slot per frame
    storage: Vec<u8>,
    push_position: usize,
    pop_position: usize,
    count_pushed: usize,
    ready: bool,
}

/// Circular buffer holding up to `capacity` frames of `frame_size` bytes.
///
/// A stale pop repeats the last frame handed out (zeroes before the first
/// one), which shows up in the recording as a frozen picture.
pub struct VideoFrameRing {
    frame_size: usize,
    capacity: usize,
    state: Mutex<VideoState>,
    /// Read-side copy of the last popped frame
    scratch: Mutex<Vec<u8>>,
}

impl VideoFrameRing {
    /// Create a ring holding `capacity_seconds` of video at `fps`.
    pub fn new(capacity_seconds: f64, fps: f64, frame_size: usize) -> Self {
        Self::with_slots(units_for(capacity_seconds, fps), frame_size)
    }

    /// Create a ring with an explicit slot count (at least one slot).
    pub fn with_slots(slots: usize, frame_size: usize) -> Self {
        let capacity = slots.max(1);
        Self {
            frame_size,
            capacity,
            state: Mutex::new(VideoState {
                storage: vec![0; capacity * frame_size],
                push_position: 0,
                pop_position: 0,
                count_pushed: 0,
                ready: false,
            }),
            scratch: Mutex::new(vec![0; frame_size]),
        }
    }

    /// Copy one frame into the next free slot.
    ///
    /// Returns false without touching the ring when the frame has the wrong
    /// size or every slot is taken.
    pub fn push(&self, frame: &[u8]) -> bool {
        if frame.len() != self.frame_size {
            return false;
        }

        let mut state = self.state.lock();
        if state.count_pushed == self.capacity {
            return false;
        }

        let offset = state.push_position * self.frame_size;
        state.storage[offset..offset + self.frame_size].copy_from_slice(frame);
        state.push_position = (state.push_position + 1) % self.capacity;
        state.count_pushed += 1;
        state.ready = true;
        true
    }

    /// Read the oldest buffered frame without consuming it.
    pub fn pop(&self) -> Popped<RingView<'_, u8>> {
        let mut scratch = self.scratch.lock();
        let fresh = {
            let state = self.state.lock();
            if state.ready && state.count_pushed > 0 {
                let offset = state.pop_position * self.frame_size;
                scratch.copy_from_slice(&state.storage[offset..offset + self.frame_size]);
                true
            } else {
                false
            }
        };

        let view = MutexGuard::map(scratch, |frame| frame.as_mut_slice());
        if fresh {
            Popped::Fresh(view)
        } else {
            Popped::Stale(view)
        }
    }

    /// Consume the frame returned by the last fresh [`pop`](Self::pop).
    pub fn pop_done(&self) {
        let mut state = self.state.lock();
        if !state.ready || state.count_pushed == 0 {
            return;
        }

        state.pop_position = (state.pop_position + 1) % self.capacity;
        state.count_pushed -= 1;
        if state.count_pushed == 0 {
            state.ready = false;
        }
    }

    /// Whether a fresh frame is available
    pub fn has_frame(&self) -> bool {
        let state = self.state.lock();
        state.ready && state.count_pushed > 0
    }

    pub fn pushed_count(&self) -> usize {
        self.state.lock().count_pushed
    }

    pub fn fill_ratio(&self) -> f64 {
        self.pushed_count() as f64 / self.capacity as f64
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Zero all cursors, keeping the allocation.
    pub fn reset(&self) {
        let mut scratch = self.scratch.lock();
        scratch.fill(0);
        let mut state = self.state.lock();
        state.push_position = 0;
        state.pop_position = 0;
        state.count_pushed = 0;
        state.ready = false;
    }
}

impl std::fmt::Debug for VideoFrameRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrameRing")
            .field("frame_size", &self.frame_size)
            .field("capacity", &self.capacity)
            .field("pushed", &self.pushed_count())
            .finish()
    }
}
