//! Bounded per-stream buffers
//!
//! Producers push whole video frames or runs of interleaved audio samples;
//! the drain side pops one unit at a time and acknowledges it with
//! `pop_done` once it has been handed to the encoder. Neither side ever
//! blocks on I/O: an overflowing push is dropped and a starved pop yields a
//! [`Popped::Stale`] unit.

pub mod audio;
pub mod popped;
pub mod video;

pub use audio::{AudioSampleRing, DeliveryCursor};
pub use popped::{Popped, RingView};
pub use video::VideoFrameRing;

/// Copy `src` into `storage` starting at `start`, continuing at index 0 once
/// the end of storage is reached.
pub(crate) fn write_wrapped<T: Copy>(storage: &mut [T], start: usize, src: &[T]) {
    debug_assert!(src.len() <= storage.len());
    let head = (storage.len() - start).min(src.len());
    storage[start..start + head].copy_from_slice(&src[..head]);
    let tail = src.len() - head;
    storage[..tail].copy_from_slice(&src[head..]);
}

/// Fill `dst` from `storage` starting at `start`, wrapping the same way.
pub(crate) fn read_wrapped<T: Copy>(storage: &[T], start: usize, dst: &mut [T]) {
    debug_assert!(dst.len() <= storage.len());
    let head = (storage.len() - start).min(dst.len());
    dst[..head].copy_from_slice(&storage[start..start + head]);
    let tail = dst.len() - head;
    dst[head..].copy_from_slice(&storage[..tail]);
}

/// Convert a duration in seconds at `rate` units per second into a unit count.
pub(crate) fn units_for(seconds: f64, rate: f64) -> usize {
    (seconds * rate).round().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_wrapped_splits_at_end() {
        let mut storage = [0u8; 5];
        write_wrapped(&mut storage, 3, &[1, 2, 3, 4]);
        assert_eq!(storage, [3, 4, 0, 1, 2]);
    }

    #[test]
    fn test_read_wrapped_splits_at_end() {
        let storage = [3u8, 4, 0, 1, 2];
        let mut out = [0u8; 4];
        read_wrapped(&storage, 3, &mut out);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn test_wrapped_copies_without_wrap() {
        let mut storage = [0u8; 4];
        write_wrapped(&mut storage, 0, &[9, 8]);
        let mut out = [0u8; 2];
        read_wrapped(&storage, 0, &mut out);
        assert_eq!(out, [9, 8]);
    }

    #[test]
    fn test_units_for_rounds() {
        assert_eq!(units_for(2.0, 30.0), 60);
        assert_eq!(units_for(0.1, 44_100.0), 4410);
        assert_eq!(units_for(0.0, 48_000.0), 0);
    }
}
