//! Units handed out by the rings

use parking_lot::MappedMutexGuard;
use std::ops::Deref;

/// Borrowed view into a ring's read-side scratch buffer.
///
/// The view keeps the ring's scratch buffer locked; drop it before popping
/// the same ring again. Producers are never blocked by a live view.
pub type RingView<'a, T> = MappedMutexGuard<'a, [T]>;

/// A unit read from a ring.
///
/// `Fresh` carries buffered data that has not been acknowledged yet.
/// `Stale` means the ring had nothing deliverable: the unit repeats the last
/// video frame or is silence, and must not be acknowledged with `pop_done`.
#[derive(Debug)]
pub enum Popped<V> {
    Fresh(V),
    Stale(V),
}

impl<V> Popped<V> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Popped::Stale(_))
    }

    pub fn is_fresh(&self) -> bool {
        !self.is_stale()
    }

    /// The unit regardless of freshness
    pub fn into_inner(self) -> V {
        match self {
            Popped::Fresh(v) | Popped::Stale(v) => v,
        }
    }

    /// The unit only if it is fresh
    pub fn fresh(self) -> Option<V> {
        match self {
            Popped::Fresh(v) => Some(v),
            Popped::Stale(_) => None,
        }
    }
}

impl<V> Deref for Popped<V> {
    type Target = V;

    fn deref(&self) -> &V {
        match self {
            Popped::Fresh(v) | Popped::Stale(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_and_stale_accessors() {
        let fresh = Popped::Fresh(vec![1u8, 2]);
        assert!(fresh.is_fresh());
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh.fresh(), Some(vec![1, 2]));

        let stale = Popped::Stale(vec![0u8]);
        assert!(stale.is_stale());
        assert_eq!(stale.into_inner(), vec![0]);
        assert_eq!(Popped::Stale(3).fresh(), None);
    }
}
