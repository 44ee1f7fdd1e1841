//! Session counters
//!
//! Shared between producer threads and the drain side, so everything is an
//! atomic with relaxed ordering. Pass your own `Arc<RecordingStats>` to the
//! session to observe it from elsewhere.

use super::scheduler::DrainReport;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RecordingStats {
    video_pushed: AtomicU64,
    video_dropped: AtomicU64,
    audio_pushed: AtomicU64,
    audio_dropped: AtomicU64,
    video_frames_written: AtomicU64,
    audio_chunks_written: AtomicU64,
    audio_samples_written: AtomicU64,
    encode_failures: AtomicU64,
    stale_skips: AtomicU64,
    audio_samples_discarded: AtomicU64,
    gap_frames: AtomicU64,
    gap_samples: AtomicU64,
}

/// Point-in-time copy of [`RecordingStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub video_pushed: u64,
    pub video_dropped: u64,
    pub audio_pushed: u64,
    pub audio_dropped: u64,
    pub video_frames_written: u64,
    pub audio_chunks_written: u64,
    pub audio_samples_written: u64,
    pub encode_failures: u64,
    pub stale_skips: u64,
    pub audio_samples_discarded: u64,
    pub gap_frames: u64,
    pub gap_samples: u64,
}

impl RecordingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_video_push(&self, accepted: bool) {
        let counter = if accepted {
            &self.video_pushed
        } else {
            &self.video_dropped
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_audio_push(&self, samples: usize, accepted: bool) {
        let counter = if accepted {
            &self.audio_pushed
        } else {
            &self.audio_dropped
        };
        counter.fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_drain(&self, report: &DrainReport) {
        self.video_frames_written
            .fetch_add(report.video_frames, Ordering::Relaxed);
        self.audio_chunks_written
            .fetch_add(report.audio_chunks, Ordering::Relaxed);
        self.audio_samples_written
            .fetch_add(report.audio_samples, Ordering::Relaxed);
        self.encode_failures
            .fetch_add(report.encode_failures, Ordering::Relaxed);
        self.stale_skips
            .fetch_add(report.stale_skips, Ordering::Relaxed);
        self.audio_samples_discarded
            .fetch_add(report.audio_samples_discarded, Ordering::Relaxed);
    }

    pub(crate) fn record_gap(&self, frames: u64, samples: u64) {
        self.gap_frames.fetch_add(frames, Ordering::Relaxed);
        self.gap_samples.fetch_add(samples, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            video_pushed: load(&self.video_pushed),
            video_dropped: load(&self.video_dropped),
            audio_pushed: load(&self.audio_pushed),
            audio_dropped: load(&self.audio_dropped),
            video_frames_written: load(&self.video_frames_written),
            audio_chunks_written: load(&self.audio_chunks_written),
            audio_samples_written: load(&self.audio_samples_written),
            encode_failures: load(&self.encode_failures),
            stale_skips: load(&self.stale_skips),
            audio_samples_discarded: load(&self.audio_samples_discarded),
            gap_frames: load(&self.gap_frames),
            gap_samples: load(&self.gap_samples),
        }
    }
}
