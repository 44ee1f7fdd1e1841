//! Recording state management
//!
//! Defines the session state machine, stream mode and segment tracking.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Never opened
    #[default]
    Idle,
    /// Accepting pushes and draining
    Recording,
    /// Encoders closed, ring allocations kept for resume
    Suspended,
    /// Closed and resources released
    Closed,
}

/// Which elementary streams a session records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamMode {
    Video,
    Audio,
    AudioVideo,
}

impl StreamMode {
    /// Mode for the given set of attached encoders
    pub fn from_streams(video: bool, audio: bool) -> Option<Self> {
        match (video, audio) {
            (true, true) => Some(StreamMode::AudioVideo),
            (true, false) => Some(StreamMode::Video),
            (false, true) => Some(StreamMode::Audio),
            (false, false) => None,
        }
    }

    pub fn has_video(&self) -> bool {
        matches!(self, StreamMode::Video | StreamMode::AudioVideo)
    }

    pub fn has_audio(&self) -> bool {
        matches!(self, StreamMode::Audio | StreamMode::AudioVideo)
    }
}

/// One open/close cycle of a session
///
/// A new segment starts each time the session is opened or resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSegment {
    /// Segment index (0, 1, 2, ...)
    pub index: usize,

    /// Unix timestamp when the segment started
    pub unix_start_ms: u64,

    /// Unix timestamp when the segment ended (equal to start while open)
    pub unix_end_ms: u64,

    /// Video frames encoded during the segment
    pub video_frames: u64,

    /// Audio sample frames encoded during the segment
    pub audio_samples: u64,
}

impl SessionSegment {
    /// Start a new segment now
    pub fn new(index: usize) -> Self {
        let now = Utc::now().timestamp_millis() as u64;
        Self {
            index,
            unix_start_ms: now,
            unix_end_ms: now,
            video_frames: 0,
            audio_samples: 0,
        }
    }

    /// End the segment with what was written during it
    pub fn end(&mut self, video_frames: u64, audio_samples: u64) {
        self.unix_end_ms = Utc::now().timestamp_millis() as u64;
        self.video_frames = video_frames;
        self.audio_samples = audio_samples;
    }

    pub fn duration_ms(&self) -> u64 {
        self.unix_end_ms.saturating_sub(self.unix_start_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_mode_from_streams() {
        assert_eq!(StreamMode::from_streams(true, true), Some(StreamMode::AudioVideo));
        assert_eq!(StreamMode::from_streams(false, true), Some(StreamMode::Audio));
        assert_eq!(StreamMode::from_streams(false, false), None);
        assert!(StreamMode::Video.has_video());
        assert!(!StreamMode::Video.has_audio());
    }

    #[test]
    fn test_segment_end() {
        let mut segment = SessionSegment::new(2);
        segment.end(30, 48_000);
        assert_eq!(segment.index, 2);
        assert_eq!(segment.video_frames, 30);
        assert!(segment.unix_end_ms >= segment.unix_start_ms);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&SessionState::Suspended).unwrap();
        assert_eq!(json, "\"suspended\"");
    }
}
