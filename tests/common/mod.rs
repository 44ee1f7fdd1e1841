//! Shared test helpers

#![allow(dead_code)]

use open_capture_sync::encoder::{
    EncoderError, EncoderResult, FlushState, MediaUnit, StreamEncoder,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Order in which units reached any encoder sharing the log
pub type WriteLog = Arc<Mutex<Vec<Written>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    Video,
    Audio(usize),
}

#[derive(Debug, Default)]
pub struct MockState {
    pub opened: u32,
    pub closed: u32,
    pub encode_calls: usize,
    pub frames: u64,
    pub samples: u64,
    pub flush_calls: u32,
    /// Flush rounds that report `Pending` before `Drained`
    pub pending_flushes: u32,
    pub never_drain: bool,
    /// Encode calls (0-based) that fail
    pub fail_on: HashSet<usize>,
    pub fail_open: bool,
}

/// Inspection handle kept by the test after the encoder moves into a session
#[derive(Clone, Default)]
pub struct MockHandle(pub Arc<Mutex<MockState>>);

impl MockHandle {
    pub fn frames(&self) -> u64 {
        self.0.lock().frames
    }

    pub fn samples(&self) -> u64 {
        self.0.lock().samples
    }

    pub fn opened(&self) -> u32 {
        self.0.lock().opened
    }

    pub fn closed(&self) -> u32 {
        self.0.lock().closed
    }

    pub fn flush_calls(&self) -> u32 {
        self.0.lock().flush_calls
    }
}

pub struct MockEncoder {
    label: String,
    /// Units per second of output timeline
    rate: f64,
    state: Arc<Mutex<MockState>>,
    log: Option<WriteLog>,
    frame_size: Option<usize>,
    audio_format: Option<(u32, u16)>,
}

impl MockEncoder {
    pub fn video(fps: f64) -> (Self, MockHandle) {
        Self::new("video", fps)
    }

    pub fn audio(sample_rate: f64) -> (Self, MockHandle) {
        Self::new("audio", sample_rate)
    }

    fn new(label: &str, rate: f64) -> (Self, MockHandle) {
        let handle = MockHandle::default();
        let encoder = Self {
            label: label.to_string(),
            rate,
            state: handle.0.clone(),
            log: None,
            frame_size: None,
            audio_format: None,
        };
        (encoder, handle)
    }

    pub fn with_log(mut self, log: WriteLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Only accept frames of `size` bytes
    pub fn with_frame_size(mut self, size: usize) -> Self {
        self.frame_size = Some(size);
        self
    }

    /// Only accept audio at this rate and channel count
    pub fn with_audio_format(mut self, sample_rate: u32, channels: u16) -> Self {
        self.audio_format = Some((sample_rate, channels));
        self
    }
}

impl StreamEncoder for MockEncoder {
    fn label(&self) -> &str {
        &self.label
    }

    fn open(&mut self) -> EncoderResult<()> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(EncoderError::Process("refused to start".to_string()));
        }
        state.opened += 1;
        Ok(())
    }

    fn encode_and_write(&mut self, unit: MediaUnit<'_>) -> EncoderResult<()> {
        let mut state = self.state.lock();
        let call = state.encode_calls;
        state.encode_calls += 1;
        if state.fail_on.contains(&call) {
            return Err(EncoderError::Rejected(format!("call {call}")));
        }

        let written = match unit {
            MediaUnit::VideoFrame(_) => {
                state.frames += 1;
                Written::Video
            }
            MediaUnit::AudioChunk { frames, .. } => {
                state.samples += frames as u64;
                Written::Audio(frames)
            }
        };
        if let Some(log) = &self.log {
            log.lock().push(written);
        }
        Ok(())
    }

    fn flush(&mut self) -> EncoderResult<FlushState> {
        let mut state = self.state.lock();
        state.flush_calls += 1;
        if state.never_drain {
            return Ok(FlushState::Pending);
        }
        if state.pending_flushes > 0 {
            state.pending_flushes -= 1;
            return Ok(FlushState::Pending);
        }
        Ok(FlushState::Drained)
    }

    fn close(&mut self) -> EncoderResult<()> {
        self.state.lock().closed += 1;
        Ok(())
    }

    fn expected_frame_size(&self) -> Option<usize> {
        self.frame_size
    }

    fn expected_audio_format(&self) -> Option<(u32, u16)> {
        self.audio_format
    }

    fn current_output_seconds(&self) -> f64 {
        let state = self.state.lock();
        if self.label == "video" {
            state.frames as f64 / self.rate
        } else {
            state.samples as f64 / self.rate
        }
    }
}
