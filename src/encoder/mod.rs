//! Per-stream encode-and-write capability
//!
//! The session never looks inside an encoder. It hands over one unit at a
//! time and reads back how much media time the encoder has committed to the
//! output, which is what the scheduler interleaves on.

pub mod ffmpeg;

pub use ffmpeg::{FfmpegPipeEncoder, PipeFormat};

use thiserror::Error;

/// One unit of media handed to an encoder
#[derive(Debug, Clone, Copy)]
pub enum MediaUnit<'a> {
    /// A whole frame of `frame_size_bytes`
    VideoFrame(&'a [u8]),
    /// Interleaved samples; `frames` is the per-channel sample count
    AudioChunk { samples: &'a [f32], frames: usize },
}

impl MediaUnit<'_> {
    /// Number of time steps this unit covers (1 frame, or `frames` samples)
    pub fn len(&self) -> usize {
        match self {
            MediaUnit::VideoFrame(_) => 1,
            MediaUnit::AudioChunk { frames, .. } => *frames,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a single flush round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    /// Delayed output was written and more may follow
    Pending,
    /// Nothing left inside the encoder
    Drained,
}

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoder is not open")]
    NotOpen,

    #[error("Unit rejected: {0}")]
    Rejected(String),

    #[error("Encoder process failed: {0}")]
    Process(String),
}

pub type EncoderResult<T> = Result<T, EncoderError>;

/// Encode-and-write capability for one elementary stream
pub trait StreamEncoder: Send {
    /// Short name used in logs
    fn label(&self) -> &str;

    fn open(&mut self) -> EncoderResult<()>;

    /// Encode one unit and write whatever output it produces.
    fn encode_and_write(&mut self, unit: MediaUnit<'_>) -> EncoderResult<()>;

    /// Write out delayed output. Called repeatedly at close until it
    /// reports [`FlushState::Drained`] or the session gives up.
    fn flush(&mut self) -> EncoderResult<FlushState>;

    fn close(&mut self) -> EncoderResult<()>;

    /// Frame size in bytes this encoder accepts, if it is fixed
    fn expected_frame_size(&self) -> Option<usize> {
        None
    }

    /// Sample rate and channel count this encoder accepts, if fixed
    fn expected_audio_format(&self) -> Option<(u32, u16)> {
        None
    }

    /// End of the committed output timeline in seconds.
    ///
    /// Must reflect what has been written, not what has been submitted.
    fn current_output_seconds(&self) -> f64;
}
