//! Open Capture Sync - buffered audio/video interleaving for capture-to-file.
//!
//! Capture callbacks push raw frames and samples into bounded rings without
//! ever waiting on an encoder. A drain thread hands them to per-stream
//! encoders in an order that keeps the output interleaved by media time.

pub mod buffer;
pub mod encoder;
pub mod recorder;
pub mod utils;

pub use buffer::{AudioSampleRing, Popped, VideoFrameRing};
pub use encoder::{EncoderError, FlushState, MediaUnit, StreamEncoder};
pub use recorder::{
    DrainDriver, RecorderConfig, RecordingEvent, RecordingSession, RecordingStats, SessionState,
    StreamMode, SyncScheduler,
};
pub use utils::error::{RecorderError, RecorderResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a `tracing` subscriber filtered by `RUST_LOG`
///
/// Embedding applications usually install their own; this is for binaries
/// and ad-hoc runs.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "open_capture_sync=debug,capture_sync_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
