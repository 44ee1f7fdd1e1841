//! Recording session module
//!
//! This module implements the buffered capture-to-file pipeline:
//! - RecorderConfig for ring geometry and chunking
//! - SyncScheduler to interleave ring output by encoder timeline
//! - RecordingSession to own rings, encoders and lifecycle
//! - DrainDriver to run the drain side on a tokio interval

pub mod config;
pub mod driver;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod stats;

pub use config::RecorderConfig;
pub use driver::DrainDriver;
pub use scheduler::{AudioLane, DrainReport, SyncScheduler, VideoLane};
pub use session::{GapFillReport, RecordingEvent, RecordingSession, SessionBuilder};
pub use state::{SessionSegment, SessionState, StreamMode};
pub use stats::{RecordingStats, StatsSnapshot};
