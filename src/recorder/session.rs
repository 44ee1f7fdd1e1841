//! Recording session
//!
//! Owns the rings, the encoders and the scheduler for one recording and
//! manages its open/suspend/resume/close lifecycle. Every method takes
//! `&self`, so a session can be shared between capture threads and the
//! drain thread behind an `Arc`.

use super::config::RecorderConfig;
use super::scheduler::{AudioLane, DrainReport, SyncScheduler, VideoLane};
use super::state::{SessionSegment, SessionState, StreamMode};
use super::stats::{RecordingStats, StatsSnapshot};
use crate::buffer::{AudioSampleRing, VideoFrameRing};
use crate::encoder::{FlushState, MediaUnit, StreamEncoder};
use crate::utils::error::{RecorderError, RecorderResult};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Audio pushed per step while filling a gap, in seconds
const GAP_AUDIO_BLOCK_SECONDS: f64 = 0.02;

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    /// Session opened
    Opened,
    /// Session suspended, encoders closed
    Suspended,
    /// Session resumed after a suspend
    Resumed,
    /// Session closed
    Closed,
    /// Units rejected by the encoders during one drain pass
    EncoderError(u64),
}

/// Units synthesized by [`RecordingSession::gap_fill`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapFillReport {
    pub frames: u64,
    pub samples: u64,
    /// Blank frames that could not be pushed even after draining
    pub frames_dropped: u64,
    /// Silent sample frames that could not be pushed even after draining
    pub samples_dropped: u64,
}

#[derive(Default)]
struct Rings {
    video: Option<VideoFrameRing>,
    audio: Option<AudioSampleRing>,
}

type SharedEncoder = Mutex<Box<dyn StreamEncoder>>;

/// Builder for [`RecordingSession`]
pub struct SessionBuilder {
    config: RecorderConfig,
    video_encoder: Option<Box<dyn StreamEncoder>>,
    audio_encoder: Option<Box<dyn StreamEncoder>>,
    stats: Option<Arc<RecordingStats>>,
}

impl SessionBuilder {
    pub fn video_encoder(mut self, encoder: Box<dyn StreamEncoder>) -> Self {
        self.video_encoder = Some(encoder);
        self
    }

    pub fn audio_encoder(mut self, encoder: Box<dyn StreamEncoder>) -> Self {
        self.audio_encoder = Some(encoder);
        self
    }

    /// Share counters with the caller instead of creating fresh ones
    pub fn stats(mut self, stats: Arc<RecordingStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn build(self) -> RecorderResult<RecordingSession> {
        let mode = StreamMode::from_streams(self.video_encoder.is_some(), self.audio_encoder.is_some())
            .ok_or_else(|| {
                RecorderError::InvalidConfig("at least one encoder is required".to_string())
            })?;
        let (event_tx, _) = broadcast::channel(100);

        Ok(RecordingSession {
            id: Uuid::new_v4(),
            config: self.config,
            mode,
            state: RwLock::new(SessionState::Idle),
            accepting: AtomicBool::new(false),
            rings: RwLock::new(Rings::default()),
            video_encoder: self.video_encoder.map(Mutex::new),
            audio_encoder: self.audio_encoder.map(Mutex::new),
            scheduler: SyncScheduler::new(),
            stats: self.stats.unwrap_or_default(),
            segments: Mutex::new(Vec::new()),
            segment_baseline: Mutex::new(StatsSnapshot::default()),
            video_overflowing: AtomicBool::new(false),
            audio_overflowing: AtomicBool::new(false),
            event_tx,
        })
    }
}

/// Buffered, interleaved recording of up to one video and one audio stream
pub struct RecordingSession {
    id: Uuid,
    config: RecorderConfig,
    mode: StreamMode,
    state: RwLock<SessionState>,

    /// Gates producer entry; cleared before the rings are torn down
    accepting: AtomicBool,

    rings: RwLock<Rings>,
    video_encoder: Option<SharedEncoder>,
    audio_encoder: Option<SharedEncoder>,
    scheduler: SyncScheduler,
    stats: Arc<RecordingStats>,

    /// One entry per open/resume
    segments: Mutex<Vec<SessionSegment>>,
    segment_baseline: Mutex<StatsSnapshot>,

    video_overflowing: AtomicBool,
    audio_overflowing: AtomicBool,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingSession {
    pub fn builder(config: RecorderConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            video_encoder: None,
            audio_encoder: None,
            stats: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn segments(&self) -> Vec<SessionSegment> {
        self.segments.lock().clone()
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Video ring fill level, if video is buffered and the session is open
    pub fn video_fill_ratio(&self) -> Option<f64> {
        self.rings.read().video.as_ref().map(VideoFrameRing::fill_ratio)
    }

    /// Audio ring fill level, if audio is buffered and the session is open
    pub fn audio_fill_ratio(&self) -> Option<f64> {
        self.rings.read().audio.as_ref().map(AudioSampleRing::fill_ratio)
    }

    /// Validate the configuration, size the rings and open the encoders
    pub fn open(&self) -> RecorderResult<()> {
        let mut state = self.state.write();
        match *state {
            SessionState::Idle => self.start(&mut state, false),
            SessionState::Recording => Err(RecorderError::AlreadyOpen),
            SessionState::Suspended => Err(RecorderError::NotOpen),
            SessionState::Closed => Err(RecorderError::Closed),
        }
    }

    /// Reopen after [`suspend`](Self::suspend), recomputing ring geometry
    pub fn resume(&self) -> RecorderResult<()> {
        let mut state = self.state.write();
        match *state {
            SessionState::Suspended => self.start(&mut state, true),
            SessionState::Recording => Err(RecorderError::AlreadyOpen),
            SessionState::Idle => Err(RecorderError::NotOpen),
            SessionState::Closed => Err(RecorderError::Closed),
        }
    }

    /// Drain and close the encoders but keep the ring allocations
    pub fn suspend(&self) -> RecorderResult<()> {
        let mut state = self.state.write();
        if *state != SessionState::Recording {
            return Err(RecorderError::NotOpen);
        }
        self.stop(&mut state, true);
        Ok(())
    }

    /// Drain, flush and close the encoders, then release the rings
    pub fn close(&self) -> RecorderResult<()> {
        let mut state = self.state.write();
        match *state {
            SessionState::Recording => {
                self.stop(&mut state, false);
                Ok(())
            }
            SessionState::Suspended => {
                *self.rings.write() = Rings::default();
                *state = SessionState::Closed;
                let _ = self.event_tx.send(RecordingEvent::Closed);
                tracing::info!("Session {} closed while suspended", self.id);
                Ok(())
            }
            SessionState::Idle => Err(RecorderError::NotOpen),
            SessionState::Closed => Err(RecorderError::Closed),
        }
    }

    fn start(&self, state: &mut SessionState, resuming: bool) -> RecorderResult<()> {
        self.config.validate(self.mode)?;
        self.check_encoder_formats()?;

        {
            let mut rings = self.rings.write();
            let video = rings.video.take();
            let audio = rings.audio.take();
            rings.video = self.prepare_video_ring(video);
            rings.audio = self.prepare_audio_ring(audio);
        }

        self.open_encoders()?;

        let index = {
            let mut segments = self.segments.lock();
            let index = segments.len();
            segments.push(SessionSegment::new(index));
            index
        };
        *self.segment_baseline.lock() = self.stats.snapshot();

        self.accepting.store(true, Ordering::Release);
        *state = SessionState::Recording;

        let event = if resuming {
            RecordingEvent::Resumed
        } else {
            RecordingEvent::Opened
        };
        let _ = self.event_tx.send(event);

        let rings = self.rings.read();
        tracing::info!(
            "Session {} {} segment {} ({:?}, video slots: {:?}, audio capacity: {:?})",
            self.id,
            if resuming { "resumed" } else { "opened" },
            index,
            self.mode,
            rings.video.as_ref().map(VideoFrameRing::capacity),
            rings.audio.as_ref().map(AudioSampleRing::capacity),
        );
        Ok(())
    }

    /// Reject a configuration the attached encoders cannot accept
    fn check_encoder_formats(&self) -> RecorderResult<()> {
        if let Some(encoder) = &self.video_encoder {
            let encoder = encoder.lock();
            if let Some(size) = encoder.expected_frame_size() {
                if size != self.config.frame_size_bytes {
                    return Err(RecorderError::InvalidConfig(format!(
                        "frameSizeBytes {} does not match {} encoder frame size {}",
                        self.config.frame_size_bytes,
                        encoder.label(),
                        size
                    )));
                }
            }
        }

        if let Some(encoder) = &self.audio_encoder {
            let encoder = encoder.lock();
            if let Some((sample_rate, channels)) = encoder.expected_audio_format() {
                if (sample_rate, channels) != (self.config.sample_rate, self.config.channel_count) {
                    return Err(RecorderError::InvalidConfig(format!(
                        "{} Hz x {} does not match {} encoder format {} Hz x {}",
                        self.config.sample_rate,
                        self.config.channel_count,
                        encoder.label(),
                        sample_rate,
                        channels
                    )));
                }
            }
        }

        Ok(())
    }

    fn prepare_video_ring(&self, retained: Option<VideoFrameRing>) -> Option<VideoFrameRing> {
        if !self.mode.has_video() || !self.config.video_buffered() {
            return None;
        }
        let slots = self.config.video_slots();
        let frame_size = self.config.frame_size_bytes;
        match retained {
            Some(ring) if ring.capacity() == slots && ring.frame_size() == frame_size => {
                ring.reset();
                Some(ring)
            }
            _ => Some(VideoFrameRing::with_slots(slots, frame_size)),
        }
    }

    fn prepare_audio_ring(&self, retained: Option<AudioSampleRing>) -> Option<AudioSampleRing> {
        if !self.mode.has_audio() || !self.config.audio_buffered() {
            return None;
        }
        let channels = usize::from(self.config.channel_count);
        match retained {
            Some(ring)
                if ring.capacity() == self.config.audio_capacity()
                    && ring.channels() == channels
                    && ring.chunk_seconds() == self.config.chunk_seconds =>
            {
                ring.reset();
                Some(ring)
            }
            _ => Some(AudioSampleRing::new(
                self.config.audio_buffer_seconds,
                self.config.sample_rate,
                self.config.channel_count,
                self.config.chunk_seconds,
            )),
        }
    }

    fn open_encoders(&self) -> RecorderResult<()> {
        if let Some(encoder) = &self.video_encoder {
            encoder.lock().open()?;
        }
        if let Some(encoder) = &self.audio_encoder {
            if let Err(e) = encoder.lock().open() {
                if let Some(video) = &self.video_encoder {
                    let _ = video.lock().close();
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn stop(&self, state: &mut SessionState, suspending: bool) {
        self.accepting.store(false, Ordering::Release);

        // Waits for any push that got past the gate to finish
        let mut rings = self.rings.write();
        let report = self.drain_rings(&rings, true);
        if report.encode_failures > 0 {
            let _ = self
                .event_tx
                .send(RecordingEvent::EncoderError(report.encode_failures));
        }

        if let Some(encoder) = &self.video_encoder {
            self.finish_encoder(&mut **encoder.lock());
        }
        if let Some(encoder) = &self.audio_encoder {
            self.finish_encoder(&mut **encoder.lock());
        }

        let now = self.stats.snapshot();
        let baseline = *self.segment_baseline.lock();
        if let Some(segment) = self.segments.lock().last_mut() {
            segment.end(
                now.video_frames_written - baseline.video_frames_written,
                now.audio_samples_written - baseline.audio_samples_written,
            );
        }

        if suspending {
            *state = SessionState::Suspended;
            let _ = self.event_tx.send(RecordingEvent::Suspended);
        } else {
            *rings = Rings::default();
            *state = SessionState::Closed;
            let _ = self.event_tx.send(RecordingEvent::Closed);
        }

        tracing::info!(
            "Session {} {}: {} frames, {} samples written, {} frames and {} samples dropped",
            self.id,
            if suspending { "suspended" } else { "closed" },
            now.video_frames_written,
            now.audio_samples_written,
            now.video_dropped,
            now.audio_dropped,
        );
    }

    /// Flush until the encoder reports nothing pending, bounded by
    /// `max_flush_rounds`, then close it. Failures are logged only.
    fn finish_encoder(&self, encoder: &mut dyn StreamEncoder) {
        let max_rounds = self.config.max_flush_rounds;
        let mut rounds = 0;
        loop {
            if rounds == max_rounds {
                tracing::warn!(
                    "{} encoder not drained after {} flush rounds",
                    encoder.label(),
                    max_rounds
                );
                break;
            }
            rounds += 1;
            match encoder.flush() {
                Ok(FlushState::Drained) => break,
                Ok(FlushState::Pending) => {}
                Err(e) => {
                    tracing::warn!("Flushing {} encoder failed: {}", encoder.label(), e);
                    break;
                }
            }
        }

        if let Err(e) = encoder.close() {
            tracing::warn!("Closing {} encoder failed: {}", encoder.label(), e);
        }
    }

    /// Queue one video frame. Never blocks on the encoder when buffered;
    /// returns false if the frame was dropped.
    pub fn push_video(&self, frame: &[u8]) -> bool {
        if !self.accepting.load(Ordering::Acquire) {
            return false;
        }
        let rings = self.rings.read();
        if !self.accepting.load(Ordering::Acquire) {
            return false;
        }

        let accepted = match (&rings.video, &self.video_encoder) {
            (Some(ring), _) => ring.push(frame),
            (None, Some(encoder)) => self.write_through(encoder, MediaUnit::VideoFrame(frame)),
            (None, None) => false,
        };

        self.stats.record_video_push(accepted);
        Self::note_overflow(&self.video_overflowing, accepted, "video");
        accepted
    }

    /// Queue `n` sample frames of interleaved audio. Never blocks on the
    /// encoder when buffered; returns false if the run was dropped.
    pub fn push_audio(&self, n: usize, samples: &[f32]) -> bool {
        if !self.accepting.load(Ordering::Acquire) {
            return false;
        }
        let rings = self.rings.read();
        if !self.accepting.load(Ordering::Acquire) {
            return false;
        }

        let accepted = match (&rings.audio, &self.audio_encoder) {
            (Some(ring), _) => ring.push(n, samples),
            (None, Some(_)) if n == 0 => true,
            (None, Some(encoder)) => {
                samples.len() == n * usize::from(self.config.channel_count)
                    && self.write_through(encoder, MediaUnit::AudioChunk { samples, frames: n })
            }
            (None, None) => false,
        };

        self.stats.record_audio_push(n, accepted);
        Self::note_overflow(&self.audio_overflowing, accepted, "audio");
        accepted
    }

    /// Encode directly on the calling thread for an unbuffered stream
    fn write_through(&self, encoder: &SharedEncoder, unit: MediaUnit<'_>) -> bool {
        if let MediaUnit::VideoFrame(frame) = unit {
            if frame.len() != self.config.frame_size_bytes {
                return false;
            }
        }

        let mut encoder = encoder.lock();
        let report = match encoder.encode_and_write(unit) {
            Ok(()) => match unit {
                MediaUnit::VideoFrame(_) => DrainReport {
                    video_frames: 1,
                    ..Default::default()
                },
                MediaUnit::AudioChunk { frames, .. } => DrainReport {
                    audio_chunks: 1,
                    audio_samples: frames as u64,
                    ..Default::default()
                },
            },
            Err(e) => {
                tracing::warn!("{} encoder dropped a unit: {}", encoder.label(), e);
                DrainReport {
                    encode_failures: 1,
                    ..Default::default()
                }
            }
        };
        self.stats.record_drain(&report);
        report.encode_failures == 0
    }

    fn note_overflow(flag: &AtomicBool, accepted: bool, stream: &str) {
        if accepted {
            if flag.swap(false, Ordering::Relaxed) {
                tracing::info!("{} input accepted again", stream);
            }
        } else if !flag.swap(true, Ordering::Relaxed) {
            tracing::warn!("{} input dropped, buffer full or encoder failing", stream);
        }
    }

    /// Run the scheduler once. Call once per pipeline tick from the drain
    /// thread; does nothing unless the session is recording.
    pub fn drain(&self) -> DrainReport {
        if self.state() != SessionState::Recording {
            return DrainReport::default();
        }
        let rings = self.rings.read();
        let report = self.drain_rings(&rings, false);
        if !report.is_empty() {
            tracing::debug!(
                "Drained {} frames, {} chunks ({} samples), {} stale skips",
                report.video_frames,
                report.audio_chunks,
                report.audio_samples,
                report.stale_skips
            );
        }
        if report.encode_failures > 0 {
            let _ = self
                .event_tx
                .send(RecordingEvent::EncoderError(report.encode_failures));
        }
        report
    }

    fn drain_rings(&self, rings: &Rings, until_empty: bool) -> DrainReport {
        let mut video_guard = rings
            .video
            .as_ref()
            .and(self.video_encoder.as_ref())
            .map(|encoder| encoder.lock());
        let mut audio_guard = rings
            .audio
            .as_ref()
            .and(self.audio_encoder.as_ref())
            .map(|encoder| encoder.lock());

        let video = rings
            .video
            .as_ref()
            .zip(video_guard.as_mut())
            .map(|(ring, guard)| VideoLane::new(ring, &mut ***guard));
        let audio = rings
            .audio
            .as_ref()
            .zip(audio_guard.as_mut())
            .map(|(ring, guard)| AudioLane::new(ring, &mut ***guard));

        let report = if until_empty {
            self.scheduler.drain_remaining(video, audio)
        } else {
            self.scheduler.drain(video, audio)
        };
        self.stats.record_drain(&report);
        report
    }

    /// Cover a sensor dropout of `seconds` with blank frames and silence.
    ///
    /// The synthesized units go through the normal push path, draining
    /// whenever a ring fills up, so a gap longer than the buffers still
    /// reaches the encoders in full.
    pub fn gap_fill(&self, seconds: f64) -> RecorderResult<GapFillReport> {
        if self.state() != SessionState::Recording {
            return Err(RecorderError::NotOpen);
        }
        if !seconds.is_finite() || seconds <= 0.0 {
            return Ok(GapFillReport::default());
        }

        let frames = if self.mode.has_video() {
            (seconds * self.config.frames_per_second).round() as usize
        } else {
            0
        };
        let samples = if self.mode.has_audio() {
            (seconds * self.config.sample_rate as f64).round() as usize
        } else {
            0
        };

        // One step per frame, or per audio block for audio-only sessions
        let audio_block = ((GAP_AUDIO_BLOCK_SECONDS * self.config.sample_rate as f64) as usize).max(1);
        let steps = if frames > 0 {
            frames
        } else {
            samples.div_ceil(audio_block)
        };

        let blank_frame = vec![0u8; self.config.frame_size_bytes];
        let channels = usize::from(self.config.channel_count);
        let mut report = GapFillReport::default();
        let mut samples_queued = 0usize;

        // Audio share first so a full video ring can drain behind it
        for step in 0..steps {
            if samples > 0 {
                let target = samples * (step + 1) / steps;
                while samples_queued < target {
                    let n = (target - samples_queued).min(self.max_audio_push());
                    let silence = vec![0.0f32; n * channels];
                    if self.push_with_backpressure(|| self.push_audio(n, &silence)) {
                        report.samples += n as u64;
                    } else {
                        report.samples_dropped += n as u64;
                    }
                    samples_queued += n;
                }
            }

            if step < frames {
                if self.push_with_backpressure(|| self.push_video(&blank_frame)) {
                    report.frames += 1;
                } else {
                    report.frames_dropped += 1;
                }
            }
        }

        self.stats.record_gap(report.frames, report.samples);
        tracing::info!(
            "Filled {:.3}s gap with {} frames and {} samples",
            seconds,
            report.frames,
            report.samples
        );
        Ok(report)
    }

    /// Largest audio run that can fit into an empty ring
    fn max_audio_push(&self) -> usize {
        self.rings
            .read()
            .audio
            .as_ref()
            .map_or(usize::MAX, |ring| (ring.capacity() / 2).max(1))
    }

    /// Retry `push` after each drain pass until it fits or draining stalls
    fn push_with_backpressure(&self, push: impl Fn() -> bool) -> bool {
        loop {
            if push() {
                return true;
            }
            if self.drain().is_empty() {
                return false;
            }
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        let mut state = self.state.write();
        if *state == SessionState::Recording {
            tracing::warn!("Session {} dropped while recording, closing", self.id);
            self.stop(&mut state, false);
        }
    }
}
