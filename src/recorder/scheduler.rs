//! Interleaving scheduler
//!
//! Decides which ring to drain next by comparing how far each encoder's
//! committed output has advanced. The stream that is behind goes next; audio
//! wins ties. Using the encoders' own timelines rather than arrival order
//! keeps the container interleaved even when an encoder delays output.

use crate::buffer::{AudioSampleRing, Popped, VideoFrameRing};
use crate::encoder::{MediaUnit, StreamEncoder};
use serde::{Deserialize, Serialize};

/// What one drain pass handed to the encoders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub video_frames: u64,
    pub audio_chunks: u64,
    pub audio_samples: u64,
    /// Units the encoder failed on; they are consumed and not retried
    pub encode_failures: u64,
    pub stale_skips: u64,
    /// Trailing audio shorter than one chunk left behind at shutdown
    pub audio_samples_discarded: u64,
}

impl DrainReport {
    /// Units popped and consumed, successful or not
    pub fn units(&self) -> u64 {
        self.video_frames + self.audio_chunks + self.encode_failures
    }

    pub fn is_empty(&self) -> bool {
        self.units() == 0
    }

    /// Add another report's counts into this one
    pub fn absorb(&mut self, other: &DrainReport) {
        self.video_frames += other.video_frames;
        self.audio_chunks += other.audio_chunks;
        self.audio_samples += other.audio_samples;
        self.encode_failures += other.encode_failures;
        self.stale_skips += other.stale_skips;
        self.audio_samples_discarded += other.audio_samples_discarded;
    }
}

/// Video ring paired with the encoder it drains into
pub struct VideoLane<'a> {
    pub ring: &'a VideoFrameRing,
    pub encoder: &'a mut dyn StreamEncoder,
}

/// Audio ring paired with the encoder it drains into
pub struct AudioLane<'a> {
    pub ring: &'a AudioSampleRing,
    pub encoder: &'a mut dyn StreamEncoder,
}

impl<'a> VideoLane<'a> {
    pub fn new(ring: &'a VideoFrameRing, encoder: &'a mut dyn StreamEncoder) -> Self {
        Self { ring, encoder }
    }
}

impl<'a> AudioLane<'a> {
    pub fn new(ring: &'a AudioSampleRing, encoder: &'a mut dyn StreamEncoder) -> Self {
        Self { ring, encoder }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pick {
    Video,
    Audio,
    Starved,
}

/// Arbitrates between a video and an audio ring
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncScheduler;

impl SyncScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Drain until the stream that is behind has nothing deliverable.
    ///
    /// When audio is due but no full chunk is buffered the pass stops rather
    /// than writing video ahead of it.
    pub fn drain(&self, video: Option<VideoLane<'_>>, audio: Option<AudioLane<'_>>) -> DrainReport {
        let report = self.run(video, audio, false);
        if !report.is_empty() {
            tracing::trace!("Drain pass: {:?}", report);
        }
        report
    }

    /// Drain both rings completely, used when a session shuts down.
    ///
    /// Follows the same ordering while both streams have data, then empties
    /// whichever remains. Audio shorter than one fixed chunk cannot be
    /// delivered and is reported as discarded.
    pub fn drain_remaining(
        &self,
        video: Option<VideoLane<'_>>,
        audio: Option<AudioLane<'_>>,
    ) -> DrainReport {
        let remaining_ring = audio.as_ref().map(|lane| lane.ring);
        let mut report = self.run(video, audio, true);
        if let Some(ring) = remaining_ring {
            report.audio_samples_discarded = ring.pushed_count() as u64;
        }
        tracing::debug!("Final drain: {:?}", report);
        report
    }

    fn run(
        &self,
        mut video: Option<VideoLane<'_>>,
        mut audio: Option<AudioLane<'_>>,
        until_empty: bool,
    ) -> DrainReport {
        let mut report = DrainReport::default();

        loop {
            let video_ready = video.as_ref().is_some_and(|lane| lane.ring.has_frame());
            let audio_ready = audio.as_ref().is_some_and(|lane| lane.ring.has_full_chunk());

            let pick = match (&video, &audio) {
                (Some(v), Some(a)) => {
                    let video_time = v.encoder.current_output_seconds();
                    let audio_time = a.encoder.current_output_seconds();
                    let audio_due = audio_time <= video_time;
                    match (audio_due, audio_ready, video_ready) {
                        (true, true, _) => Pick::Audio,
                        (false, _, true) => Pick::Video,
                        (true, false, true) if until_empty => Pick::Video,
                        (false, true, false) if until_empty => Pick::Audio,
                        _ => Pick::Starved,
                    }
                }
                (Some(_), None) if video_ready => Pick::Video,
                (None, Some(_)) if audio_ready => Pick::Audio,
                _ => Pick::Starved,
            };

            let progressed = match pick {
                Pick::Video => video
                    .as_mut()
                    .is_some_and(|lane| Self::write_video(lane, &mut report)),
                Pick::Audio => audio
                    .as_mut()
                    .is_some_and(|lane| Self::write_audio(lane, &mut report)),
                Pick::Starved => false,
            };

            if !progressed {
                break;
            }
        }

        report
    }

    /// Pop one frame and hand it to the encoder. Returns false if the ring
    /// had nothing fresh.
    fn write_video(lane: &mut VideoLane<'_>, report: &mut DrainReport) -> bool {
        match lane.ring.pop() {
            Popped::Fresh(frame) => {
                match lane.encoder.encode_and_write(MediaUnit::VideoFrame(&frame)) {
                    Ok(()) => report.video_frames += 1,
                    Err(e) => {
                        report.encode_failures += 1;
                        tracing::warn!("{} encoder dropped a frame: {}", lane.encoder.label(), e);
                    }
                }
                drop(frame);
                lane.ring.pop_done();
                true
            }
            Popped::Stale(_) => {
                report.stale_skips += 1;
                false
            }
        }
    }

    /// Pop one chunk and hand it to the encoder. Returns false if the ring
    /// had nothing fresh.
    fn write_audio(lane: &mut AudioLane<'_>, report: &mut DrainReport) -> bool {
        let channels = lane.ring.channels();
        match lane.ring.pop(0) {
            Popped::Fresh(samples) => {
                let frames = samples.len() / channels;
                let unit = MediaUnit::AudioChunk {
                    samples: &samples,
                    frames,
                };
                match lane.encoder.encode_and_write(unit) {
                    Ok(()) => {
                        report.audio_chunks += 1;
                        report.audio_samples += frames as u64;
                    }
                    Err(e) => {
                        report.encode_failures += 1;
                        tracing::warn!(
                            "{} encoder dropped a chunk of {} samples: {}",
                            lane.encoder.label(),
                            frames,
                            e
                        );
                    }
                }
                drop(samples);
                lane.ring.pop_done(frames);
                true
            }
            Popped::Stale(_) => {
                report.stale_skips += 1;
                false
            }
        }
    }
}
