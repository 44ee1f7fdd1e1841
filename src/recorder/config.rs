//! Recording session configuration

use super::state::StreamMode;
use crate::buffer::units_for;
use crate::utils::error::{RecorderError, RecorderResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a recording session
///
/// Buffer lengths are in seconds of media; a length of 0 disables buffering
/// for that stream so pushes are encoded directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Seconds of video held in the frame ring
    pub video_buffer_seconds: f64,

    /// Seconds of audio held in the sample ring
    pub audio_buffer_seconds: f64,

    /// Size of one video frame in bytes
    pub frame_size_bytes: usize,

    /// Audio sample rate in Hz
    pub sample_rate: u32,

    /// Interleaved audio channels
    pub channel_count: u16,

    /// Audio chunk duration handed to the encoder (0 = whatever is buffered)
    pub chunk_seconds: f64,

    /// Video frame rate
    pub frames_per_second: f64,

    /// Upper bound on flush rounds per encoder at close
    pub max_flush_rounds: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            video_buffer_seconds: 2.0,
            audio_buffer_seconds: 2.0,
            frame_size_bytes: 0,
            sample_rate: 48_000,
            channel_count: 1,
            chunk_seconds: 0.0,
            frames_per_second: 30.0,
            max_flush_rounds: 256,
        }
    }
}

impl RecorderConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults
    pub fn from_json_str(json: &str) -> RecorderResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file
    pub fn from_path(path: &Path) -> RecorderResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Number of frame slots in the video ring (0 when unbuffered)
    pub fn video_slots(&self) -> usize {
        units_for(self.video_buffer_seconds, self.frames_per_second)
    }

    /// Capacity of the audio ring in sample frames (0 when unbuffered)
    pub fn audio_capacity(&self) -> usize {
        units_for(self.audio_buffer_seconds, self.sample_rate as f64)
    }

    /// Nominal audio chunk length in sample frames
    pub fn nominal_chunk_len(&self) -> f64 {
        self.chunk_seconds * self.sample_rate as f64
    }

    pub fn video_buffered(&self) -> bool {
        self.video_buffer_seconds > 0.0
    }

    pub fn audio_buffered(&self) -> bool {
        self.audio_buffer_seconds > 0.0
    }

    /// Check the configuration against the streams that will be recorded
    pub fn validate(&self, mode: StreamMode) -> RecorderResult<()> {
        let invalid = |msg: String| Err(RecorderError::InvalidConfig(msg));

        if !self.video_buffer_seconds.is_finite() || self.video_buffer_seconds < 0.0 {
            return invalid(format!(
                "videoBufferSeconds must be >= 0, got {}",
                self.video_buffer_seconds
            ));
        }
        if !self.audio_buffer_seconds.is_finite() || self.audio_buffer_seconds < 0.0 {
            return invalid(format!(
                "audioBufferSeconds must be >= 0, got {}",
                self.audio_buffer_seconds
            ));
        }
        if self.max_flush_rounds == 0 {
            return invalid("maxFlushRounds must be at least 1".to_string());
        }

        if mode.has_video() {
            if self.frame_size_bytes == 0 {
                return invalid("frameSizeBytes must be set for video".to_string());
            }
            if !self.frames_per_second.is_finite() || self.frames_per_second <= 0.0 {
                return invalid(format!(
                    "framesPerSecond must be positive, got {}",
                    self.frames_per_second
                ));
            }
            if self.video_buffered() && self.video_slots() == 0 {
                return invalid(format!(
                    "videoBufferSeconds {} holds no frame at {} fps",
                    self.video_buffer_seconds, self.frames_per_second
                ));
            }
        }

        if mode.has_audio() {
            if self.sample_rate == 0 {
                return invalid("sampleRate must be positive".to_string());
            }
            if self.channel_count == 0 {
                return invalid("channelCount must be positive".to_string());
            }
            if !self.chunk_seconds.is_finite() || self.chunk_seconds < 0.0 {
                return invalid(format!(
                    "chunkSeconds must be >= 0, got {}",
                    self.chunk_seconds
                ));
            }
            if self.chunk_seconds > 0.0 && self.nominal_chunk_len() < 1.0 {
                return invalid(format!(
                    "chunkSeconds {} is shorter than one sample at {} Hz",
                    self.chunk_seconds, self.sample_rate
                ));
            }
            if self.audio_buffered() && (self.audio_capacity() as f64) < self.nominal_chunk_len().ceil() {
                return invalid(format!(
                    "audioBufferSeconds {} cannot hold one {}s chunk",
                    self.audio_buffer_seconds, self.chunk_seconds
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn av_config() -> RecorderConfig {
        RecorderConfig {
            frame_size_bytes: 640 * 480 * 4,
            chunk_seconds: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_validate_for_audio() {
        assert!(RecorderConfig::default().validate(StreamMode::Audio).is_ok());
    }

    #[test]
    fn test_video_requires_frame_size() {
        let err = RecorderConfig::default()
            .validate(StreamMode::AudioVideo)
            .unwrap_err();
        assert!(matches!(err, RecorderError::InvalidConfig(_)));
        assert!(av_config().validate(StreamMode::AudioVideo).is_ok());
    }

    #[test]
    fn test_geometry() {
        let config = av_config();
        assert_eq!(config.video_slots(), 60);
        assert_eq!(config.audio_capacity(), 96_000);
        assert_eq!(config.nominal_chunk_len(), 4800.0);
    }

    #[test]
    fn test_rejects_chunk_larger_than_buffer() {
        let config = RecorderConfig {
            audio_buffer_seconds: 0.05,
            chunk_seconds: 0.1,
            ..Default::default()
        };
        assert!(config.validate(StreamMode::Audio).is_err());

        // Unbuffered audio has no capacity constraint
        let config = RecorderConfig {
            audio_buffer_seconds: 0.0,
            ..config
        };
        assert!(config.validate(StreamMode::Audio).is_ok());
    }

    #[test]
    fn test_rejects_negative_and_non_finite_values() {
        let config = RecorderConfig {
            video_buffer_seconds: -1.0,
            ..av_config()
        };
        assert!(config.validate(StreamMode::Video).is_err());

        let config = RecorderConfig {
            frames_per_second: f64::NAN,
            ..av_config()
        };
        assert!(config.validate(StreamMode::Video).is_err());

        let config = RecorderConfig {
            chunk_seconds: 0.000_001,
            ..av_config()
        };
        assert!(config.validate(StreamMode::Audio).is_err());
    }

    #[test]
    fn test_from_json_uses_defaults() {
        let config = RecorderConfig::from_json_str(
            r#"{ "frameSizeBytes": 1024, "chunkSeconds": 0.02, "videoBufferSeconds": 1.5 }"#,
        )
        .unwrap();
        assert_eq!(config.frame_size_bytes, 1024);
        assert_eq!(config.chunk_seconds, 0.02);
        assert_eq!(config.video_buffer_seconds, 1.5);
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.max_flush_rounds, 256);
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "sampleRate": 16000, "channelCount": 2 }}"#).unwrap();

        let config = RecorderConfig::from_path(file.path()).unwrap();
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.channel_count, 2);

        let err = RecorderConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, RecorderError::Serialization(_)));
    }
}
