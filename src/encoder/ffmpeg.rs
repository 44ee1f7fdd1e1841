//! FFmpeg pipe encoder
//!
//! Spawns an `ffmpeg` process per stream and streams raw units to its stdin.
//! Video is written as raw frames, audio as little-endian `f32` samples.

use super::{EncoderError, EncoderResult, FlushState, MediaUnit, StreamEncoder};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Raw input layout fed to FFmpeg
#[derive(Debug, Clone, PartialEq)]
pub enum PipeFormat {
    RawVideo {
        width: u32,
        height: u32,
        /// FFmpeg pixel format name, e.g. `bgra`
        pixel_format: String,
        bytes_per_pixel: u32,
        /// Exact input frame rate; fractional rates such as 29.97 are kept
        fps: f64,
    },
    PcmF32 {
        sample_rate: u32,
        channels: u16,
    },
}

impl PipeFormat {
    /// Units per second of output timeline
    fn rate(&self) -> f64 {
        match self {
            PipeFormat::RawVideo { fps, .. } => *fps,
            PipeFormat::PcmF32 { sample_rate, .. } => *sample_rate as f64,
        }
    }

    /// Size in bytes of one video frame (0 for audio)
    pub fn frame_size(&self) -> usize {
        match self {
            PipeFormat::RawVideo {
                width,
                height,
                bytes_per_pixel,
                ..
            } => (*width as usize) * (*height as usize) * (*bytes_per_pixel as usize),
            PipeFormat::PcmF32 { .. } => 0,
        }
    }
}

/// Build the FFmpeg command line for a stream.
pub fn build_args(format: &PipeFormat, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
    ];

    match format {
        PipeFormat::RawVideo {
            width,
            height,
            pixel_format,
            fps,
            ..
        } => {
            args.extend([
                "-f".into(),
                "rawvideo".into(),
                "-pixel_format".into(),
                pixel_format.clone(),
                "-video_size".into(),
                format!("{width}x{height}"),
                "-framerate".into(),
                fps.to_string(),
                "-i".into(),
                "-".into(),
                "-c:v".into(),
                "libx264".into(),
                "-preset".into(),
                "veryfast".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
                "-g".into(),
                ((fps * 2.0).round() as u32).to_string(),
            ]);
        }
        PipeFormat::PcmF32 {
            sample_rate,
            channels,
        } => {
            args.extend([
                "-f".into(),
                "f32le".into(),
                "-ar".into(),
                sample_rate.to_string(),
                "-ac".into(),
                channels.to_string(),
                "-i".into(),
                "-".into(),
                "-c:a".into(),
                "aac".into(),
            ]);
        }
    }

    args.push(output.to_string_lossy().to_string());
    args
}

/// Stream encoder backed by an `ffmpeg` child process
pub struct FfmpegPipeEncoder {
    label: String,
    format: PipeFormat,
    output_path: PathBuf,
    process: Option<Child>,
    /// Frames (video) or sample frames (audio) written to the pipe
    units_written: u64,
}

impl FfmpegPipeEncoder {
    pub fn new(label: impl Into<String>, format: PipeFormat, output_path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            format,
            output_path: output_path.into(),
            process: None,
            units_written: 0,
        }
    }

    /// Encoder writing BGRA frames to an H.264 file
    pub fn video(width: u32, height: u32, fps: f64, output_path: impl Into<PathBuf>) -> Self {
        Self::new(
            "video",
            PipeFormat::RawVideo {
                width,
                height,
                pixel_format: "bgra".to_string(),
                bytes_per_pixel: 4,
                fps,
            },
            output_path,
        )
    }

    /// Encoder writing float samples to an AAC file
    pub fn audio(sample_rate: u32, channels: u16, output_path: impl Into<PathBuf>) -> Self {
        Self::new(
            "audio",
            PipeFormat::PcmF32 {
                sample_rate,
                channels,
            },
            output_path,
        )
    }

    pub fn format(&self) -> &PipeFormat {
        &self.format
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> EncoderResult<()> {
        let process = self.process.as_mut().ok_or(EncoderError::NotOpen)?;
        let stdin = process.stdin.as_mut().ok_or(EncoderError::NotOpen)?;
        stdin.write_all(bytes)?;
        Ok(())
    }
}

impl StreamEncoder for FfmpegPipeEncoder {
    fn label(&self) -> &str {
        &self.label
    }

    fn open(&mut self) -> EncoderResult<()> {
        if self.process.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let process = Command::new("ffmpeg")
            .args(build_args(&self.format, &self.output_path))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        tracing::info!(
            "Started FFmpeg {} encoder: {:?}, output: {:?}",
            self.label,
            self.format,
            self.output_path
        );

        self.process = Some(process);
        self.units_written = 0;
        Ok(())
    }

    fn encode_and_write(&mut self, unit: MediaUnit<'_>) -> EncoderResult<()> {
        let is_video = matches!(self.format, PipeFormat::RawVideo { .. });
        match unit {
            MediaUnit::VideoFrame(frame) if is_video => {
                let expected = self.format.frame_size();
                if frame.len() != expected {
                    return Err(EncoderError::Rejected(format!(
                        "frame has {} bytes, expected {}",
                        frame.len(),
                        expected
                    )));
                }
                self.write_bytes(frame)?;
                self.units_written += 1;
            }
            MediaUnit::AudioChunk { samples, frames } if !is_video => {
                let bytes: Vec<u8> = samples
                    .iter()
                    .flat_map(|&sample| sample.to_le_bytes())
                    .collect();
                self.write_bytes(&bytes)?;
                self.units_written += frames as u64;
            }
            unit => {
                return Err(EncoderError::Rejected(format!(
                    "{unit:?} does not match stream format {:?}",
                    self.format
                )));
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> EncoderResult<FlushState> {
        let Some(mut process) = self.process.take() else {
            return Ok(FlushState::Drained);
        };

        // Closing stdin lets FFmpeg encode its delayed frames and exit
        drop(process.stdin.take());
        let status = process.wait()?;
        if !status.success() {
            return Err(EncoderError::Process(format!(
                "ffmpeg exited with status {}",
                status
            )));
        }

        tracing::info!(
            "FFmpeg {} finished: {} units, output: {:?}",
            self.label,
            self.units_written,
            self.output_path
        );
        Ok(FlushState::Drained)
    }

    fn close(&mut self) -> EncoderResult<()> {
        if let Some(mut process) = self.process.take() {
            tracing::warn!("Closing {} encoder without flush, killing FFmpeg", self.label);
            process.kill()?;
            let _ = process.wait();
        }
        Ok(())
    }

    fn expected_frame_size(&self) -> Option<usize> {
        match self.format {
            PipeFormat::RawVideo { .. } => Some(self.format.frame_size()),
            PipeFormat::PcmF32 { .. } => None,
        }
    }

    fn expected_audio_format(&self) -> Option<(u32, u16)> {
        match self.format {
            PipeFormat::PcmF32 {
                sample_rate,
                channels,
            } => Some((sample_rate, channels)),
            PipeFormat::RawVideo { .. } => None,
        }
    }

    fn current_output_seconds(&self) -> f64 {
        self.units_written as f64 / self.format.rate()
    }
}

impl Drop for FfmpegPipeEncoder {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_args() {
        let encoder = FfmpegPipeEncoder::video(640, 480, 30.0, "/tmp/out/video.mp4");
        let args = build_args(encoder.format(), encoder.output_path());
        let joined = args.join(" ");
        assert!(joined.contains("-loglevel error"));
        assert!(joined.contains("-f rawvideo"));
        assert!(joined.contains("-pixel_format bgra"));
        assert!(joined.contains("-video_size 640x480"));
        assert!(joined.contains("-framerate 30"));
        assert!(joined.contains("-g 60"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out/video.mp4"));
    }

    #[test]
    fn test_audio_args() {
        let args = build_args(
            &PipeFormat::PcmF32 {
                sample_rate: 48_000,
                channels: 2,
            },
            Path::new("audio.m4a"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-f f32le"));
        assert!(joined.contains("-ar 48000"));
        assert!(joined.contains("-ac 2"));
        assert_eq!(args.last().map(String::as_str), Some("audio.m4a"));
    }

    #[test]
    fn test_frame_size() {
        let encoder = FfmpegPipeEncoder::video(4, 2, 25.0, "v.mp4");
        assert_eq!(encoder.format().frame_size(), 32);
        assert_eq!(encoder.expected_frame_size(), Some(32));
        assert_eq!(encoder.expected_audio_format(), None);

        let audio = FfmpegPipeEncoder::audio(8000, 1, "a.m4a");
        assert_eq!(audio.format().frame_size(), 0);
        assert_eq!(audio.expected_frame_size(), None);
        assert_eq!(audio.expected_audio_format(), Some((8000, 1)));
    }

    #[test]
    fn test_fractional_frame_rate() {
        let encoder = FfmpegPipeEncoder::video(4, 2, 29.97, "v.mp4");
        let joined = build_args(encoder.format(), encoder.output_path()).join(" ");
        assert!(joined.contains("-framerate 29.97"));
        assert!(joined.contains("-g 60"));
        assert_eq!(encoder.current_output_seconds(), 0.0);
    }

    #[test]
    fn test_write_before_open_fails() {
        let mut encoder = FfmpegPipeEncoder::audio(8000, 1, "a.m4a");
        let result = encoder.encode_and_write(MediaUnit::AudioChunk {
            samples: &[0.0; 4],
            frames: 4,
        });
        assert!(matches!(result, Err(EncoderError::NotOpen)));
        assert_eq!(encoder.current_output_seconds(), 0.0);
    }

    #[test]
    fn test_mismatched_unit_is_rejected() {
        let mut encoder = FfmpegPipeEncoder::audio(8000, 1, "a.m4a");
        let result = encoder.encode_and_write(MediaUnit::VideoFrame(&[0; 4]));
        assert!(matches!(result, Err(EncoderError::Rejected(_))));
    }

    #[test]
    fn test_flush_without_process_is_drained() {
        let mut encoder = FfmpegPipeEncoder::video(2, 2, 30.0, "v.mp4");
        assert_eq!(encoder.flush().unwrap(), FlushState::Drained);
        assert!(encoder.close().is_ok());
    }
}
