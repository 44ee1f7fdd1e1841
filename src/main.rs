//! Synthetic capture demo
//!
//! Records a moving test pattern and a sine tone through FFmpeg into
//! `<out_dir>/video.mp4` and `<out_dir>/audio.m4a`.
//!
//! Usage: `capture-sync-demo [out_dir] [seconds] [config.json]`

use anyhow::Context;
use open_capture_sync::encoder::FfmpegPipeEncoder;
use open_capture_sync::recorder::{DrainDriver, RecorderConfig, RecordingSession};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const TONE_HZ: f32 = 440.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    open_capture_sync::init_tracing();

    let mut args = std::env::args().skip(1);
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "capture-out".to_string()));
    let seconds: f64 = match args.next() {
        Some(s) => s.parse().context("seconds must be a number")?,
        None => 3.0,
    };
    let mut config = match args.next() {
        Some(path) => RecorderConfig::from_path(Path::new(&path))
            .with_context(|| format!("failed to load config {}", path))?,
        None => RecorderConfig {
            chunk_seconds: 0.02,
            ..Default::default()
        },
    };
    config.frame_size_bytes = (WIDTH * HEIGHT * 4) as usize;

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    tracing::info!(
        "Recording {}s into {} ({} fps, {} Hz x {})",
        seconds,
        out_dir.display(),
        config.frames_per_second,
        config.sample_rate,
        config.channel_count
    );

    let video = FfmpegPipeEncoder::video(
        WIDTH,
        HEIGHT,
        config.frames_per_second,
        out_dir.join("video.mp4"),
    );
    let audio = FfmpegPipeEncoder::audio(
        config.sample_rate,
        config.channel_count,
        out_dir.join("audio.m4a"),
    );

    let session = Arc::new(
        RecordingSession::builder(config.clone())
            .video_encoder(Box::new(video))
            .audio_encoder(Box::new(audio))
            .build()?,
    );
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!("Session event: {:?}", event);
        }
    });

    session.open()?;
    let driver = DrainDriver::spawn(session.clone(), Duration::from_millis(10));

    let running = Arc::new(AtomicBool::new(true));
    let producers = [
        spawn_video_producer(session.clone(), running.clone(), config.frames_per_second),
        spawn_audio_producer(session.clone(), running.clone(), &config),
    ];

    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    running.store(false, Ordering::Relaxed);
    for producer in producers {
        if producer.join().is_err() {
            tracing::warn!("Producer thread panicked");
        }
    }

    let report = driver.stop().await;
    tracing::info!("Drain driver handled {} units", report.units());

    let closing = session.clone();
    tokio::task::spawn_blocking(move || closing.close()).await??;

    println!("{}", serde_json::to_string_pretty(&session.stats())?);
    println!("{}", serde_json::to_string_pretty(&session.segments())?);
    Ok(())
}

fn spawn_video_producer(
    session: Arc<RecordingSession>,
    running: Arc<AtomicBool>,
    fps: f64,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let frame_interval = Duration::from_secs_f64(1.0 / fps);
        let mut frame = vec![0u8; (WIDTH * HEIGHT * 4) as usize];
        let mut index = 0usize;
        let start = Instant::now();

        while running.load(Ordering::Relaxed) {
            // Vertical bar sweeping across the frame
            let bar = index % WIDTH as usize;
            for (i, pixel) in frame.chunks_exact_mut(4).enumerate() {
                let x = i % WIDTH as usize;
                let shade = if x.abs_diff(bar) < 8 { 255 } else { (x * 255 / WIDTH as usize) as u8 / 4 };
                pixel.copy_from_slice(&[shade, shade, shade, 255]);
            }
            session.push_video(&frame);
            index += 1;

            let next = frame_interval.mul_f64(index as f64);
            if let Some(wait) = next.checked_sub(start.elapsed()) {
                std::thread::sleep(wait);
            }
        }
    })
}

fn spawn_audio_producer(
    session: Arc<RecordingSession>,
    running: Arc<AtomicBool>,
    config: &RecorderConfig,
) -> std::thread::JoinHandle<()> {
    let sample_rate = config.sample_rate;
    let channels = usize::from(config.channel_count);

    std::thread::spawn(move || {
        // 10ms callbacks, like a typical capture device
        let period = (sample_rate / 100) as usize;
        let mut samples = vec![0.0f32; period * channels];
        let mut phase = 0usize;
        let start = Instant::now();
        let mut periods = 0u32;

        while running.load(Ordering::Relaxed) {
            for frame in samples.chunks_exact_mut(channels) {
                let t = phase as f32 / sample_rate as f32;
                frame.fill((t * TONE_HZ * std::f32::consts::TAU).sin() * 0.2);
                phase += 1;
            }
            session.push_audio(period, &samples);
            periods += 1;

            let next = Duration::from_millis(10) * periods;
            if let Some(wait) = next.checked_sub(start.elapsed()) {
                std::thread::sleep(wait);
            }
        }
    })
}
