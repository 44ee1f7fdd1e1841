//! Periodic drain task
//!
//! Runs [`RecordingSession::drain`] once per tick on the tokio blocking
//! pool, so encoder I/O never stalls the runtime's worker threads.

use super::scheduler::DrainReport;
use super::session::RecordingSession;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle to a running drain loop
pub struct DrainDriver {
    running: Arc<AtomicBool>,
    handle: JoinHandle<DrainReport>,
}

impl DrainDriver {
    /// Start draining `session` every `tick`. Must be called inside a tokio
    /// runtime.
    pub fn spawn(session: Arc<RecordingSession>, tick: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_flag = running.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut total = DrainReport::default();

            tracing::debug!("Drain driver started for session {}", session.id());

            while running_flag.load(Ordering::Relaxed) {
                interval.tick().await;

                let session = session.clone();
                match tokio::task::spawn_blocking(move || session.drain()).await {
                    Ok(report) => total.absorb(&report),
                    Err(e) => {
                        tracing::error!("Drain pass panicked: {}", e);
                        break;
                    }
                }
            }

            tracing::debug!("Drain driver stopped after {} units", total.units());
            total
        });

        Self { running, handle }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed) && !self.handle.is_finished()
    }

    /// Stop the loop after its current pass and return everything it drained
    pub async fn stop(self) -> DrainReport {
        self.running.store(false, Ordering::Relaxed);
        self.handle.await.unwrap_or_default()
    }
}
