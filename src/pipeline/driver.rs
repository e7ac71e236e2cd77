//! Drives a tracker from the service's authoritative status.
//!
//! The displayed stage only moves forward, one step at a time, never faster
//! than the dwell floor and never past what the service has reported.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::{PipelineError, ProcessingPipelineTracker, Stage};
use crate::config::PipelineConfig;

#[derive(Debug, Clone)]
pub struct PipelineDriver {
    poll_interval: Duration,
    stage_dwell: Duration,
    timeout: Duration,
}

impl PipelineDriver {
    pub fn new(poll_interval: Duration, stage_dwell: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            stage_dwell,
            timeout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.poll_interval(), config.stage_dwell(), config.timeout())
    }

    /// Poll until the job is terminal. Returns the final stage, or
    /// `JobFailed` if the service (or the timeout) failed it.
    ///
    /// Dropping the returned future stops polling; tear the tracker down to
    /// also cancel its pending navigation.
    pub async fn run(
        &self,
        tracker: &mut ProcessingPipelineTracker,
    ) -> Result<Stage, PipelineError> {
        let job_id = tracker
            .job()
            .map(|j| j.id.clone())
            .ok_or(PipelineError::NotSubmitted)?;

        let started = Instant::now();
        let mut last_step = started;

        while !tracker.is_terminal() {
            if started.elapsed() >= self.timeout {
                tracker.fail(format!(
                    "Processing timed out after {} seconds",
                    self.timeout.as_secs()
                ))?;
                break;
            }

            match tracker.poll_status().await {
                Ok(status) if status.stage == Stage::Failed => {
                    let message = status
                        .error_message
                        .unwrap_or_else(|| "Processing failed".to_string());
                    tracker.fail(message)?;
                    break;
                }
                Ok(status) => {
                    self.catch_up(tracker, status.stage, &mut last_step).await?;
                }
                Err(e) => {
                    warn!("Status check for job {} failed, retrying: {}", job_id, e);
                }
            }

            if !tracker.is_terminal() {
                sleep(self.poll_interval).await;
            }
        }

        let job = tracker.job().ok_or(PipelineError::NotSubmitted)?;
        match job.stage {
            Stage::Failed => Err(PipelineError::JobFailed(
                job.error_message.clone().unwrap_or_default(),
            )),
            stage => Ok(stage),
        }
    }

    /// Step toward `reported`, holding each stage for at least the dwell.
    async fn catch_up(
        &self,
        tracker: &mut ProcessingPipelineTracker,
        reported: Stage,
        last_step: &mut Instant,
    ) -> Result<(), PipelineError> {
        let Some(target) = reported.index() else {
            return Ok(());
        };

        while tracker.stage().index().is_some_and(|i| i < target) {
            let shown = last_step.elapsed();
            if shown < self.stage_dwell {
                sleep(self.stage_dwell - shown).await;
            }
            let stage = tracker.advance()?;
            debug!("Displayed stage moved to {}", stage);
            *last_step = Instant::now();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tracker::tests::{tracker_with, ScriptedBackend};
    use crate::pipeline::{SourceKind, TrackerEvent, PIPELINE};
    use tokio::sync::broadcast::{self, error::TryRecvError};

    fn driver() -> PipelineDriver {
        PipelineDriver::new(
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(7200),
        )
    }

    fn progress(rx: &mut broadcast::Receiver<TrackerEvent>) -> Vec<(Stage, u8)> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let TrackerEvent::Progress(job) = event {
                seen.push((job.stage, job.progress_percent));
            }
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_shows_every_stage_in_order() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[
            Stage::Uploading,
            Stage::Diarizing,
            Stage::Completed,
        ]));
        let mut rx = tracker.subscribe();
        tracker.attach("job_1", SourceKind::Recording).unwrap();

        let started = Instant::now();
        let stage = driver().run(&mut tracker).await.unwrap();
        assert_eq!(stage, Stage::Completed);
        // Five steps, each held for the dwell.
        assert!(started.elapsed() >= Duration::from_secs(10));

        let seen = progress(&mut rx);
        let stages: Vec<Stage> = seen.iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, PIPELINE.to_vec());
        assert!(seen.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_never_passes_reported_stage() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[
            Stage::Transcribing,
            Stage::Transcribing,
            Stage::Analyzing,
        ]));
        tracker.attach("job_2", SourceKind::Upload).unwrap();

        let outcome =
            tokio::time::timeout(Duration::from_secs(60), driver().run(&mut tracker)).await;
        assert!(outcome.is_err());
        assert_eq!(tracker.stage(), Stage::Analyzing);
        assert!(!tracker.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reported_failure_fails_job() {
        let mut tracker = tracker_with(ScriptedBackend::failing_at(
            &[Stage::Uploading, Stage::Transcribing],
            "ASR crashed",
        ));
        tracker.attach("job_3", SourceKind::Recording).unwrap();

        let err = driver().run(&mut tracker).await.unwrap_err();
        match err {
            PipelineError::JobFailed(message) => assert_eq!(message, "ASR crashed"),
            other => panic!("unexpected error {other:?}"),
        }
        let job = tracker.job().unwrap();
        assert_eq!(job.stage, Stage::Failed);
        assert!(job.terminal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_job() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[Stage::Transcribing]));
        tracker.attach("job_4", SourceKind::Upload).unwrap();

        let driver = PipelineDriver::new(
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(30),
        );
        let err = driver.run(&mut tracker).await.unwrap_err();
        assert!(matches!(err, PipelineError::JobFailed(ref m) if m.contains("timed out")));
        assert_eq!(tracker.stage(), Stage::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_mid_run_stops_all_events() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[
            Stage::Transcribing,
            Stage::Diarizing,
        ]));
        let mut rx = tracker.subscribe();
        tracker.attach("job_5", SourceKind::Recording).unwrap();

        let _ = tokio::time::timeout(Duration::from_secs(20), driver().run(&mut tracker)).await;
        assert_eq!(tracker.stage(), Stage::Diarizing);
        progress(&mut rx);

        tracker.teardown();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(matches!(tracker.advance(), Err(PipelineError::TornDown)));
    }

    #[tokio::test]
    async fn test_run_without_job() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[]));
        assert!(matches!(
            driver().run(&mut tracker).await,
            Err(PipelineError::NotSubmitted)
        ));
    }
}
