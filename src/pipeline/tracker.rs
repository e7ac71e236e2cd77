//! Processing job state machine.
//!
//! uploading → transcribing → diarizing → analyzing → summarizing → completed,
//! with `failed` reachable from any non-terminal stage. Reaching `completed`
//! schedules a single delayed navigation event.

use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{PipelineError, Stage};
use crate::audio::AudioArtifact;
use crate::backend::{JobStatus, ProcessingBackend, SubmissionMetadata};
use crate::meeting::MeetingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Recording,
    Upload,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recording => "recording",
            Self::Upload => "upload",
        }
    }
}

/// What is being handed to the service.
#[derive(Debug, Clone, Copy)]
pub enum Submission<'a> {
    Recording(&'a AudioArtifact),
    Upload(&'a Path),
}

impl Submission<'_> {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Self::Recording(_) => SourceKind::Recording,
            Self::Upload(_) => SourceKind::Upload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    pub id: String,
    pub stage: Stage,
    pub progress_percent: u8,
    pub source_kind: SourceKind,
    pub terminal: bool,
    pub error_message: Option<String>,
}

impl ProcessingJob {
    fn new(id: String, source_kind: SourceKind) -> Self {
        Self {
            id,
            stage: Stage::Uploading,
            progress_percent: 0,
            source_kind,
            terminal: false,
            error_message: None,
        }
    }
}

fn tracked_jobs() -> &'static Mutex<HashSet<String>> {
    static JOBS: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    JOBS.get_or_init(Default::default)
}

/// Marks a job id as tracked in this process. Dropping it frees the id.
#[derive(Debug)]
struct JobClaim {
    job_id: String,
}

impl JobClaim {
    fn acquire(job_id: &str) -> Result<Self, PipelineError> {
        let mut jobs = tracked_jobs().lock().unwrap_or_else(|e| e.into_inner());
        if !jobs.insert(job_id.to_string()) {
            warn!("Processing job {} is already tracked", job_id);
            return Err(PipelineError::AlreadySubmitted(job_id.to_string()));
        }
        Ok(Self {
            job_id: job_id.to_string(),
        })
    }
}

impl Drop for JobClaim {
    fn drop(&mut self) {
        let mut jobs = tracked_jobs().lock().unwrap_or_else(|e| e.into_inner());
        jobs.remove(&self.job_id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// The job changed stage.
    Progress(ProcessingJob),
    /// Completion was acknowledged; leave the tracking view.
    Navigate { job_id: String },
}

pub struct ProcessingPipelineTracker {
    backend: Arc<dyn ProcessingBackend>,
    job: Option<ProcessingJob>,
    claim: Option<JobClaim>,
    completion_delay: Duration,
    pending_navigation: Option<JoinHandle<()>>,
    live: Arc<AtomicBool>,
    acknowledged: Arc<AtomicBool>,
    events: broadcast::Sender<TrackerEvent>,
}

impl ProcessingPipelineTracker {
    pub fn new(backend: Arc<dyn ProcessingBackend>, completion_delay: Duration) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            backend,
            job: None,
            claim: None,
            completion_delay,
            pending_navigation: None,
            live: Arc::new(AtomicBool::new(true)),
            acknowledged: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Hand the recording or file to the service and start tracking at `uploading`.
    pub async fn submit(
        &mut self,
        submission: Submission<'_>,
        metadata: &SubmissionMetadata,
    ) -> Result<&ProcessingJob, PipelineError> {
        self.ensure_live()?;
        if let Some(job) = &self.job {
            return Err(PipelineError::AlreadySubmitted(job.id.clone()));
        }

        let source_kind = submission.source_kind();
        info!("Submitting {} for processing", source_kind.as_str());

        let result = match submission {
            Submission::Recording(artifact) => {
                self.backend.submit_recording(artifact, metadata).await
            }
            Submission::Upload(path) => self.backend.submit_upload(path, metadata).await,
        };

        let job_id = result.map_err(|e| {
            error!("Submission rejected: {:#}", e);
            PipelineError::SubmissionFailed(format!("{e:#}"))
        })?;

        self.start_tracking(job_id, source_kind)
    }

    /// Track a job that was submitted elsewhere. A job id can be tracked by
    /// one tracker at a time.
    pub fn attach(
        &mut self,
        job_id: impl Into<String>,
        source_kind: SourceKind,
    ) -> Result<&ProcessingJob, PipelineError> {
        self.ensure_live()?;
        if let Some(job) = &self.job {
            return Err(PipelineError::AlreadySubmitted(job.id.clone()));
        }
        self.start_tracking(job_id.into(), source_kind)
    }

    fn start_tracking(
        &mut self,
        job_id: String,
        source_kind: SourceKind,
    ) -> Result<&ProcessingJob, PipelineError> {
        self.claim = Some(JobClaim::acquire(&job_id)?);
        info!("Tracking processing job {}", job_id);
        let job = ProcessingJob::new(job_id, source_kind);
        self.emit(TrackerEvent::Progress(job.clone()));
        Ok(&*self.job.insert(job))
    }

    /// Move to the next stage. From `summarizing` this completes the job and
    /// schedules the navigation event.
    pub fn advance(&mut self) -> Result<Stage, PipelineError> {
        self.ensure_live()?;
        let job = self.job.as_mut().ok_or(PipelineError::NotSubmitted)?;
        if job.terminal {
            return Err(PipelineError::Terminal(job.stage));
        }

        let next = job.stage.next().ok_or(PipelineError::Terminal(job.stage))?;
        job.stage = next;
        job.progress_percent = next.progress_percent().unwrap_or(job.progress_percent);
        job.terminal = next.is_terminal();
        info!(
            "Processing job {} is {} ({}%)",
            job.id, next, job.progress_percent
        );

        let snapshot = job.clone();
        self.emit(TrackerEvent::Progress(snapshot.clone()));

        if next == Stage::Completed {
            self.schedule_navigation(snapshot.id);
        }
        Ok(next)
    }

    /// Terminate with `message` from any non-terminal stage.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), PipelineError> {
        self.ensure_live()?;
        let job = self.job.as_mut().ok_or(PipelineError::NotSubmitted)?;
        if job.terminal {
            return Err(PipelineError::Terminal(job.stage));
        }

        let message = message.into();
        error!("Processing job {} failed at {}: {}", job.id, job.stage, message);
        job.stage = Stage::Failed;
        job.terminal = true;
        job.error_message = Some(message);

        let snapshot = job.clone();
        self.cancel_navigation();
        self.emit(TrackerEvent::Progress(snapshot));
        Ok(())
    }

    /// Ask the service where the job really is.
    pub async fn poll_status(&self) -> Result<JobStatus, PipelineError> {
        let job = self.job.as_ref().ok_or(PipelineError::NotSubmitted)?;
        self.backend
            .get_job_status(&job.id)
            .await
            .map_err(|e| PipelineError::Request(format!("{e:#}")))
    }

    pub async fn fetch_result(&self) -> Result<MeetingResult, PipelineError> {
        let job = self.job.as_ref().ok_or(PipelineError::NotSubmitted)?;
        if job.stage != Stage::Completed {
            return Err(PipelineError::InvalidRequest(format!(
                "Job {} is {}, not completed",
                job.id, job.stage
            )));
        }
        self.backend
            .get_meeting_result(&job.id)
            .await
            .map_err(|e| PipelineError::Request(format!("{e:#}")))
    }

    /// Cancel pending timers and stop emitting. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!("Tearing down pipeline tracker");
        }
        self.cancel_navigation();
        self.claim.take();
    }

    pub fn job(&self) -> Option<&ProcessingJob> {
        self.job.as_ref()
    }

    pub fn stage(&self) -> Stage {
        self.job.as_ref().map(|j| j.stage).unwrap_or(Stage::Uploading)
    }

    pub fn is_terminal(&self) -> bool {
        self.job.as_ref().is_some_and(|j| j.terminal)
    }

    /// True once the post-completion delay has elapsed and navigation fired.
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::SeqCst)
    }

    pub fn is_torn_down(&self) -> bool {
        !self.live.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    fn schedule_navigation(&mut self, job_id: String) {
        self.cancel_navigation();

        let events = self.events.clone();
        let live = self.live.clone();
        let acknowledged = self.acknowledged.clone();
        let delay = self.completion_delay;

        self.pending_navigation = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !live.load(Ordering::SeqCst) {
                return;
            }
            acknowledged.store(true, Ordering::SeqCst);
            info!("Processing job {} acknowledged", job_id);
            let _ = events.send(TrackerEvent::Navigate { job_id });
        }));
    }

    fn cancel_navigation(&mut self) {
        if let Some(handle) = self.pending_navigation.take() {
            if !handle.is_finished() {
                debug!("Cancelling pending navigation");
            }
            handle.abort();
        }
    }

    fn ensure_live(&self) -> Result<(), PipelineError> {
        if self.is_torn_down() {
            warn!("Pipeline tracker used after teardown");
            return Err(PipelineError::TornDown);
        }
        Ok(())
    }

    fn emit(&self, event: TrackerEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for ProcessingPipelineTracker {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::meeting::{MeetingTranscript, QaRequest, QaResponse, SummaryResponse};
    use crate::pipeline::PIPELINE;
    use anyhow::{anyhow, Result};
    use crate::resources::Releasable;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::sleep;

    /// Backend double that replays scripted statuses; the last one repeats.
    pub(crate) struct ScriptedBackend {
        pub statuses: Mutex<VecDeque<JobStatus>>,
        pub reject_submissions: bool,
    }

    impl ScriptedBackend {
        pub(crate) fn new(stages: &[Stage]) -> Self {
            Self {
                statuses: Mutex::new(
                    stages
                        .iter()
                        .map(|&stage| JobStatus {
                            stage,
                            progress_percent: stage.progress_percent().unwrap_or(0),
                            error_message: None,
                        })
                        .collect(),
                ),
                reject_submissions: false,
            }
        }

        pub(crate) fn failing_at(stages: &[Stage], message: &str) -> Self {
            let backend = Self::new(stages);
            backend.statuses.lock().unwrap().push_back(JobStatus {
                stage: Stage::Failed,
                progress_percent: 0,
                error_message: Some(message.to_string()),
            });
            backend
        }
    }

    #[async_trait]
    impl ProcessingBackend for ScriptedBackend {
        async fn submit_recording(
            &self,
            _artifact: &AudioArtifact,
            _metadata: &SubmissionMetadata,
        ) -> Result<String> {
            if self.reject_submissions {
                return Err(anyhow!("Job submission failed (503): unavailable"));
            }
            Ok("job_rec".to_string())
        }

        async fn submit_upload(&self, _file: &Path, _metadata: &SubmissionMetadata) -> Result<String> {
            if self.reject_submissions {
                return Err(anyhow!("Job submission failed (400): bad file"));
            }
            Ok("job_up".to_string())
        }

        async fn get_job_status(&self, _job_id: &str) -> Result<JobStatus> {
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.pop_front()
            } else {
                statuses.front().cloned()
            };
            status.ok_or_else(|| anyhow!("no status scripted"))
        }

        async fn get_meeting_result(&self, job_id: &str) -> Result<MeetingResult> {
            Ok(MeetingResult {
                meeting_id: job_id.to_string(),
                transcript: MeetingTranscript {
                    meeting_id: job_id.to_string(),
                    chunks: Vec::new(),
                    speakers: Vec::new(),
                    duration: 0.0,
                    created_at: String::new(),
                },
                summary: SummaryResponse::default(),
                processed_at: String::new(),
            })
        }

        async fn ask(&self, _job_id: &str, request: &QaRequest) -> Result<QaResponse> {
            Ok(QaResponse {
                question: request.question.clone(),
                answer: "n/a".to_string(),
                context_chunks: Vec::new(),
                confidence: None,
            })
        }
    }

    pub(crate) fn tracker_with(backend: ScriptedBackend) -> ProcessingPipelineTracker {
        ProcessingPipelineTracker::new(Arc::new(backend), Duration::from_secs(2))
    }

    fn metadata() -> SubmissionMetadata {
        SubmissionMetadata::new(2).unwrap()
    }

    fn drain(rx: &mut broadcast::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_run_visits_every_stage_once() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[]));
        let mut rx = tracker.subscribe();
        tracker.attach("job_every_stage", SourceKind::Recording).unwrap();

        for _ in 0..5 {
            tracker.advance().unwrap();
        }
        assert!(tracker.is_terminal());
        assert!(matches!(
            tracker.advance(),
            Err(PipelineError::Terminal(Stage::Completed))
        ));

        let jobs: Vec<ProcessingJob> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                TrackerEvent::Progress(job) => Some(job),
                _ => None,
            })
            .collect();
        let stages: Vec<Stage> = jobs.iter().map(|j| j.stage).collect();
        assert_eq!(stages, PIPELINE.to_vec());
        assert!(jobs.windows(2).all(|w| w[0].progress_percent <= w[1].progress_percent));
        assert_eq!(jobs.last().unwrap().progress_percent, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_fires_once_after_delay() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[]));
        tracker.attach("job_navigate", SourceKind::Upload).unwrap();
        for _ in 0..5 {
            tracker.advance().unwrap();
        }
        let mut rx = tracker.subscribe();

        sleep(Duration::from_millis(1900)).await;
        assert!(!tracker.is_acknowledged());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        sleep(Duration::from_millis(200)).await;
        assert!(tracker.is_acknowledged());
        assert_eq!(
            rx.try_recv().unwrap(),
            TrackerEvent::Navigate {
                job_id: "job_navigate".to_string()
            }
        );

        sleep(Duration::from_secs(10)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_fail_from_each_working_stage() {
        for steps in 0..5 {
            let mut tracker = tracker_with(ScriptedBackend::new(&[]));
            tracker.attach("job_fail", SourceKind::Recording).unwrap();
            for _ in 0..steps {
                tracker.advance().unwrap();
            }
            let progress_before = tracker.job().unwrap().progress_percent;

            tracker.fail("x").unwrap();
            let job = tracker.job().unwrap().clone();
            assert_eq!(job.stage, Stage::Failed);
            assert_eq!(job.error_message.as_deref(), Some("x"));
            assert!(job.terminal);
            assert_eq!(job.progress_percent, progress_before);

            assert!(tracker.advance().is_err());
            assert!(tracker.fail("y").is_err());
            assert_eq!(tracker.job().unwrap(), &job);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_after_completion_cancels_navigation() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[]));
        tracker.attach("job_teardown", SourceKind::Recording).unwrap();
        for _ in 0..5 {
            tracker.advance().unwrap();
        }
        let mut rx = tracker.subscribe();

        tracker.teardown();
        tracker.teardown();
        sleep(Duration::from_secs(10)).await;

        assert!(!tracker.is_acknowledged());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(matches!(tracker.advance(), Err(PipelineError::TornDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_navigation() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[]));
        let mut rx = tracker.subscribe();
        tracker.attach("job_drop", SourceKind::Recording).unwrap();
        for _ in 0..5 {
            tracker.advance().unwrap();
        }
        drain(&mut rx);
        drop(tracker);

        sleep(Duration::from_secs(10)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Closed)));
    }

    #[tokio::test]
    async fn test_submit_starts_at_uploading() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[]));
        let path = Path::new("/tmp/standup.wav");
        let job = tracker
            .submit(Submission::Upload(path), &metadata())
            .await
            .unwrap();
        assert_eq!(job.id, "job_up");
        assert_eq!(job.stage, Stage::Uploading);
        assert_eq!(job.source_kind, SourceKind::Upload);
        assert_eq!(job.progress_percent, 0);

        assert!(matches!(
            tracker.submit(Submission::Upload(path), &metadata()).await,
            Err(PipelineError::AlreadySubmitted(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_submission_does_not_advance() {
        let mut backend = ScriptedBackend::new(&[]);
        backend.reject_submissions = true;
        let mut tracker = tracker_with(backend);

        let err = tracker
            .submit(Submission::Upload(Path::new("/tmp/a.wav")), &metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SubmissionFailed(_)));
        assert!(tracker.job().is_none());
        assert_eq!(tracker.stage(), Stage::Uploading);
        assert!(matches!(tracker.advance(), Err(PipelineError::NotSubmitted)));
    }

    #[tokio::test]
    async fn test_fetch_result_requires_completion() {
        let mut tracker = tracker_with(ScriptedBackend::new(&[]));
        tracker.attach("job_result", SourceKind::Upload).unwrap();
        assert!(tracker.fetch_result().await.is_err());
        for _ in 0..5 {
            tracker.advance().unwrap();
        }
        let result = tracker.fetch_result().await.unwrap();
        assert_eq!(result.meeting_id, "job_result");
    }

    #[tokio::test]
    async fn test_job_tracked_by_one_tracker_at_a_time() {
        let mut first = tracker_with(ScriptedBackend::new(&[]));
        let mut second = tracker_with(ScriptedBackend::new(&[]));
        first.attach("job_shared", SourceKind::Upload).unwrap();

        assert!(matches!(
            second.attach("job_shared", SourceKind::Upload),
            Err(PipelineError::AlreadySubmitted(id)) if id == "job_shared"
        ));
        assert!(second.job().is_none());

        // Another job id is unaffected
        let mut third = tracker_with(ScriptedBackend::new(&[]));
        third.attach("job_other", SourceKind::Recording).unwrap();

        first.teardown();
        let job = second.attach("job_shared", SourceKind::Upload).unwrap();
        assert_eq!(job.stage, Stage::Uploading);
        drop(second);

        let mut fourth = tracker_with(ScriptedBackend::new(&[]));
        assert!(fourth.attach("job_shared", SourceKind::Recording).is_ok());
    }

    #[tokio::test]
    async fn test_submit_rejects_job_already_tracked_elsewhere() {
        let mut watcher = tracker_with(ScriptedBackend::new(&[]));
        watcher.attach("job_rec", SourceKind::Recording).unwrap();

        let (artifact, mut handle) = AudioArtifact::assemble(
            &[],
            crate::audio::AudioEncoding::new(16000, 1),
            0,
        )
        .unwrap();
        let mut tracker = tracker_with(ScriptedBackend::new(&[]));
        assert!(matches!(
            tracker.submit(Submission::Recording(&artifact), &metadata()).await,
            Err(PipelineError::AlreadySubmitted(_))
        ));
        assert!(tracker.job().is_none());
        handle.release();
    }
}
