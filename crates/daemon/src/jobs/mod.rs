pub mod processor;
pub mod sweeper;
pub mod workspace;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use engine::compiler::TitleOverlay;
use engine::{AspectRatio, TransitionSpec};
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::media::MusicTrack;
use crate::tts::SpeechSpeed;

pub use processor::JobProcessor;
pub use workspace::Workspace;

static JOB_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{8}_[0-9]{6}_[a-f0-9]{8}$").expect("job id pattern is valid")
});

/// `YYYYMMDD_HHMMSS_xxxxxxxx`. Also the workspace directory name, so only values
/// matching the pattern can be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        JobId(format!(
            "{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            &suffix[..8]
        ))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        JOB_ID_PATTERN
            .is_match(raw)
            .then(|| JobId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub video_url: String,
    pub download_url: String,
    pub thumbnail_url: Option<String>,
    pub video_size_mb: f64,
    pub num_images: usize,
    pub tts_engine: String,
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What clients see when polling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum JobUpdate {
    Progress { progress: u8, message: String },
    Done(JobResult),
    Failed(String),
}

impl JobUpdate {
    pub fn progress(progress: u8, message: impl Into<String>) -> Self {
        JobUpdate::Progress {
            progress,
            message: message.into(),
        }
    }
}

pub const SUBMITTED_PROGRESS: u8 = 10;
pub const DONE_MESSAGE: &str = "Reel generated successfully!";

impl Job {
    fn new(id: JobId) -> Self {
        Job {
            id,
            status: JobStatus::Processing,
            progress: SUBMITTED_PROGRESS,
            message: "Uploading images...".to_string(),
            result: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Terminal records never change again. While processing, progress only moves forward
    /// and stays below 100.
    fn apply(&mut self, update: JobUpdate) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match update {
            JobUpdate::Progress { progress, message } => {
                self.progress = self.progress.max(progress.min(99));
                self.message = message;
            }
            JobUpdate::Done(result) => {
                self.status = JobStatus::Done;
                self.progress = 100;
                self.message = DONE_MESSAGE.to_string();
                self.result = Some(result);
            }
            JobUpdate::Failed(message) => {
                self.status = JobStatus::Error;
                self.progress = 0;
                self.error = Some(message.clone());
                self.message = message;
            }
        }
        true
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

/// Everything a submission asks for, already validated and resolved against the catalogs.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub script: String,
    pub voice: String,
    pub speech_speed: SpeechSpeed,
    pub api_key: Option<String>,
    pub transition: TransitionSpec,
    pub aspect_ratio: AspectRatio,
    pub duration_per_image: Option<f64>,
    pub title: Option<TitleOverlay>,
    pub music: Option<MusicTrack>,
    pub music_volume: f64,
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Lowercased, already checked against the allowed set.
    pub extension: String,
    pub data: Bytes,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub records: usize,
    pub workspaces: usize,
}

/// In-memory job registry. Owns the record map, the workspaces under `output_dir`,
/// and one supervised task per accepted job.
pub struct JobManager {
    jobs: Mutex<HashMap<JobId, Job>>,
    output_dir: PathBuf,
    processor: Arc<JobProcessor>,
    shutdown: CancellationToken,
}

impl JobManager {
    pub fn new(output_dir: PathBuf, processor: Arc<JobProcessor>, shutdown: CancellationToken) -> Self {
        JobManager {
            jobs: Mutex::new(HashMap::new()),
            output_dir,
            processor,
            shutdown,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn workspace(&self, id: &JobId) -> Workspace {
        Workspace::new(&self.output_dir, id)
    }

    /// Persists the images into a fresh workspace, registers the job and starts its task.
    /// Returns once the job is visible to [`JobManager::get`].
    pub async fn submit(
        self: &Arc<Self>,
        request: JobRequest,
        images: Vec<UploadedImage>,
    ) -> std::io::Result<JobId> {
        let id = JobId::generate();
        let workspace = self.workspace(&id);
        workspace.create().await?;

        let mut image_paths = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            let path = workspace.image(index, &image.extension);
            if let Err(e) = tokio::fs::write(&path, &image.data).await {
                let _ = tokio::fs::remove_dir_all(workspace.root()).await;
                return Err(e);
            }
            image_paths.push(path);
        }

        self.lock().insert(id.clone(), Job::new(id.clone()));
        info!(
            job_id = %id,
            images = image_paths.len(),
            voice = %request.voice,
            transition = request.transition.kind.key(),
            aspect_ratio = request.aspect_ratio.key(),
            "Job submitted"
        );

        let manager = Arc::clone(self);
        let cancel = self.shutdown.child_token();
        let job_id = id.clone();
        tokio::spawn(async move {
            let worker = {
                let manager = Arc::clone(&manager);
                let job_id = job_id.clone();
                tokio::spawn(async move {
                    let processor = Arc::clone(&manager.processor);
                    processor
                        .run(&manager, &job_id, request, image_paths, workspace, cancel)
                        .await;
                })
            };
            if let Err(e) = worker.await {
                error!(job_id = %job_id, error = %e, "Job task aborted");
                manager.update(&job_id, JobUpdate::Failed("Video generation failed.".to_string()));
            }
        });

        Ok(id)
    }

    pub fn update(&self, id: &JobId, update: JobUpdate) {
        let mut jobs = self.lock();
        match jobs.get_mut(id) {
            Some(job) => {
                if !job.apply(update) {
                    debug!(job_id = %id, "Ignoring update to finished job");
                }
            }
            None => debug!(job_id = %id, "Ignoring update to unknown job"),
        }
    }

    pub fn get(&self, id: &JobId) -> Option<JobSnapshot> {
        self.lock().get(id).map(Job::snapshot)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops finished records older than `max_age`, then deletes workspaces whose
    /// directory is older than `max_age` and whose job is not still processing.
    pub async fn sweep(&self, max_age: Duration) -> SweepReport {
        let now = Utc::now();
        let mut report = SweepReport::default();

        let active: HashSet<JobId> = {
            let mut jobs = self.lock();
            let before = jobs.len();
            jobs.retain(|_, job| {
                let expired = now
                    .signed_duration_since(job.created_at)
                    .to_std()
                    .map(|age| age > max_age)
                    .unwrap_or(false);
                !(job.status.is_terminal() && expired)
            });
            report.records = before - jobs.len();
            jobs.values()
                .filter(|job| !job.status.is_terminal())
                .map(|job| job.id.clone())
                .collect()
        };

        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, dir = %self.output_dir.display(), "Cannot scan output directory");
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Output directory scan interrupted");
                    break;
                }
            };
            let Some(id) = entry.file_name().to_str().and_then(JobId::parse) else {
                continue;
            };
            if active.contains(&id) {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_dir() {
                continue;
            }
            let old = metadata
                .modified()
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                .map(|age| age > max_age)
                .unwrap_or(false);
            if !old {
                continue;
            }
            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => report.workspaces += 1,
                Err(e) => warn!(job_id = %id, error = %e, "Failed to remove workspace"),
            }
        }

        if report.records > 0 || report.workspaces > 0 {
            info!(
                records = report.records,
                workspaces = report.workspaces,
                "Cleaned up old jobs"
            );
        }
        report
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, job: Job) {
        self.lock().insert(job.id.clone(), job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::processor::testing::manager_in;

    #[test]
    fn job_ids_have_fixed_shape() {
        let id = JobId::generate();
        assert_eq!(id.as_str().len(), 24);
        assert_eq!(JobId::parse(id.as_str()), Some(id));

        for bad in [
            "",
            "../../etc/passwd",
            "20240101_120000_DEADBEEF",
            "20240101_120000_deadbee",
            "20240101-120000_deadbeef",
            "20240101_120000_deadbeef/..",
        ] {
            assert_eq!(JobId::parse(bad), None, "{bad:?} should be rejected");
        }
    }

    fn processing(id: &str, age: chrono::Duration) -> Job {
        let mut job = Job::new(JobId::parse(id).unwrap());
        job.created_at = Utc::now() - age;
        job
    }

    fn result_for(id: &JobId) -> JobResult {
        JobResult {
            job_id: id.clone(),
            video_url: format!("/api/stream/{id}"),
            download_url: format!("/api/download/{id}"),
            thumbnail_url: None,
            video_size_mb: 1.25,
            num_images: 2,
            tts_engine: "Google TTS".to_string(),
            degraded: false,
        }
    }

    #[test]
    fn progress_is_monotonic_and_terminal_is_final() {
        let mut job = processing("20240101_120000_aaaaaaaa", chrono::Duration::zero());
        assert!(job.apply(JobUpdate::progress(55, "Creating video with transitions...")));
        job.apply(JobUpdate::progress(20, "late"));
        assert_eq!(job.progress, 55);
        job.apply(JobUpdate::progress(100, "almost"));
        assert_eq!(job.progress, 99);

        let id = job.id.clone();
        assert!(job.apply(JobUpdate::Done(result_for(&id))));
        assert_eq!(job.progress, 100);
        assert_eq!(job.message, DONE_MESSAGE);
        assert!(!job.apply(JobUpdate::Failed("Job cancelled".into())));
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.error.is_none());
    }

    #[test]
    fn failure_resets_progress() {
        let mut job = processing("20240101_120000_bbbbbbbb", chrono::Duration::zero());
        job.apply(JobUpdate::progress(85, "Generating thumbnail..."));
        job.apply(JobUpdate::Failed("Video generation failed.".into()));
        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Error);
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.error.as_deref(), Some("Video generation failed."));
        assert!(snap.result.is_none());
    }

    #[test]
    fn snapshot_serializes_status_lowercase() {
        let job = processing("20240101_120000_cccccccc", chrono::Duration::zero());
        let json = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["progress"], 10);
        assert_eq!(json["result"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn sweep_spares_processing_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());

        let running = processing("20240101_120000_11111111", chrono::Duration::hours(3));
        let mut finished = processing("20240101_120000_22222222", chrono::Duration::hours(3));
        finished.apply(JobUpdate::Failed("boom".into()));
        let recent = {
            let mut job = processing("20240101_120000_33333333", chrono::Duration::minutes(1));
            job.apply(JobUpdate::Failed("boom".into()));
            job
        };
        for job in [&running, &finished, &recent] {
            manager.workspace(&job.id).create().await.unwrap();
        }
        let orphan = JobId::parse("20230101_000000_44444444").unwrap();
        manager.workspace(&orphan).create().await.unwrap();
        tokio::fs::create_dir_all(dir.path().join("not-a-job")).await.unwrap();

        manager.insert(running.clone());
        manager.insert(finished.clone());
        manager.insert(recent.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let report = manager.sweep(Duration::from_secs(3600)).await;
        assert_eq!(report, SweepReport { records: 1, workspaces: 0 });
        assert!(manager.get(&running.id).is_some());
        assert!(manager.get(&finished.id).is_none());
        assert!(manager.get(&recent.id).is_some());

        let report = manager.sweep(Duration::ZERO).await;
        assert_eq!(report.records, 1);
        assert_eq!(report.workspaces, 3);
        assert!(manager.workspace(&running.id).root().exists());
        assert!(!manager.workspace(&finished.id).root().exists());
        assert!(!manager.workspace(&orphan).root().exists());
        assert!(dir.path().join("not-a-job").exists());
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn updates_to_unknown_jobs_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());
        let id = JobId::generate();
        manager.update(&id, JobUpdate::progress(50, "ghost"));
        assert!(manager.get(&id).is_none());
        assert!(manager.is_empty());
    }
}
