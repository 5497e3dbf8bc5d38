use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    DuplicateCheckResult, JobRecord, PollFailurePolicy, TrackerState, can_transition, content_hash,
};
use crate::core::api::ApiClient;
use crate::core::api::types::{GenerationOptions, JobStatus, JobStatusResponse};
use crate::core::config::Config;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    pub failure_policy: PollFailurePolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            failure_policy: PollFailurePolicy::Terminal,
        }
    }
}

impl TrackerConfig {
    pub fn from_config(config: &Config) -> Self {
        let failure_policy = if config.poll_retry_attempts == 0 {
            PollFailurePolicy::Terminal
        } else {
            PollFailurePolicy::Retry {
                attempts: config.poll_retry_attempts,
                backoff: Duration::from_secs(config.poll_retry_backoff_secs),
            }
        };
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            failure_policy,
        }
    }
}

/// Drives one generation request from duplicate check through upload and
/// polling to a terminal state. Each tracker owns its own state and
/// cancellation token; nothing is shared across concurrent trackers.
pub struct JobTracker {
    api: Arc<ApiClient>,
    config: TrackerConfig,
    state: Arc<Mutex<TrackerState>>,
    cancel: CancellationToken,
    session: Uuid,
}

impl JobTracker {
    pub fn new(api: Arc<ApiClient>, config: TrackerConfig) -> Self {
        Self {
            api,
            config,
            state: Arc::new(Mutex::new(TrackerState::Idle)),
            cancel: CancellationToken::new(),
            session: Uuid::new_v4(),
        }
    }

    pub fn state(&self) -> TrackerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cancel tracking. An in-flight poll is not aborted; its result is
    /// discarded when it arrives.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Return the tracker to a clean `Idle` so the operator can re-submit.
    pub fn reset(&self) {
        set_state(&self.state, self.session, TrackerState::Idle);
    }

    /// Content-addressed duplicate check. Advisory only: a network or server
    /// failure is treated as "no duplicate" rather than blocking submission.
    pub async fn check_duplicate(&self, file_name: &str, bytes: &[u8]) -> DuplicateCheckResult {
        let file_hash = content_hash(bytes);
        set_state(&self.state, self.session, TrackerState::Checking);

        match self.api.check_duplicate(file_name, bytes).await {
            Ok(response) => {
                if response.is_duplicate {
                    info!(
                        session = %self.session,
                        story_id = response.story_id.as_deref().unwrap_or("?"),
                        "Duplicate story found for uploaded file"
                    );
                    set_state(&self.state, self.session, TrackerState::DuplicateFound);
                }
                DuplicateCheckResult {
                    is_duplicate: response.is_duplicate,
                    story_id: response.story_id,
                    story_title: response.story_title,
                    file_hash,
                }
            }
            Err(e) => {
                warn!(session = %self.session, "Duplicate check failed, proceeding without: {}", e);
                DuplicateCheckResult {
                    is_duplicate: false,
                    story_id: None,
                    story_title: None,
                    file_hash,
                }
            }
        }
    }

    /// Adopt an existing story instead of generating a new one. Resolves the
    /// `DuplicateFound` branch without any upload call.
    pub fn adopt_existing(&self, story_id: &str) -> String {
        info!(session = %self.session, story_id, "Adopting existing story");
        set_state(&self.state, self.session, TrackerState::Success);
        story_id.to_string()
    }

    /// Upload the file and generation options; returns the backend-assigned
    /// job id. `force_new` bypasses server-side duplicate resolution.
    pub async fn submit(
        &self,
        file_name: &str,
        bytes: &[u8],
        options: &GenerationOptions,
        force_new: bool,
    ) -> Result<String> {
        let file_hash = content_hash(bytes);
        set_state(&self.state, self.session, TrackerState::Uploading);

        match self
            .api
            .upload(file_name, bytes, options, force_new, Some(&file_hash))
            .await
        {
            Ok(response) => {
                info!(session = %self.session, job_id = %response.job_id, "Upload accepted");
                Ok(response.job_id)
            }
            Err(e) => {
                set_state(&self.state, self.session, TrackerState::Error);
                Err(e)
            }
        }
    }

    /// Single status fetch. The caller schedules; this never loops.
    pub async fn poll(&self, job_id: &str) -> Result<JobRecord> {
        let response = self.api.job_status(job_id).await?;
        record_from(job_id, response)
    }

    /// Poll until the job reaches `completed` or `failed`, emitting one
    /// record per successful poll. The loop awaits each poll before starting
    /// the next delay, so polls never overlap even when the backend is slow.
    /// The stream ends after exactly one terminal record.
    pub fn track_until_terminal(&self, job_id: String) -> ReceiverStream<JobRecord> {
        let (tx, rx) = mpsc::channel(16);
        let api = self.api.clone();
        let state = self.state.clone();
        let config = self.config.clone();
        let cancel = self.cancel.clone();
        let session = self.session;

        tokio::spawn(async move {
            track_loop(api, state, config, cancel, session, job_id, tx).await;
        });

        ReceiverStream::new(rx)
    }
}

async fn track_loop(
    api: Arc<ApiClient>,
    state: Arc<Mutex<TrackerState>>,
    config: TrackerConfig,
    cancel: CancellationToken,
    session: Uuid,
    job_id: String,
    tx: mpsc::Sender<JobRecord>,
) {
    let mut retries_left = match config.failure_policy {
        PollFailurePolicy::Terminal => 0,
        PollFailurePolicy::Retry { attempts, .. } => attempts,
    };

    loop {
        let poll = tokio::select! {
            r = api.job_status(&job_id) => r.and_then(|resp| record_from(&job_id, resp)),
            _ = cancel.cancelled() => {
                debug!(session = %session, job_id, "Tracking cancelled");
                return;
            }
        };

        match poll {
            Ok(record) => {
                retries_left = match config.failure_policy {
                    PollFailurePolicy::Terminal => 0,
                    PollFailurePolicy::Retry { attempts, .. } => attempts,
                };

                let next = match record.status {
                    JobStatus::Queued | JobStatus::Processing => TrackerState::Generating,
                    JobStatus::Completed => TrackerState::Success,
                    JobStatus::Failed => TrackerState::Error,
                };
                set_state(&state, session, next);
                debug!(
                    session = %session,
                    job_id,
                    status = record.status.as_str(),
                    progress = record.progress,
                    "Poll result"
                );

                let terminal = record.is_terminal();
                if tx.send(record).await.is_err() {
                    return; // receiver dropped, stop polling
                }
                if terminal {
                    return;
                }
            }
            Err(e) => {
                if retries_left > 0 {
                    retries_left -= 1;
                    let backoff = match config.failure_policy {
                        PollFailurePolicy::Retry { backoff, .. } => backoff,
                        PollFailurePolicy::Terminal => Duration::ZERO,
                    };
                    warn!(
                        session = %session,
                        job_id,
                        retries_left,
                        "Poll failed, retrying: {}",
                        e
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => continue,
                        _ = cancel.cancelled() => return,
                    }
                }

                warn!(session = %session, job_id, "Poll failed, giving up: {}", e);
                set_state(&state, session, TrackerState::Error);
                let _ = tx
                    .send(JobRecord {
                        job_id: job_id.clone(),
                        status: JobStatus::Failed,
                        progress: 0,
                        total_scenes: 0,
                        completed_scene_count: 0,
                        result: None,
                        error: Some(e.to_string()),
                    })
                    .await;
                return;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

fn set_state(state: &Arc<Mutex<TrackerState>>, session: Uuid, to: TrackerState) {
    let mut current = state.lock().unwrap_or_else(|e| e.into_inner());
    if !can_transition(*current, to) {
        warn!(
            session = %session,
            from = current.as_str(),
            to = to.as_str(),
            "Unexpected tracker transition"
        );
    }
    *current = to;
}

fn record_from(job_id: &str, response: JobStatusResponse) -> Result<JobRecord> {
    let status = JobStatus::from_status(&response.status)
        .ok_or_else(|| anyhow!("Unknown job status '{}'", response.status))?;
    Ok(JobRecord {
        job_id: job_id.to_string(),
        status,
        progress: response.progress.unwrap_or(0).clamp(0, 100),
        total_scenes: response.total_scenes.unwrap_or(0),
        completed_scene_count: response.completed_scene_count.unwrap_or(0),
        result: response.result,
        error: response.error,
    })
}
