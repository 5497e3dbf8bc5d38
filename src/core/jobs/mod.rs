mod tracker;

pub use tracker::{JobTracker, TrackerConfig};

use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::core::api::types::{JobStatus, StoryData};

/// Client-local tracker state. `DuplicateFound` is the branch point: the
/// operator either adopts the existing story (straight to `Success`) or
/// forces a new submission (back through `Uploading`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Idle,
    Checking,
    DuplicateFound,
    Uploading,
    Generating,
    Success,
    Error,
}

impl TrackerState {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackerState::Idle => "idle",
            TrackerState::Checking => "checking",
            TrackerState::DuplicateFound => "duplicate_found",
            TrackerState::Uploading => "uploading",
            TrackerState::Generating => "generating",
            TrackerState::Success => "success",
            TrackerState::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TrackerState::Success | TrackerState::Error)
    }
}

pub fn can_transition(from: TrackerState, to: TrackerState) -> bool {
    if from == to {
        return true;
    }
    match from {
        TrackerState::Idle => matches!(to, TrackerState::Checking | TrackerState::Uploading),
        TrackerState::Checking => matches!(
            to,
            TrackerState::DuplicateFound | TrackerState::Uploading | TrackerState::Idle
        ),
        TrackerState::DuplicateFound => {
            matches!(
                to,
                TrackerState::Success | TrackerState::Uploading | TrackerState::Idle
            )
        }
        TrackerState::Uploading => matches!(to, TrackerState::Generating | TrackerState::Error),
        TrackerState::Generating => matches!(to, TrackerState::Success | TrackerState::Error),
        // Re-submission always starts from a clean Idle.
        TrackerState::Success | TrackerState::Error => matches!(to, TrackerState::Idle),
    }
}

/// How the tracker reacts when a poll itself fails (transport error or
/// non-2xx status). The source clients treated the first failure as
/// terminal; retrying with backoff is available as a policy knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollFailurePolicy {
    Terminal,
    Retry { attempts: u32, backoff: Duration },
}

/// One outstanding or completed generation request, as seen by the client.
/// The backend is the sole writer; successive polls replace the whole record.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: i64,
    pub total_scenes: u32,
    pub completed_scene_count: u32,
    pub result: Option<StoryData>,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Pre-submission duplicate advisory. Never blocks a forced submission.
#[derive(Debug, Clone)]
pub struct DuplicateCheckResult {
    pub is_duplicate: bool,
    pub story_id: Option<String>,
    pub story_title: Option<String>,
    /// Content hash computed locally over the file bytes, independent of
    /// the file name.
    pub file_hash: String,
}

/// SHA-256 of the file bytes, hex-encoded. Byte-identical files hash the
/// same regardless of name or metadata.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
