use serde::{Deserialize, Serialize};

/// Wire status of a generation job as reported by `/api/status/{job_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorySummary {
    pub story_id: String,
    pub name: String,
    #[serde(default)]
    pub saved_at: Option<String>,
}

/// The generated story payload. Scenes and quiz entries are opaque to the
/// client core; the player UI interprets them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub scenes: Vec<serde_json::Value>,
    #[serde(default)]
    pub quiz: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadStoryResponse {
    pub name: String,
    pub story_data: StoryData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateCheckResponse {
    pub is_duplicate: bool,
    #[serde(default)]
    pub duplicate_type: Option<String>,
    #[serde(default)]
    pub story_id: Option<String>,
    #[serde(default)]
    pub story_title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub file_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub job_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: String,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub total_scenes: Option<u32>,
    #[serde(default)]
    pub completed_scene_count: Option<u32>,
    #[serde(default)]
    pub result: Option<StoryData>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Per-scene narration readiness for a story, polled independently of the
/// main job status so media surfaces can prefetch audio early.
#[derive(Debug, Clone, Deserialize)]
pub struct TtsStatusResponse {
    #[serde(default)]
    pub tts_progress: Option<serde_json::Value>,
    #[serde(default)]
    pub scenes_ready: Vec<u32>,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub is_complete: bool,
}

/// Generation options sent along with an upload.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOptions {
    pub avatar: String,
    pub voice: String,
    pub speed: f32,
    pub grade_level: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            avatar: "narrator".to_string(),
            voice: "default".to_string(),
            speed: 1.0,
            grade_level: "5".to_string(),
        }
    }
}
