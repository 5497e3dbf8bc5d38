pub mod types;

use anyhow::{Result, anyhow};
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};

use types::{
    DuplicateCheckResponse, GenerationOptions, JobStatusResponse, LoadStoryResponse, StorySummary,
    TokenResponse, TtsStatusResponse, UploadResponse, UserProfile,
};

const USER_AGENT: &str = concat!("storyweave/", env!("CARGO_PKG_VERSION"));

/// Typed client for the story-generation backend.
/// One instance per authenticated session; the bearer token is optional so
/// the login call itself can go through the same client.
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Read the body of a response, mapping non-2xx statuses to an error that
    /// carries the HTTP status code in its message.
    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{} failed (HTTP {}): {}", what, status.as_u16(), body));
        }
        Ok(response.json().await?)
    }

    /// `POST /api/auth/token`: password-grant login, form-encoded.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let params = [
            ("username", username),
            ("password", password),
            ("grant_type", "password"),
        ];
        let response = self
            .http
            .post(self.url("/api/auth/token"))
            .form(&params)
            .send()
            .await?;
        Self::read_json(response, "Login").await
    }

    /// `GET /api/auth/me`
    pub async fn me(&self) -> Result<UserProfile> {
        let response = self
            .authed(self.http.get(self.url("/api/auth/me")))
            .send()
            .await?;
        Self::read_json(response, "Profile fetch").await
    }

    /// `GET /api/list-stories`
    pub async fn list_stories(&self) -> Result<Vec<StorySummary>> {
        let response = self
            .authed(self.http.get(self.url("/api/list-stories")))
            .send()
            .await?;
        Self::read_json(response, "Story listing").await
    }

    /// `GET /api/load-story/{story_id}`
    pub async fn load_story(&self, story_id: &str) -> Result<LoadStoryResponse> {
        let path = format!("/api/load-story/{}", urlencoding::encode(story_id));
        let response = self.authed(self.http.get(self.url(&path))).send().await?;
        Self::read_json(response, "Story load").await
    }

    /// `POST /api/check-duplicate`: multipart file upload, advisory only.
    pub async fn check_duplicate(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<DuplicateCheckResponse> {
        let form = Form::new().part("file", file_part(file_name, bytes)?);
        let response = self
            .authed(self.http.post(self.url("/api/check-duplicate")))
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response, "Duplicate check").await
    }

    /// `POST /api/upload`: multipart file + generation options.
    /// Duplicate resolution is server-side; the client only supplies
    /// `force_new` and the content hash it computed.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: &[u8],
        options: &GenerationOptions,
        force_new: bool,
        file_hash: Option<&str>,
    ) -> Result<UploadResponse> {
        let mut form = Form::new()
            .part("file", file_part(file_name, bytes)?)
            .text("avatar", options.avatar.clone())
            .text("voice", options.voice.clone())
            .text("speed", options.speed.to_string())
            .text("grade_level", options.grade_level.clone())
            .text("force_new", force_new.to_string());
        if let Some(hash) = file_hash {
            form = form.text("file_hash", hash.to_string());
        }

        let response = self
            .authed(self.http.post(self.url("/api/upload")))
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response, "Upload").await
    }

    /// `GET /api/status/{job_id}`: single status fetch, no scheduling.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse> {
        let path = format!("/api/status/{}", urlencoding::encode(job_id));
        let response = self.authed(self.http.get(self.url(&path))).send().await?;
        Self::read_json(response, "Status poll").await
    }

    /// `GET /api/story/{story_id}/tts-status`
    pub async fn tts_status(&self, story_id: &str) -> Result<TtsStatusResponse> {
        let path = format!("/api/story/{}/tts-status", urlencoding::encode(story_id));
        let response = self.authed(self.http.get(self.url(&path))).send().await?;
        Self::read_json(response, "Narration status").await
    }

    /// `GET /api/story/{story_id}/scene/{n}/audio`: binary narration audio.
    pub async fn scene_audio(&self, story_id: &str, scene: u32) -> Result<Bytes> {
        let path = format!(
            "/api/story/{}/scene/{}/audio",
            urlencoding::encode(story_id),
            scene
        );
        let response = self.authed(self.http.get(self.url(&path))).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Audio fetch failed (HTTP {})", status.as_u16()));
        }
        Ok(response.bytes().await?)
    }
}

fn file_part(file_name: &str, bytes: &[u8]) -> Result<Part> {
    let mime = mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .to_string();
    Ok(Part::bytes(bytes.to_vec())
        .file_name(file_name.to_string())
        .mime_str(&mime)?)
}
