use std::time::Duration;

use anyhow::{Context, Result};
use semver::Version;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const GITHUB_REPO: &str = "storyweave/storyweave";
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    pub current: Version,
    pub latest: Version,
}

impl UpdateStatus {
    pub fn is_outdated(&self) -> bool {
        self.latest > self.current
    }
}

/// Periodic update checker with an explicit lifecycle: construct it with the
/// interval you want, `start()` it, `stop()` it. No ambient module state.
pub struct UpdateChecker {
    http: reqwest::Client,
    release_url: String,
    current_version: String,
    interval: Duration,
    cancel: CancellationToken,
}

impl UpdateChecker {
    pub fn new(interval: Duration) -> Result<Self> {
        Self::with_release_url(
            format!("https://api.github.com/repos/{GITHUB_REPO}/releases/latest"),
            CURRENT_VERSION,
            interval,
        )
    }

    pub fn with_release_url(
        release_url: String,
        current_version: &str,
        interval: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("storyweave/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            release_url,
            current_version: current_version.to_string(),
            interval,
            cancel: CancellationToken::new(),
        })
    }

    /// One-shot check against the latest published release.
    pub async fn check(&self) -> Result<UpdateStatus> {
        check_release(&self.http, &self.release_url, &self.current_version).await
    }

    /// Spawn the periodic check loop. Each pass logs; failures are
    /// non-fatal and the loop keeps going until `stop()`.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let http = self.http.clone();
        let release_url = self.release_url.clone();
        let current_version = self.current_version.clone();
        let interval = self.interval;
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            loop {
                match check_release(&http, &release_url, &current_version).await {
                    Ok(status) if status.is_outdated() => {
                        info!(
                            current = %status.current,
                            latest = %status.latest,
                            "A newer storyweave release is available"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Update check failed: {}", e),
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = cancel.cancelled() => return,
                }
            }
        })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

async fn check_release(
    http: &reqwest::Client,
    release_url: &str,
    current_version: &str,
) -> Result<UpdateStatus> {
    let release: serde_json::Value = http
        .get(release_url)
        .send()
        .await
        .context("Failed to reach the release API")?
        .error_for_status()
        .context("Release API returned an error")?
        .json()
        .await?;

    let tag = release["tag_name"]
        .as_str()
        .context("Missing tag_name in release")?;
    let latest = Version::parse(tag.strip_prefix('v').unwrap_or(tag))?;
    let current = Version::parse(current_version)?;

    Ok(UpdateStatus { current, latest })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(current: &str, latest: &str) -> UpdateStatus {
        UpdateStatus {
            current: Version::parse(current).unwrap(),
            latest: Version::parse(latest).unwrap(),
        }
    }

    #[test]
    fn newer_release_is_outdated() {
        assert!(status("0.4.0", "0.5.0").is_outdated());
        assert!(status("0.4.0", "1.0.0").is_outdated());
    }

    #[test]
    fn same_or_older_release_is_current() {
        assert!(!status("0.4.0", "0.4.0").is_outdated());
        assert!(!status("0.5.0", "0.4.9").is_outdated());
    }
}
