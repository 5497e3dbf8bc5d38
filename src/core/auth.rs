use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::api::ApiClient;
use crate::core::api::types::UserProfile;
use crate::core::config::data_dir;

fn token_path() -> PathBuf {
    data_dir().join("auth_token")
}

/// Persisted bearer token from the last successful login, if any.
pub fn load_token() -> Option<String> {
    let raw = std::fs::read_to_string(token_path()).ok()?;
    let token = raw.trim().to_string();
    if token.is_empty() { None } else { Some(token) }
}

fn store_token(token: &str) -> Result<()> {
    let path = token_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, token)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    restrict_file_permissions(&path);
    Ok(())
}

pub fn clear_token() -> Result<()> {
    let path = token_path();
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    Ok(())
}

/// Password-grant login; the token is persisted for subsequent commands.
pub async fn login(base_url: &str, username: &str, password: &str) -> Result<String> {
    let client = ApiClient::new(base_url, None)?;
    let response = client.login(username, password).await?;
    store_token(&response.access_token)?;
    info!(username, token_type = %response.token_type, "Logged in");
    Ok(response.access_token)
}

/// Profile of the currently authenticated user.
pub async fn current_user(client: &ApiClient) -> Result<UserProfile> {
    client.me().await
}

fn restrict_file_permissions(path: &std::path::Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
