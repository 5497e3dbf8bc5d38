mod mock_backend;

use std::time::Duration;

use mock_backend::{INDEX_BODY, MockBackend, TestResult, dead_base_url};
use storyweave::core::cache::{
    CacheStore, ControlMessage, FetchRequest, OfflineCacheRouter, Partition, RouterConfig,
};
use url::Url;

fn router_config(origin: &str) -> RouterConfig {
    RouterConfig {
        origin: origin.trim_end_matches('/').to_string(),
        api_prefix: "/api/".to_string(),
        shell_files: vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/app.js".to_string(),
        ],
        api_wait: Duration::from_millis(200),
        media_wait: Duration::from_millis(200),
        bearer: None,
    }
}

fn get(url: &str) -> TestResult<FetchRequest> {
    Ok(FetchRequest::get(Url::parse(url)?))
}

async fn start_backend() -> TestResult<Option<MockBackend>> {
    match MockBackend::start().await {
        Ok(backend) => Ok(Some(backend)),
        Err(e) if e.to_string().contains("Operation not permitted") => Ok(None),
        Err(e) => Err(e),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shell_replay_is_byte_identical_offline() -> TestResult<()> {
    let Some(backend) = start_backend().await? else {
        return Ok(());
    };
    let store = CacheStore::open_in_memory("v1")?;
    let router = OfflineCacheRouter::new(store, router_config(&backend.base_url()))?;

    let url = format!("{}/index.html", backend.base_url());
    let online = router.handle(&get(&url)?).await?;
    assert_eq!(online.status, 200);
    assert_eq!(online.body.as_ref(), INDEX_BODY.as_bytes());

    backend.shutdown().await;

    let offline = router.handle(&get(&url)?).await?;
    assert_eq!(offline.status, 200);
    assert_eq!(offline.body, online.body);
    assert_eq!(offline.content_type, online.content_type);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn uncached_shell_path_falls_back_to_cached_root() -> TestResult<()> {
    let Some(backend) = start_backend().await? else {
        return Ok(());
    };
    let store = CacheStore::open_in_memory("v1")?;
    let router = OfflineCacheRouter::new(store, router_config(&backend.base_url()))?;

    let cached = router.install().await?;
    assert_eq!(cached, 3);

    let base = backend.base_url();
    backend.shutdown().await;

    // Never fetched, never cached; the root document answers instead.
    let response = router.handle(&get(&format!("{}/styles.css", base))?).await?;
    assert_eq!(response.status, 200);
    assert_eq!(response.body.as_ref(), INDEX_BODY.as_bytes());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn api_offline_with_no_cache_synthesizes_structured_503() -> TestResult<()> {
    let origin = dead_base_url()?;
    let store = CacheStore::open_in_memory("v1")?;
    let router = OfflineCacheRouter::new(store, router_config(&origin))?;

    let response = router
        .handle(&get(&format!("{}/api/list-stories", origin))?)
        .await?;
    assert_eq!(response.status, 503);
    assert_eq!(response.content_type, "application/json");

    let body: serde_json::Value = serde_json::from_slice(&response.body)?;
    assert_eq!(body["error"], "offline");
    assert!(body["message"].is_string());
    assert!(body["timestamp"].is_number());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn api_responses_cached_online_answer_offline() -> TestResult<()> {
    let Some(backend) = start_backend().await? else {
        return Ok(());
    };
    let store = CacheStore::open_in_memory("v1")?;
    let router = OfflineCacheRouter::new(store, router_config(&backend.base_url()))?;

    let url = format!("{}/api/list-stories", backend.base_url());
    let online = router.handle(&get(&url)?).await?;
    assert_eq!(online.status, 200);

    backend.shutdown().await;

    let offline = router.handle(&get(&url)?).await?;
    assert_eq!(offline.status, 200);
    assert_eq!(offline.body, online.body);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_api_times_out_then_backfills_the_cache() -> TestResult<()> {
    let Some(backend) = start_backend().await? else {
        return Ok(());
    };
    let mut config = router_config(&backend.base_url());
    config.api_wait = Duration::from_millis(100);
    let store = CacheStore::open_in_memory("v1")?;
    let router = OfflineCacheRouter::new(store, config)?;

    // The endpoint answers in ~600ms, well past the 100ms budget.
    let url = format!("{}/api/slow", backend.base_url());
    let first = router.handle(&get(&url)?).await?;
    assert_eq!(first.status, 503);

    // The losing fetch keeps running and writes its 200 once it lands.
    tokio::time::sleep(Duration::from_millis(900)).await;
    let backfilled = router.store().get(Partition::Runtime, &url).await?;
    let backfilled = backfilled.ok_or("timed-out fetch was not backfilled")?;
    assert_eq!(backfilled.status, 200);

    let second = router.handle(&get(&url)?).await?;
    assert_eq!(second.status, 200);
    assert_eq!(second.body, backfilled.body);

    backend.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn removed_resource_is_evicted_from_the_cache() -> TestResult<()> {
    let Some(backend) = start_backend().await? else {
        return Ok(());
    };
    let store = CacheStore::open_in_memory("v1")?;
    let router = OfflineCacheRouter::new(store, router_config(&backend.base_url()))?;

    // Cached while the resource still existed; the backend no longer
    // serves this path and answers 404.
    let url = format!("{}/api/retired-endpoint", backend.base_url());
    let stale = storyweave::core::cache::CachedResponse::ok(
        "application/json",
        bytes::Bytes::from_static(b"{\"old\":true}"),
    );
    router.store().put(Partition::Runtime, &url, &stale).await?;

    let response = router.handle(&get(&url)?).await?;
    assert_eq!(response.status, 404);
    assert!(router.store().get(Partition::Runtime, &url).await?.is_none());

    backend.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn offline_media_degrades_by_kind() -> TestResult<()> {
    let origin = dead_base_url()?;
    let store = CacheStore::open_in_memory("v1")?;
    let router = OfflineCacheRouter::new(store, router_config(&origin))?;

    let image = router
        .handle(&get(&format!("{}/covers/fox.png", origin))?)
        .await?;
    assert_eq!(image.status, 200);
    assert_eq!(image.content_type, "image/png");
    assert_eq!(&image.body[..8], b"\x89PNG\r\n\x1a\n");

    let audio = router
        .handle(&get(&format!("{}/narration/scene1.mp3", origin))?)
        .await?;
    assert_eq!(audio.status, 404);
    assert!(audio.body.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn media_fetched_once_serves_from_cache() -> TestResult<()> {
    let Some(backend) = start_backend().await? else {
        return Ok(());
    };
    let store = CacheStore::open_in_memory("v1")?;
    let router = OfflineCacheRouter::new(store, router_config(&backend.base_url()))?;

    let url = format!("{}/covers/fox.png", backend.base_url());
    let online = router.handle(&get(&url)?).await?;
    assert_eq!(online.status, 200);

    backend.shutdown().await;

    let offline = router.handle(&get(&url)?).await?;
    assert_eq!(offline.status, 200);
    assert_eq!(offline.body, online.body);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn activation_purges_superseded_versions() -> TestResult<()> {
    let Some(backend) = start_backend().await? else {
        return Ok(());
    };
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("cache.db");

    let old = OfflineCacheRouter::new(
        CacheStore::open(&db_path, "v1")?,
        router_config(&backend.base_url()),
    )?;
    assert_eq!(old.install().await?, 3);
    assert_eq!(old.store().stats().await?, vec![("shell-v1".to_string(), 3)]);
    drop(old);

    let new = OfflineCacheRouter::new(
        CacheStore::open(&db_path, "v2")?,
        router_config(&backend.base_url()),
    )?;
    new.activate().await?;
    assert!(new.store().stats().await?.is_empty());

    // The next shell request repopulates under the new version.
    let url = format!("{}/index.html", backend.base_url());
    let response = new.handle(&get(&url)?).await?;
    assert_eq!(response.status, 200);
    assert_eq!(new.store().stats().await?, vec![("shell-v2".to_string(), 1)]);

    backend.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clear_cache_control_empties_every_partition() -> TestResult<()> {
    let Some(backend) = start_backend().await? else {
        return Ok(());
    };
    let store = CacheStore::open_in_memory("v1")?;
    let router = OfflineCacheRouter::new(store, router_config(&backend.base_url()))?;

    router.install().await?;
    router
        .handle(&get(&format!("{}/api/list-stories", backend.base_url()))?)
        .await?;
    assert!(!router.store().stats().await?.is_empty());

    router.control(ControlMessage::ClearCache).await?;
    assert!(router.store().stats().await?.is_empty());

    backend.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_get_requests_bypass_the_cache() -> TestResult<()> {
    let Some(backend) = start_backend().await? else {
        return Ok(());
    };
    let store = CacheStore::open_in_memory("v1")?;
    let router = OfflineCacheRouter::new(store, router_config(&backend.base_url()))?;

    let url = format!("{}/api/auth/token", backend.base_url());
    let mut request = get(&url)?;
    request.method = reqwest::Method::POST;

    let response = router.handle(&request).await?;
    assert_eq!(response.status, 200);
    assert!(router.store().stats().await?.is_empty());
    assert!(router.store().get(Partition::Runtime, &url).await?.is_none());

    backend.shutdown().await;
    Ok(())
}
