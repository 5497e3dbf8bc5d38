mod mock_backend;

use std::time::Duration;

use mock_backend::{MockBackend, TestResult, dead_base_url};
use storyweave::core::update::UpdateChecker;

async fn start_backend() -> TestResult<Option<MockBackend>> {
    match MockBackend::start().await {
        Ok(backend) => Ok(Some(backend)),
        Err(e) if e.to_string().contains("Operation not permitted") => Ok(None),
        Err(e) => Err(e),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn checker_reports_a_newer_release() -> TestResult<()> {
    let Some(backend) = start_backend().await? else {
        return Ok(());
    };

    let checker = UpdateChecker::with_release_url(
        format!("{}/releases/latest", backend.base_url()),
        "0.4.0",
        Duration::from_secs(3600),
    )?;
    let status = checker.check().await?;
    assert!(status.is_outdated());
    assert_eq!(status.latest.to_string(), "9.9.9");

    backend.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_loop_stops_on_request() -> TestResult<()> {
    // Unreachable release endpoint: each pass fails and the loop keeps going
    // until stopped.
    let checker = UpdateChecker::with_release_url(
        format!("{}/releases/latest", dead_base_url()?),
        "0.4.0",
        Duration::from_millis(20),
    )?;

    let handle = checker.start();
    tokio::time::sleep(Duration::from_millis(60)).await;
    checker.stop();

    tokio::time::timeout(Duration::from_secs(2), handle).await??;
    Ok(())
}
