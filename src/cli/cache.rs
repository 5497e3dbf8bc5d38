use anyhow::{Result, anyhow};

use crate::core::auth;
use crate::core::cache::{CacheStore, ControlMessage, OfflineCacheRouter, RouterConfig};
use crate::core::config::{Config, data_dir};
use crate::core::terminal::{GuideSection, print_info, print_step, print_success};

fn open_router(config: &Config) -> Result<OfflineCacheRouter> {
    let store = CacheStore::open(data_dir().join("cache.db"), &config.cache_version)?;
    OfflineCacheRouter::new(
        store,
        RouterConfig::from_config(config).with_bearer(auth::load_token()),
    )
}

pub async fn run(config: &Config, args: &[String]) -> Result<()> {
    match args.get(2).map(|s| s.as_str()) {
        Some("status") | None => run_status(config).await,
        Some("refresh") => run_refresh(config).await,
        Some("clear") => run_clear(config).await,
        Some(other) => Err(anyhow!("Unknown cache subcommand: {}", other)),
    }
}

async fn run_status(config: &Config) -> Result<()> {
    let router = open_router(config)?;
    let stats = router.store().stats().await?;

    let mut section = GuideSection::new("Offline Cache")
        .status("Version", &config.cache_version)
        .blank();
    if stats.is_empty() {
        section = section.info("No cached entries.");
    } else {
        for (partition, count) in stats {
            section = section.status(&partition, &format!("{} entries", count));
        }
    }
    section.print();
    println!();
    Ok(())
}

async fn run_refresh(config: &Config) -> Result<()> {
    let router = open_router(config)?;
    print_step("Activating current cache version...");
    router.control(ControlMessage::SkipWaiting).await?;

    print_step("Installing app shell...");
    let cached = router.install().await?;
    print_success(&format!(
        "Shell refreshed: {}/{} files cached.",
        cached,
        config.shell_files.len()
    ));
    Ok(())
}

async fn run_clear(config: &Config) -> Result<()> {
    let router = open_router(config)?;
    router.control(ControlMessage::ClearCache).await?;
    print_success("All cache partitions cleared.");
    print_info("Run `storyweave cache refresh` to rebuild the app shell.");
    Ok(())
}
