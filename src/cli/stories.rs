use anyhow::{Result, anyhow};
use console::style;
use url::Url;

use super::{authed_client, first_positional};
use crate::core::cache::{Destination, FetchRequest, OfflineCacheRouter, RouterConfig};
use crate::core::config::{Config, data_dir};
use crate::core::stories::StoryStore;
use crate::core::terminal::{
    GuideSection, print_info, print_step, print_success, print_warn,
};

pub async fn run(config: &Config, args: &[String]) -> Result<()> {
    match args.get(2).map(|s| s.as_str()) {
        Some("list") | None => run_list(config).await,
        Some("show") => {
            let id = require_id(args)?;
            run_show(config, &id).await
        }
        Some("pull") => {
            let id = require_id(args)?;
            run_pull(config, &id).await
        }
        Some("audio") => {
            let id = require_id(args)?;
            run_audio(config, &id).await
        }
        Some(other) => Err(anyhow!("Unknown stories subcommand: {}", other)),
    }
}

fn require_id(args: &[String]) -> Result<String> {
    first_positional(args, 3).ok_or_else(|| anyhow!("A story id is required"))
}

async fn run_list(config: &Config) -> Result<()> {
    let client = authed_client(config)?;
    let remote = client.list_stories().await?;

    let section = remote.iter().fold(
        GuideSection::new(&format!("Stories ({})", remote.len())),
        |section, story| {
            section.status(
                &story.story_id,
                &format!(
                    "{}  {}",
                    story.name,
                    style(story.saved_at.as_deref().unwrap_or("")).dim()
                ),
            )
        },
    );
    section.print();

    let local = StoryStore::open(data_dir().join("stories"))?;
    let offline = local.list().await?;
    if !offline.is_empty() {
        print_info(&format!("{} available offline.", offline.len()));
    }
    println!();
    Ok(())
}

async fn run_show(config: &Config, story_id: &str) -> Result<()> {
    // Prefer the local copy; fall back to the server.
    let local = StoryStore::open(data_dir().join("stories"))?;
    let (name, data) = match local.load(story_id).await? {
        Some(found) => found,
        None => {
            let client = authed_client(config)?;
            let response = client.load_story(story_id).await?;
            (response.name, response.story_data)
        }
    };

    GuideSection::new(&name)
        .status("Title", &data.title)
        .status("Scenes", &data.scenes.len().to_string())
        .status("Quiz questions", &data.quiz.len().to_string())
        .print();
    println!();
    Ok(())
}

async fn run_pull(config: &Config, story_id: &str) -> Result<()> {
    let client = authed_client(config)?;
    print_step(&format!("Downloading story {}...", style(story_id).cyan()));
    let response = client.load_story(story_id).await?;

    let local = StoryStore::open(data_dir().join("stories"))?;
    local
        .save(story_id, &response.name, &response.story_data)
        .await?;
    print_success(&format!(
        "{} saved for offline reading ({} scenes).",
        response.name,
        response.story_data.scenes.len()
    ));
    Ok(())
}

/// Warm the offline cache with whatever narration is already rendered.
/// Scene readiness is advisory and may run ahead of the main job.
async fn run_audio(config: &Config, story_id: &str) -> Result<()> {
    let client = authed_client(config)?;
    let status = client.tts_status(story_id).await?;

    if status.scenes_ready.is_empty() {
        print_info("No narration rendered yet; try again in a moment.");
        return Ok(());
    }
    print_step(&format!(
        "Narration {:.0}% complete, {} scene(s) ready",
        status.percentage,
        status.scenes_ready.len()
    ));

    let store = crate::core::cache::CacheStore::open(
        data_dir().join("cache.db"),
        &config.cache_version,
    )?;
    let router = OfflineCacheRouter::new(
        store,
        RouterConfig::from_config(config).with_bearer(crate::core::auth::load_token()),
    )?;

    let mut warmed = 0;
    for scene in &status.scenes_ready {
        let target = format!(
            "{}/api/story/{}/scene/{}/audio",
            config.api_base_url.trim_end_matches('/'),
            urlencoding::encode(story_id),
            scene
        );
        let url = Url::parse(&target)?;
        let request = FetchRequest::get(url).with_destination(Destination::Audio);
        match router.handle(&request).await {
            Ok(response) if response.is_success() => warmed += 1,
            Ok(response) => {
                print_warn(&format!("Scene {} audio unavailable (HTTP {})", scene, response.status));
            }
            Err(e) => print_warn(&format!("Scene {} audio failed: {}", scene, e)),
        }
    }

    print_success(&format!("Cached narration for {} scene(s).", warmed));
    if !status.is_complete {
        print_info("More scenes are still rendering; re-run to fetch the rest.");
    }
    Ok(())
}
