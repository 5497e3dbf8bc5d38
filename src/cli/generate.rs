use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use console::style;
use tokio_stream::StreamExt;

use super::{authed_client, first_positional, has_flag, parse_flag};
use crate::core::api::types::{GenerationOptions, JobStatus};
use crate::core::config::{Config, data_dir};
use crate::core::jobs::{JobTracker, TrackerConfig};
use crate::core::stories::StoryStore;
use crate::core::terminal::{print_error, print_info, print_step, print_success, print_warn};

pub async fn run_generate(config: &Config, args: &[String]) -> Result<()> {
    let file_arg = first_positional(args, 2)
        .ok_or_else(|| anyhow!("Usage: storyweave generate <file> [options]"))?;
    let path = Path::new(&file_arg);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid file path: {}", file_arg))?
        .to_string();

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow!("Cannot read {}: {}", file_arg, e))?;
    if bytes.is_empty() {
        return Err(anyhow!("{} is empty", file_arg));
    }

    let options = options_from_args(args);
    let force_new = has_flag(args, "--force");
    let use_existing = has_flag(args, "--use-existing");

    let api = Arc::new(authed_client(config)?);
    let tracker = JobTracker::new(api, TrackerConfig::from_config(config));

    // Duplicate detection is advisory; --force skips straight to upload.
    if !force_new {
        print_step("Checking for an existing story...");
        let verdict = tracker.check_duplicate(&file_name, &bytes).await;
        if verdict.is_duplicate {
            let title = verdict.story_title.as_deref().unwrap_or("(untitled)");
            print_info(&format!(
                "This document already has a story: {} ({})",
                style(title).bold(),
                verdict.story_id.as_deref().unwrap_or("?")
            ));

            if use_existing {
                let story_id = verdict
                    .story_id
                    .ok_or_else(|| anyhow!("Duplicate match carried no story id"))?;
                let adopted = tracker.adopt_existing(&story_id);
                print_success(&format!("Using existing story {}", style(&adopted).bold()));
                return Ok(());
            }

            print_info("Re-run with --use-existing to load it, or --force to generate anew.");
            return Ok(());
        }
    }

    print_step(&format!("Uploading {}...", style(&file_name).cyan()));
    let job_id = tracker
        .submit(&file_name, &bytes, &options, force_new)
        .await?;
    print_info(&format!("Job accepted: {}", style(&job_id).dim()));

    let mut records = tracker.track_until_terminal(job_id.clone());
    while let Some(record) = records.next().await {
        match record.status {
            JobStatus::Queued => {
                print_step("Waiting in queue...");
            }
            JobStatus::Processing => {
                if record.total_scenes > 0 {
                    print_step(&format!(
                        "Generating... {}% ({}/{} scenes)",
                        record.progress, record.completed_scene_count, record.total_scenes
                    ));
                } else {
                    print_step(&format!("Generating... {}%", record.progress));
                }
            }
            JobStatus::Completed => {
                let result = record.result.unwrap_or_default();
                print_success(&format!(
                    "Story ready: {} ({} scenes, {} quiz questions)",
                    style(&result.title).bold(),
                    result.scenes.len(),
                    result.quiz.len()
                ));

                let store = StoryStore::open(data_dir().join("stories"))?;
                match store.save(&job_id, &result.title, &result).await {
                    Ok(()) => print_info("Saved for offline reading."),
                    Err(e) => print_warn(&format!("Could not save locally: {}", e)),
                }
            }
            JobStatus::Failed => {
                print_error(&format!(
                    "Generation failed: {}",
                    record.error.as_deref().unwrap_or("unknown error")
                ));
                print_info("Fix the document or try again with `storyweave generate`.");
            }
        }
    }

    Ok(())
}

fn options_from_args(args: &[String]) -> GenerationOptions {
    let defaults = GenerationOptions::default();
    GenerationOptions {
        avatar: parse_flag(args, "--avatar", Some("-a")).unwrap_or(defaults.avatar),
        voice: parse_flag(args, "--voice", Some("-v")).unwrap_or(defaults.voice),
        speed: parse_flag(args, "--speed", Some("-s"))
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.speed),
        grade_level: parse_flag(args, "--grade", Some("-g")).unwrap_or(defaults.grade_level),
    }
}
