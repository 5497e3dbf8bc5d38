use std::time::Duration;

use anyhow::Result;
use console::style;

use crate::core::config::Config;
use crate::core::terminal::{print_info, print_step, print_success};
use crate::core::update::{CURRENT_VERSION, UpdateChecker};

pub async fn run_check(config: &Config) -> Result<()> {
    print_step(&format!(
        "Current version: {}",
        style(CURRENT_VERSION).cyan()
    ));
    print_step("Checking for updates...");

    let checker = UpdateChecker::new(Duration::from_secs(config.update_check_interval_secs))?;
    let status = checker.check().await?;

    if status.is_outdated() {
        print_info(&format!(
            "New version available: {} → {}",
            style(&status.current.to_string()).red(),
            style(&status.latest.to_string()).green()
        ));
        print_info("Download it from the releases page.");
    } else {
        print_success(&format!("Already up to date! (v{})", CURRENT_VERSION));
    }
    Ok(())
}
