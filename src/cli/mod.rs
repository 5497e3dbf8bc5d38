mod cache;
mod generate;
mod login;
mod stories;
mod update;

use anyhow::{Result, anyhow};
use console::style;

use crate::core::api::ApiClient;
use crate::core::auth;
use crate::core::config::Config;
use crate::core::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Account")
        .command("login", "Log in to the story service")
        .command("whoami", "Show the current user")
        .command("logout", "Forget the stored token")
        .print();

    GuideSection::new("Stories")
        .command("generate <file>", "Turn a PDF/DOCX into a story")
        .command("stories list", "List your stories")
        .command("stories show <id>", "Print a story outline")
        .command("stories pull <id>", "Download a story for offline reading")
        .command("stories audio <id>", "Prefetch narration audio")
        .print();

    GuideSection::new("Maintenance")
        .command("cache status", "Show offline cache partitions")
        .command("cache refresh", "Re-install the app shell cache")
        .command("cache clear", "Purge all cache partitions")
        .command("update", "Check for a newer release")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("storyweave").green()
    );
}

/// Value of `--name <value>` (or its short alias), if present.
pub(crate) fn parse_flag(args: &[String], long: &str, short: Option<&str>) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if arg == long || short.is_some_and(|s| s == arg) {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

pub(crate) fn has_flag(args: &[String], long: &str) -> bool {
    args.iter().any(|a| a == long)
}

/// Flags that take no value; everything else starting with `-` consumes
/// the token after it.
const BOOLEAN_FLAGS: &[&str] = &["--force", "--use-existing"];

/// First argument that is not a flag or a flag value, starting at `start`.
pub(crate) fn first_positional(args: &[String], start: usize) -> Option<String> {
    let mut i = start;
    while i < args.len() {
        let arg = args[i].as_str();
        if BOOLEAN_FLAGS.contains(&arg) {
            i += 1;
        } else if arg.starts_with('-') {
            i += 2; // skip the flag and its value
        } else {
            return Some(args[i].clone());
        }
    }
    None
}

pub(crate) fn authed_client(config: &Config) -> Result<ApiClient> {
    let token = auth::load_token()
        .ok_or_else(|| anyhow!("Not logged in. Run `storyweave login` first."))?;
    ApiClient::new(&config.api_base_url, Some(token))
}

pub async fn run_main() -> Result<()> {
    crate::logging::init();
    let args: Vec<String> = std::env::args().collect();
    let config = Config::load()?;

    match args.get(1).map(|s| s.as_str()) {
        Some("login") => login::run_login(&config, &args).await,
        Some("logout") => login::run_logout(),
        Some("whoami") => login::run_whoami(&config).await,
        Some("generate") => generate::run_generate(&config, &args).await,
        Some("stories") => stories::run(&config, &args).await,
        Some("cache") => cache::run(&config, &args).await,
        Some("update") => update::run_check(&config).await,
        Some("help") | Some("--help") | Some("-h") | None => {
            print_help();
            Ok(())
        }
        Some(other) => {
            print_error(&format!("Unknown command: {}", other));
            print_help();
            Ok(())
        }
    }
}
