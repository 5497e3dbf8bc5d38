use anyhow::{Result, anyhow};
use console::style;

use super::{authed_client, parse_flag};
use crate::core::auth;
use crate::core::config::Config;
use crate::core::terminal::{GuideSection, print_goodbye, print_step, print_success};

pub async fn run_login(config: &Config, args: &[String]) -> Result<()> {
    let username = match parse_flag(args, "--username", Some("-u")) {
        Some(u) => u,
        None => prompt("Username")?,
    };
    let password = match parse_flag(args, "--password", Some("-p")) {
        Some(p) => p,
        None => prompt("Password")?,
    };

    print_step(&format!(
        "Logging in to {}...",
        style(&config.api_base_url).cyan()
    ));
    auth::login(&config.api_base_url, &username, &password).await?;
    print_success(&format!("Logged in as {}", style(&username).bold()));
    Ok(())
}

pub fn run_logout() -> Result<()> {
    auth::clear_token()?;
    print_success("Logged out.");
    print_goodbye();
    Ok(())
}

pub async fn run_whoami(config: &Config) -> Result<()> {
    let client = authed_client(config)?;
    let profile = auth::current_user(&client).await?;

    GuideSection::new("Current User")
        .status("Username", &profile.username)
        .status("Email", profile.email.as_deref().unwrap_or("-"))
        .status("Name", profile.full_name.as_deref().unwrap_or("-"))
        .status("Server", config.api_base_url.as_str())
        .print();
    println!();
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    print!("{}: ", style(label).bold());
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        return Err(anyhow!("{} must not be empty", label));
    }
    Ok(value)
}
