use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;

use jobmail::config::{AppConfig, GMAIL_READONLY_SCOPE};
use jobmail::{auth, fetch};

#[derive(Parser)]
#[command(name = "jobmail")]
#[command(about = "Fetch recent job-application mail from Gmail", long_about = None)]
struct Cli {
    /// OAuth client config downloaded from the Google console
    #[arg(long, default_value = "credentials.json")]
    credentials: PathBuf,

    /// Cached OAuth token (auto-created; delete it after changing scopes)
    #[arg(long, default_value = "token.json")]
    token_file: PathBuf,

    /// Subject substring to match
    #[arg(long, default_value = "Thank you for applying")]
    subject: String,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = AppConfig {
        credentials_path: cli.credentials,
        token_path: cli.token_file,
        subject_filter: cli.subject,
        scope: GMAIL_READONLY_SCOPE.to_string(),
    };

    let client = auth::acquire_client(&cfg)?;

    let query = fetch::build_query(&cfg.subject_filter, Local::now().date_naive());
    log::debug!("query: {query}");

    let emails = fetch::fetch_matching(&client, &query)?;
    if emails.is_empty() {
        println!("No messages found.");
        return Ok(());
    }

    println!("Messages:");
    for email in &emails {
        println!("Found message ID: {}", email.id);
        println!("  From:    {}", email.from);
        println!("  Subject: {}", email.subject);
        println!("  Date:    {}", email.date);
        println!("  Body:    {}", email.body);
    }

    Ok(())
}
