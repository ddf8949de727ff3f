mod analyzer;
mod api;
#[cfg(feature = "cli")]
mod cli;
mod config;
mod export;
mod models;
mod parser;
mod report;
mod session;
mod timefmt;
mod ui;

use anyhow::{Context, Result};
use config::Config;
use session::AuditSession;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use ui::App;

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "cli")]
    let args = <cli::Cli as clap::Parser>::parse();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    #[cfg(feature = "cli")]
    if args.is_headless() {
        init_tracing(None)?;
        let client = api::MoodleClient::new(&config)?;
        let session = AuditSession::new(args.threshold_days.unwrap_or(config.threshold_days));
        return cli::run(&args, &client, session, &mut std::io::stdout()).await;
    }

    // The dashboard owns the terminal, so logs go to a file
    init_tracing(Some(&config.log_file))?;
    tracing::info!(endpoint = %config.base_url, "starting grading auditor dashboard");

    let client = api::MoodleClient::new(&config)?;

    // Start TUI application
    let mut app = App::new(client, AuditSession::new(config.threshold_days));
    app.run().await?;

    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }

    Ok(())
}
