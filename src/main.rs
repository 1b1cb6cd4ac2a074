use std::sync::Arc;
use std::time::Duration;

mod ai;
mod config;
mod db;
mod error;
mod models;
mod pipeline;
mod scrape;

use ai::ClaudeClient;
use config::Config;
use db::Repository;
use error::{AppError, Result};
use pipeline::{AnalyzeStage, EnrichStage, ScrapeStage, Stage};
use scrape::HtmlFetcher;

const USAGE: &str = "Usage: iphone-radar <command>

Commands:
  scrape       fetch the search-results page and upsert all listings
  deep-scrape  fetch detail pages for listings without a long description
  analyze      extract structured attributes for enriched listings
  run          all three stages in order, stopping at the first failure
  status       show row counts";

#[tokio::main]
async fn main() {
    // Initialize logging (info and up by default, overridable via RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1).map(String::as_str) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    if let Err(e) = dispatch(command).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn dispatch(command: &str) -> Result<()> {
    match command {
        "scrape" | "deep-scrape" | "analyze" | "run" => {}
        "status" => return status().await,
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            return Ok(());
        }
        other => {
            eprintln!("Unknown command '{other}'\n\n{USAGE}");
            std::process::exit(2);
        }
    }

    let config = Config::load()?;
    let repository = Arc::new(Repository::new(&config.db_path).await?);
    let fetcher: Arc<dyn scrape::PageFetcher> = Arc::new(HtmlFetcher::new(&config.user_agent));

    let mut stages: Vec<Box<dyn Stage>> = Vec::new();

    if matches!(command, "scrape" | "run") {
        stages.push(Box::new(ScrapeStage::new(
            Arc::clone(&repository),
            Arc::clone(&fetcher),
            config.search_url.clone(),
            config.site_base.clone(),
        )));
    }

    if matches!(command, "deep-scrape" | "run") {
        stages.push(Box::new(EnrichStage::new(
            Arc::clone(&repository),
            Arc::clone(&fetcher),
            Duration::from_secs(config.detail_delay_secs),
        )));
    }

    if matches!(command, "analyze" | "run") {
        let api_key = config.claude_api_key.clone().ok_or_else(|| {
            AppError::Config(format!(
                "claude_api_key is not set; add it to {}",
                Config::config_path().display()
            ))
        })?;
        stages.push(Box::new(AnalyzeStage::new(
            Arc::clone(&repository),
            Arc::new(ClaudeClient::new(api_key)),
            Duration::from_secs(config.model_delay_secs),
        )));
    }

    pipeline::run_sequence(&stages).await
}

async fn status() -> Result<()> {
    let config = Config::load()?;
    let repository = Repository::new(&config.db_path).await?;
    let (total, enriched, analyzed) = repository.counts().await?;

    println!("listings:  {total}");
    println!("enriched:  {enriched}");
    println!("analyzed:  {analyzed}");
    println!("database:  {}", config.db_path);
    Ok(())
}
