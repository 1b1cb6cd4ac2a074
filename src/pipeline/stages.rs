use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::ai::{build_prompt, parse_attributes, ModelClient};
use crate::db::Repository;
use crate::error::Result;
use crate::models::ListingAnalysis;
use crate::scrape::{parse_long_description, parse_search_results, PageFetcher};

use super::{Stage, Throttle};

/// Stage 1: fetch the search-results page and upsert every listing on it.
pub struct ScrapeStage {
    repository: Arc<Repository>,
    fetcher: Arc<dyn PageFetcher>,
    search_url: String,
    site_base: String,
}

impl ScrapeStage {
    pub fn new(
        repository: Arc<Repository>,
        fetcher: Arc<dyn PageFetcher>,
        search_url: String,
        site_base: String,
    ) -> Self {
        Self {
            repository,
            fetcher,
            search_url,
            site_base,
        }
    }
}

#[async_trait]
impl Stage for ScrapeStage {
    fn name(&self) -> &'static str {
        "scrape"
    }

    /// An unfetchable results page fails the whole stage; everything
    /// downstream depends on it.
    async fn run(&self) -> Result<()> {
        let html = self.fetcher.fetch(&self.search_url).await?;
        let listings = parse_search_results(&html, &self.site_base);

        if listings.is_empty() {
            tracing::warn!("No listings found on results page; selectors may be stale");
            return Ok(());
        }

        let written = self.repository.upsert_listings(listings).await?;
        tracing::info!("Upserted {} listings", written);
        Ok(())
    }
}

/// Stage 2: visit each listing that has no long description yet and pull
/// the full text off its detail page.
pub struct EnrichStage {
    repository: Arc<Repository>,
    fetcher: Arc<dyn PageFetcher>,
    delay: Duration,
}

impl EnrichStage {
    pub fn new(repository: Arc<Repository>, fetcher: Arc<dyn PageFetcher>, delay: Duration) -> Self {
        Self {
            repository,
            fetcher,
            delay,
        }
    }
}

#[async_trait]
impl Stage for EnrichStage {
    fn name(&self) -> &'static str {
        "deep-scrape"
    }

    async fn run(&self) -> Result<()> {
        let pending = self.repository.listings_missing_long_desc().await?;
        if pending.is_empty() {
            tracing::info!("No listings waiting for a long description");
            return Ok(());
        }

        tracing::info!("Deep-scraping {} listings", pending.len());
        let total = pending.len();
        let mut enriched = 0usize;
        let mut throttle = Throttle::new(self.delay);

        for listing in pending {
            throttle.tick().await;

            let html = match self.fetcher.fetch(&listing.url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("Detail fetch for {} failed: {}", listing.article_id, e);
                    continue;
                }
            };

            match parse_long_description(&html) {
                Some(text) => {
                    self.repository
                        .update_long_desc(listing.article_id, text)
                        .await?;
                    enriched += 1;
                }
                None => {
                    tracing::warn!("No description node on detail page of {}", listing.article_id);
                }
            }
        }

        tracing::info!("Enriched {}/{} listings", enriched, total);
        Ok(())
    }
}

/// Stage 3: run Claude over every enriched listing that has no analysis
/// row yet and store the extracted attributes.
pub struct AnalyzeStage {
    repository: Arc<Repository>,
    model: Arc<dyn ModelClient>,
    delay: Duration,
}

impl AnalyzeStage {
    pub fn new(repository: Arc<Repository>, model: Arc<dyn ModelClient>, delay: Duration) -> Self {
        Self {
            repository,
            model,
            delay,
        }
    }
}

#[async_trait]
impl Stage for AnalyzeStage {
    fn name(&self) -> &'static str {
        "analyze"
    }

    /// A failed model call writes nothing, so the listing stays in the
    /// missing-analysis read and gets retried on the next run.
    async fn run(&self) -> Result<()> {
        let pending = self.repository.listings_missing_analysis().await?;
        if pending.is_empty() {
            tracing::info!("No listings waiting for analysis");
            return Ok(());
        }

        tracing::info!("Analyzing {} listings", pending.len());
        let total = pending.len();
        let mut analyzed = 0usize;
        let mut throttle = Throttle::new(self.delay);

        for listing in pending {
            throttle.tick().await;

            let long_desc = listing.long_desc.as_deref().unwrap_or_default();
            let prompt = build_prompt(&listing.title, long_desc);

            let response = match self.model.complete(&prompt).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Model call for {} failed: {}", listing.article_id, e);
                    continue;
                }
            };

            let attrs = parse_attributes(&response);
            self.repository
                .upsert_analysis(ListingAnalysis {
                    listing_id: listing.article_id,
                    iphone_model: attrs.iphone_model,
                    storage_gb: attrs.storage_gb,
                    rating: attrs.rating,
                    highlights: attrs.highlights,
                    analyzed_at: Utc::now(),
                })
                .await?;
            analyzed += 1;
        }

        tracing::info!("Analyzed {}/{} listings", analyzed, total);
        Ok(())
    }
}
