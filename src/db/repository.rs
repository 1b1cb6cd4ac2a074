use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Listing, ListingAnalysis, PriceChange, ScrapedListing};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Listing operations

    /// Insert-or-update a batch of scraped listings keyed by article_id.
    ///
    /// `last_seen` is refreshed on every observation; `first_seen` is set
    /// once. When the stored price or title differs from the incoming value
    /// a row is appended to the change ledger before the update lands.
    /// Returns the number of listings written.
    pub async fn upsert_listings(&self, listings: Vec<ScrapedListing>) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let written = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut written = 0usize;

                for listing in &listings {
                    let previous: Option<(String, String)> = tx
                        .query_row(
                            "SELECT price, title FROM listings WHERE article_id = ?1",
                            params![listing.article_id],
                            |row| Ok((row.get(0)?, row.get(1)?)),
                        )
                        .optional()?;

                    if let Some((old_price, old_title)) = previous {
                        if old_price != listing.price || old_title != listing.title {
                            tx.execute(
                                "INSERT INTO listing_history (listing_id, price, title, changed_at)
                                 VALUES (?1, ?2, ?3, ?4)",
                                params![listing.article_id, listing.price, listing.title, now],
                            )?;
                        }
                    }

                    tx.execute(
                        r#"INSERT INTO listings (article_id, title, price, location, posted_at,
                                                 description, url, thumbnail_url, first_seen, last_seen)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                           ON CONFLICT(article_id) DO UPDATE SET
                               title = excluded.title,
                               price = excluded.price,
                               location = excluded.location,
                               posted_at = excluded.posted_at,
                               description = excluded.description,
                               url = excluded.url,
                               thumbnail_url = excluded.thumbnail_url,
                               last_seen = excluded.last_seen"#,
                        params![
                            listing.article_id,
                            listing.title,
                            listing.price,
                            listing.location,
                            listing.posted_at,
                            listing.description,
                            listing.url,
                            listing.thumbnail_url,
                            now,
                        ],
                    )?;
                    written += 1;
                }

                tx.commit()?;
                Ok(written)
            })
            .await?;
        Ok(written)
    }

    pub async fn update_long_desc(&self, article_id: String, long_desc: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE listings SET long_desc = ?1 WHERE article_id = ?2",
                    params![long_desc, article_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn get_listing(&self, article_id: &str) -> Result<Option<Listing>> {
        let article_id = article_id.to_string();
        let listing = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {LISTING_COLUMNS} FROM listings WHERE article_id = ?1"
                ))?;
                let listing = stmt
                    .query_row(params![article_id], |row| Ok(listing_from_row(row)))
                    .optional()?;
                Ok(listing)
            })
            .await?;
        Ok(listing)
    }

    /// Listings the deep-scrape stage still has to visit.
    pub async fn listings_missing_long_desc(&self) -> Result<Vec<Listing>> {
        let listings = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {LISTING_COLUMNS} FROM listings
                     WHERE long_desc IS NULL
                     ORDER BY last_seen DESC"
                ))?;
                let listings = stmt
                    .query_map([], |row| Ok(listing_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(listings)
            })
            .await?;
        Ok(listings)
    }

    /// Listings with a long description but no analysis row yet.
    pub async fn listings_missing_analysis(&self) -> Result<Vec<Listing>> {
        let listings = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {LISTING_COLUMNS} FROM listings l
                     LEFT JOIN listing_analysis a ON a.listing_id = l.article_id
                     WHERE a.listing_id IS NULL AND l.long_desc IS NOT NULL
                     ORDER BY l.last_seen DESC"
                ))?;
                let listings = stmt
                    .query_map([], |row| Ok(listing_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(listings)
            })
            .await?;
        Ok(listings)
    }

    // Analysis operations

    pub async fn upsert_analysis(&self, analysis: ListingAnalysis) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO listing_analysis (listing_id, iphone_model, storage_gb, rating, highlights, analyzed_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(listing_id) DO UPDATE SET
                           iphone_model = excluded.iphone_model,
                           storage_gb = excluded.storage_gb,
                           rating = excluded.rating,
                           highlights = excluded.highlights,
                           analyzed_at = excluded.analyzed_at"#,
                    params![
                        analysis.listing_id,
                        analysis.iphone_model,
                        analysis.storage_gb,
                        analysis.rating,
                        analysis.highlights,
                        analysis.analyzed_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn get_analysis(&self, listing_id: &str) -> Result<Option<ListingAnalysis>> {
        let listing_id = listing_id.to_string();
        let analysis = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT listing_id, iphone_model, storage_gb, rating, highlights, analyzed_at
                     FROM listing_analysis WHERE listing_id = ?1",
                )?;
                let analysis = stmt
                    .query_row(params![listing_id], |row| Ok(analysis_from_row(row)))
                    .optional()?;
                Ok(analysis)
            })
            .await?;
        Ok(analysis)
    }

    // History

    #[allow(dead_code)]
    pub async fn history_for(&self, listing_id: &str) -> Result<Vec<PriceChange>> {
        let listing_id = listing_id.to_string();
        let changes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT listing_id, price, title, changed_at FROM listing_history
                     WHERE listing_id = ?1 ORDER BY changed_at",
                )?;
                let changes = stmt
                    .query_map(params![listing_id], |row| Ok(change_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(changes)
            })
            .await?;
        Ok(changes)
    }

    /// (total, enriched, analyzed) row counts for the status command.
    pub async fn counts(&self) -> Result<(i64, i64, i64)> {
        let counts = self
            .conn
            .call(|conn| {
                let total: i64 =
                    conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
                let enriched: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM listings WHERE long_desc IS NOT NULL",
                    [],
                    |row| row.get(0),
                )?;
                let analyzed: i64 =
                    conn.query_row("SELECT COUNT(*) FROM listing_analysis", [], |row| row.get(0))?;
                Ok((total, enriched, analyzed))
            })
            .await?;
        Ok(counts)
    }
}

const LISTING_COLUMNS: &str = "article_id, title, price, location, posted_at, description, \
                               long_desc, url, thumbnail_url, first_seen, last_seen";

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn listing_from_row(row: &Row) -> Listing {
    Listing {
        article_id: row.get(0).unwrap(),
        title: row.get(1).unwrap(),
        price: row.get(2).unwrap(),
        location: row.get(3).unwrap(),
        posted_at: row.get(4).unwrap(),
        description: row.get(5).unwrap(),
        long_desc: row.get(6).unwrap(),
        url: row.get(7).unwrap(),
        thumbnail_url: row.get(8).unwrap(),
        first_seen: row
            .get::<_, String>(9)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        last_seen: row
            .get::<_, String>(10)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn analysis_from_row(row: &Row) -> ListingAnalysis {
    ListingAnalysis {
        listing_id: row.get(0).unwrap(),
        iphone_model: row.get(1).unwrap(),
        storage_gb: row.get(2).unwrap(),
        rating: row.get(3).unwrap(),
        highlights: row.get(4).unwrap(),
        analyzed_at: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn change_from_row(row: &Row) -> PriceChange {
    PriceChange {
        listing_id: row.get(0).unwrap(),
        price: row.get(1).unwrap(),
        title: row.get(2).unwrap(),
        changed_at: row
            .get::<_, String>(3)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_repository() -> (TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let repository = Repository::new(db_path.to_str().unwrap()).await.unwrap();
        (dir, repository)
    }

    fn scraped(id: &str, title: &str, price: &str) -> ScrapedListing {
        ScrapedListing {
            article_id: id.to_string(),
            title: title.to_string(),
            price: price.to_string(),
            location: "Berlin".to_string(),
            posted_at: "Heute, 12:00".to_string(),
            description: "kurz".to_string(),
            url: format!("https://www.kleinanzeigen.de/s-anzeige/x/{id}"),
            thumbnail_url: String::new(),
        }
    }

    #[tokio::test]
    async fn upsert_is_keyed_on_article_id() {
        let (_dir, repo) = temp_repository().await;

        repo.upsert_listings(vec![scraped("1", "iPhone 12", "250 €")])
            .await
            .unwrap();
        let first = repo.get_listing("1").await.unwrap().unwrap();

        repo.upsert_listings(vec![scraped("1", "iPhone 12", "250 €")])
            .await
            .unwrap();
        let second = repo.get_listing("1").await.unwrap().unwrap();

        let (total, _, _) = repo.counts().await.unwrap();
        assert_eq!(total, 1);
        assert!(second.last_seen >= first.last_seen);
        assert_eq!(second.first_seen, first.first_seen);
    }

    #[tokio::test]
    async fn price_change_lands_in_the_ledger() {
        let (_dir, repo) = temp_repository().await;

        repo.upsert_listings(vec![scraped("1", "iPhone 12", "250 €")])
            .await
            .unwrap();
        repo.upsert_listings(vec![scraped("1", "iPhone 12", "220 €")])
            .await
            .unwrap();

        let listing = repo.get_listing("1").await.unwrap().unwrap();
        assert_eq!(listing.price, "220 €");

        let history = repo.history_for("1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price, "220 €");
    }

    #[tokio::test]
    async fn unchanged_listing_writes_no_history() {
        let (_dir, repo) = temp_repository().await;

        repo.upsert_listings(vec![scraped("1", "iPhone 12", "250 €")])
            .await
            .unwrap();
        repo.upsert_listings(vec![scraped("1", "iPhone 12", "250 €")])
            .await
            .unwrap();

        assert!(repo.history_for("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_long_desc_read_shrinks_after_enrichment() {
        let (_dir, repo) = temp_repository().await;

        repo.upsert_listings(vec![
            scraped("1", "iPhone 12", "250 €"),
            scraped("2", "iPhone 13", "400 €"),
        ])
        .await
        .unwrap();

        assert_eq!(repo.listings_missing_long_desc().await.unwrap().len(), 2);

        repo.update_long_desc("1".to_string(), "lange Beschreibung".to_string())
            .await
            .unwrap();

        let pending = repo.listings_missing_long_desc().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].article_id, "2");
    }

    #[tokio::test]
    async fn missing_analysis_read_requires_long_desc() {
        let (_dir, repo) = temp_repository().await;

        repo.upsert_listings(vec![
            scraped("1", "iPhone 12", "250 €"),
            scraped("2", "iPhone 13", "400 €"),
        ])
        .await
        .unwrap();

        // Neither has a long description yet
        assert!(repo.listings_missing_analysis().await.unwrap().is_empty());

        repo.update_long_desc("1".to_string(), "lange Beschreibung".to_string())
            .await
            .unwrap();

        let pending = repo.listings_missing_analysis().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].article_id, "1");

        repo.upsert_analysis(ListingAnalysis {
            listing_id: "1".to_string(),
            iphone_model: "iPhone 12".to_string(),
            storage_gb: Some(128),
            rating: Some(4),
            highlights: "kaum genutzt".to_string(),
            analyzed_at: Utc::now(),
        })
        .await
        .unwrap();

        assert!(repo.listings_missing_analysis().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn analysis_round_trips() {
        let (_dir, repo) = temp_repository().await;

        repo.upsert_listings(vec![scraped("1", "iPhone 12", "250 €")])
            .await
            .unwrap();
        repo.upsert_analysis(ListingAnalysis {
            listing_id: "1".to_string(),
            iphone_model: "Unknown".to_string(),
            storage_gb: None,
            rating: None,
            highlights: String::new(),
            analyzed_at: Utc::now(),
        })
        .await
        .unwrap();

        let analysis = repo.get_analysis("1").await.unwrap().unwrap();
        assert_eq!(analysis.iphone_model, "Unknown");
        assert_eq!(analysis.storage_gb, None);
        assert_eq!(analysis.rating, None);
    }
}
