pub const SCHEMA: &str = r#"
-- listings table, keyed by the source site's ad id
CREATE TABLE IF NOT EXISTS listings (
    article_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    price TEXT NOT NULL,
    location TEXT NOT NULL,
    posted_at TEXT NOT NULL,
    description TEXT NOT NULL,
    long_desc TEXT,
    url TEXT NOT NULL,
    thumbnail_url TEXT NOT NULL,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_last_seen ON listings(last_seen DESC);

-- one analysis row per listing
CREATE TABLE IF NOT EXISTS listing_analysis (
    listing_id TEXT NOT NULL UNIQUE REFERENCES listings(article_id) ON DELETE CASCADE,
    iphone_model TEXT NOT NULL DEFAULT 'Unknown',
    storage_gb INTEGER,
    rating INTEGER,
    highlights TEXT NOT NULL DEFAULT '',
    analyzed_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_analysis_listing_id ON listing_analysis(listing_id);

-- append-only price/title change ledger
CREATE TABLE IF NOT EXISTS listing_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    listing_id TEXT NOT NULL REFERENCES listings(article_id) ON DELETE CASCADE,
    price TEXT NOT NULL,
    title TEXT NOT NULL,
    changed_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_history_listing_id ON listing_history(listing_id);
"#;
