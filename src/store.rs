//! Persisted visit store and daily domain rollup.
//!
//! This module is the only owner of the two persisted tables. Dedup is
//! enforced by the store's unique key (url, timestamp, browser), entirely
//! independent of the readers' cursors. Connections are opened and closed
//! within each discrete operation so no long-lived lock is held on the
//! store file.

use std::path::{Path, PathBuf};

use chrono::Local;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::browser::VisitRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS browsing_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT,
    visit_count INTEGER DEFAULT 1,
    browser TEXT NOT NULL,
    last_visit_time TEXT,
    UNIQUE(url, timestamp, browser)
);
CREATE TABLE IF NOT EXISTS daily_summary (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    domain TEXT NOT NULL,
    visit_count INTEGER DEFAULT 1,
    browser TEXT,
    UNIQUE(date, domain, browser)
);
CREATE INDEX IF NOT EXISTS idx_timestamp ON browsing_history(timestamp);
CREATE INDEX IF NOT EXISTS idx_url ON browsing_history(url);
CREATE INDEX IF NOT EXISTS idx_browser ON browsing_history(browser);
CREATE INDEX IF NOT EXISTS idx_daily_date ON daily_summary(date);
";

/// A history entry as returned by the read-only query surface.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub timestamp: String,
    pub browser: String,
    pub title: String,
    pub url: String,
}

/// Overall statistics for the `summary` command.
#[derive(Debug, Clone)]
pub struct SummaryStats {
    pub total_entries: i64,
    pub unique_urls: i64,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    pub per_browser: Vec<(String, i64)>,
    pub top_domains: Vec<(String, i64)>,
    pub most_active_day: Option<(String, i64)>,
}

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Open (creating if needed) the store at `path` and ensure the schema.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, StoreError> {
        Ok(Connection::open(&self.path)?)
    }

    /// Merge a batch of records, returning the count actually inserted.
    ///
    /// All writes happen in one transaction. Inserts hitting the dedup key
    /// are ignored; the daily rollup is bumped only for rows that were
    /// actually new. A per-row failure is logged and that row skipped
    /// without aborting the rest of the batch.
    pub fn persist(&self, records: &[VisitRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let today = Local::now().format("%Y-%m-%d").to_string();

        let mut inserted = 0usize;
        for record in records {
            match insert_entry(&tx, record) {
                Ok(true) => {
                    inserted += 1;
                    let domain = extract_domain(&record.url);
                    if let Err(err) = bump_daily(&tx, &today, &domain, &record.browser) {
                        warn!("daily rollup failed for {domain}: {err}");
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        "skipping row {} from {}: {err}",
                        record.row_id, record.browser
                    );
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryRow>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, browser, title, url FROM browsing_history \
             ORDER BY timestamp DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], row_to_history)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Substring search over url and title, newest first, capped at 100.
    pub fn search(&self, term: &str) -> Result<Vec<HistoryRow>, StoreError> {
        let conn = self.open()?;
        let pattern = format!("%{term}%");
        let mut stmt = conn.prepare(
            "SELECT timestamp, browser, title, url FROM browsing_history \
             WHERE url LIKE ?1 OR title LIKE ?1 \
             ORDER BY timestamp DESC LIMIT 100",
        )?;
        let rows = stmt.query_map([&pattern], row_to_history)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn total_entries(&self) -> Result<i64, StoreError> {
        let conn = self.open()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM browsing_history", [], |row| row.get(0))?)
    }

    /// Per-(domain, browser) visit totals for one calendar day, busiest first.
    pub fn domains_for_day(&self, date: &str) -> Result<Vec<(String, i64, String)>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT domain, SUM(visit_count) AS total, browser FROM daily_summary \
             WHERE date = ?1 GROUP BY domain, browser ORDER BY total DESC LIMIT 20",
        )?;
        let rows = stmt.query_map([date], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn browser_totals_for_day(&self, date: &str) -> Result<Vec<(String, i64)>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT browser, SUM(visit_count) AS total FROM daily_summary \
             WHERE date = ?1 GROUP BY browser ORDER BY total DESC",
        )?;
        let rows = stmt.query_map([date], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                row.get(1)?,
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Aggregate visit total for one (day, browser), across all domains.
    pub fn daily_total(&self, date: &str, browser: &str) -> Result<i64, StoreError> {
        let conn = self.open()?;
        Ok(conn.query_row(
            "SELECT COALESCE(SUM(visit_count), 0) FROM daily_summary \
             WHERE date = ?1 AND browser = ?2",
            params![date, browser],
            |row| row.get(0),
        )?)
    }

    /// Top domains over the trailing `days` window of the daily rollup.
    pub fn top_domains(&self, days: u32) -> Result<Vec<(String, i64)>, StoreError> {
        let conn = self.open()?;
        let window = format!("-{days} days");
        let mut stmt = conn.prepare(
            "SELECT domain, SUM(visit_count) AS total FROM daily_summary \
             WHERE date >= date('now', ?1) GROUP BY domain \
             ORDER BY total DESC LIMIT 30",
        )?;
        let rows = stmt.query_map([&window], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn summary(&self) -> Result<SummaryStats, StoreError> {
        let conn = self.open()?;
        let total_entries: i64 =
            conn.query_row("SELECT COUNT(*) FROM browsing_history", [], |row| row.get(0))?;
        let unique_urls: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT url) FROM browsing_history",
            [],
            |row| row.get(0),
        )?;
        let (first_timestamp, last_timestamp) = conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM browsing_history",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
            "SELECT browser, COUNT(*) AS total FROM browsing_history \
             GROUP BY browser ORDER BY total DESC",
        )?;
        let per_browser = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT domain, SUM(visit_count) AS total FROM daily_summary \
             GROUP BY domain ORDER BY total DESC LIMIT 10",
        )?;
        let top_domains = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let most_active_day = conn
            .query_row(
                "SELECT date, SUM(visit_count) AS total FROM daily_summary \
                 GROUP BY date ORDER BY total DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(SummaryStats {
            total_entries,
            unique_urls,
            first_timestamp,
            last_timestamp,
            per_browser,
            top_domains,
            most_active_day,
        })
    }
}

fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        timestamp: row.get(0)?,
        browser: row.get(1)?,
        title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        url: row.get(3)?,
    })
}

fn insert_entry(tx: &Transaction<'_>, record: &VisitRecord) -> rusqlite::Result<bool> {
    let changed = tx.execute(
        "INSERT OR IGNORE INTO browsing_history \
         (timestamp, url, title, visit_count, browser, last_visit_time) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.timestamp,
            record.url,
            record.title,
            record.visit_count,
            record.browser,
            record.raw_visit_time.to_string(),
        ],
    )?;
    Ok(changed > 0)
}

fn bump_daily(tx: &Transaction<'_>, date: &str, domain: &str, browser: &str) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO daily_summary (date, domain, visit_count, browser) \
         VALUES (?1, ?2, 1, ?3) \
         ON CONFLICT(date, domain, browser) \
         DO UPDATE SET visit_count = visit_count + 1",
        params![date, domain, browser],
    )?;
    Ok(())
}

/// Host component of the url; the raw string when it does not parse.
fn extract_domain(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(url: &str, timestamp: &str, browser: &str) -> VisitRecord {
        VisitRecord {
            row_id: 1,
            url: url.to_string(),
            title: "Example".to_string(),
            visit_count: 1,
            timestamp: timestamp.to_string(),
            raw_visit_time: 0,
            browser: browser.to_string(),
        }
    }

    #[test]
    fn extracts_host_with_raw_fallback() {
        assert_eq!(extract_domain("https://www.youtube.com/watch"), "www.youtube.com");
        assert_eq!(extract_domain("not a url"), "not a url");
    }

    #[test]
    fn second_insert_of_same_key_is_ignored() {
        let dir = tempdir().expect("tempdir");
        let store = HistoryStore::new(&dir.path().join("store.db")).expect("store");

        let batch = [record("https://example.com", "2023-01-01 00:00:00", "Chrome")];
        assert_eq!(store.persist(&batch).expect("persist"), 1);
        assert_eq!(store.persist(&batch).expect("persist"), 0);
        assert_eq!(store.total_entries().expect("count"), 1);
    }

    #[test]
    fn rollup_counts_only_new_rows() {
        let dir = tempdir().expect("tempdir");
        let store = HistoryStore::new(&dir.path().join("store.db")).expect("store");
        let today = Local::now().format("%Y-%m-%d").to_string();

        let batch = [
            record("https://example.com/a", "2023-01-01 00:00:00", "Chrome"),
            record("https://example.com/b", "2023-01-01 00:00:01", "Chrome"),
            // duplicate of the first key, must not bump the rollup
            record("https://example.com/a", "2023-01-01 00:00:00", "Chrome"),
        ];
        assert_eq!(store.persist(&batch).expect("persist"), 2);
        assert_eq!(store.daily_total(&today, "Chrome").expect("total"), 2);
    }
}
