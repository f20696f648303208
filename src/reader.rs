//! Schema-specific readers for browser history databases.
//!
//! Each reader consumes a snapshot plus the profile's cursor and yields
//! normalized [`VisitRecord`]s for rows above the cursor, in ascending
//! source row id order. The cursor is advanced to the maximum row id seen.
//! Query-level failures are logged and yield an empty batch; they never
//! abort the surrounding collection cycle.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use tracing::warn;

use crate::browser::{BrowserFamily, VisitRecord};

/// Substituted for null or empty source titles.
pub const TITLE_PLACEHOLDER: &str = "No Title";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Seconds between 1601-01-01 (the WebKit epoch) and the Unix epoch.
const WEBKIT_UNIX_OFFSET_SECS: i64 = 11_644_473_600;

/// Read all visit rows above `cursor` from a snapshot, dispatching on the
/// profile's browser family. Errors are contained here: a missing table or
/// corrupt snapshot logs a warning and returns an empty batch with the
/// cursor untouched.
pub fn read_new_visits(
    snapshot: &Path,
    family: BrowserFamily,
    label: &str,
    cursor: &mut i64,
) -> Vec<VisitRecord> {
    let result = match family {
        BrowserFamily::Chromium => read_chromium(snapshot, label, cursor),
        BrowserFamily::Firefox => read_firefox(snapshot, label, cursor),
    };
    match result {
        Ok(records) => records,
        Err(err) => {
            warn!("error reading {label} history: {err:#}");
            Vec::new()
        }
    }
}

/// Row count of the primary visits table, used as a connectivity probe
/// during profile discovery.
pub fn count_rows(snapshot: &Path, family: BrowserFamily) -> Result<i64> {
    let conn = open_readonly(snapshot)?;
    let table = match family {
        BrowserFamily::Chromium => "urls",
        BrowserFamily::Firefox => "moz_places",
    };
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

fn read_chromium(path: &Path, label: &str, cursor: &mut i64) -> Result<Vec<VisitRecord>> {
    let conn = open_readonly(path)?;
    let mut stmt = conn.prepare(
        "SELECT id, url, title, visit_count, last_visit_time FROM urls \
         WHERE id > ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([*cursor], |row| {
        let id: i64 = row.get(0)?;
        let url: String = row.get(1)?;
        let title: Option<String> = row.get(2)?;
        let visit_count: Option<i64> = row.get(3)?;
        let last_visit_time: Option<i64> = row.get(4)?;
        Ok((id, url, title, visit_count, last_visit_time))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, url, title, visit_count, last_visit_time) = row?;
        let timestamp = last_visit_time
            .and_then(webkit_micros_to_timestamp)
            .unwrap_or_else(now_timestamp);
        out.push(VisitRecord {
            row_id: id,
            url,
            title: normalize_title(title),
            visit_count: visit_count.unwrap_or(0),
            timestamp,
            raw_visit_time: last_visit_time.unwrap_or(0),
            browser: label.to_string(),
        });
        *cursor = (*cursor).max(id);
    }
    Ok(out)
}

fn read_firefox(path: &Path, label: &str, cursor: &mut i64) -> Result<Vec<VisitRecord>> {
    let conn = open_readonly(path)?;
    let mut stmt = conn.prepare(
        "SELECT id, url, title, visit_count, last_visit_date FROM moz_places \
         WHERE id > ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([*cursor], |row| {
        let id: i64 = row.get(0)?;
        let url: String = row.get(1)?;
        let title: Option<String> = row.get(2)?;
        let visit_count: Option<i64> = row.get(3)?;
        let last_visit_date: Option<i64> = row.get(4)?;
        Ok((id, url, title, visit_count, last_visit_date))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, url, title, visit_count, last_visit_date) = row?;
        let timestamp = last_visit_date
            .and_then(unix_micros_to_timestamp)
            .unwrap_or_else(now_timestamp);
        out.push(VisitRecord {
            row_id: id,
            url,
            title: normalize_title(title),
            visit_count: visit_count.unwrap_or(0),
            timestamp,
            raw_visit_time: last_visit_date.unwrap_or(0),
            browser: label.to_string(),
        });
        *cursor = (*cursor).max(id);
    }
    Ok(out)
}

fn open_readonly(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

fn normalize_title(title: Option<String>) -> String {
    match title {
        Some(t) if !t.is_empty() => t,
        _ => TITLE_PLACEHOLDER.to_string(),
    }
}

/// Chromium stores visit times as microseconds since 1601-01-01 UTC.
fn webkit_micros_to_timestamp(microseconds: i64) -> Option<String> {
    if microseconds <= 0 {
        return None;
    }
    let secs = microseconds / 1_000_000 - WEBKIT_UNIX_OFFSET_SECS;
    if secs < 0 {
        return None;
    }
    format_unix_secs(secs)
}

/// Firefox stores visit times as microseconds since the Unix epoch.
fn unix_micros_to_timestamp(microseconds: i64) -> Option<String> {
    if microseconds <= 0 {
        return None;
    }
    format_unix_secs(microseconds / 1_000_000)
}

fn format_unix_secs(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chromium_fixture(rows: &[(&str, Option<&str>, i64, Option<i64>)]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("History");
        let conn = Connection::open(&path).expect("conn");
        conn.execute(
            "CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT, title TEXT, \
             visit_count INTEGER, last_visit_time INTEGER)",
            [],
        )
        .expect("create");
        for (url, title, visit_count, raw) in rows {
            conn.execute(
                "INSERT INTO urls (url, title, visit_count, last_visit_time) \
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![url, title, visit_count, raw],
            )
            .expect("insert");
        }
        (dir, path)
    }

    #[test]
    fn converts_webkit_micros() {
        // 2023-01-01T00:00:00Z == 1_672_531_200 Unix seconds.
        let raw = (1_672_531_200 + WEBKIT_UNIX_OFFSET_SECS) * 1_000_000;
        assert_eq!(
            webkit_micros_to_timestamp(raw).expect("timestamp"),
            "2023-01-01 00:00:00"
        );
        assert!(webkit_micros_to_timestamp(0).is_none());
        assert!(webkit_micros_to_timestamp(-5).is_none());
    }

    #[test]
    fn converts_unix_micros() {
        assert_eq!(
            unix_micros_to_timestamp(1_672_531_200_000_000).expect("timestamp"),
            "2023-01-01 00:00:00"
        );
        assert!(unix_micros_to_timestamp(0).is_none());
    }

    #[test]
    fn reads_rows_above_cursor_and_advances_it() {
        let raw = (1_672_531_200 + WEBKIT_UNIX_OFFSET_SECS) * 1_000_000;
        let (_dir, path) = chromium_fixture(&[
            ("https://example.com/a", Some("A"), 1, Some(raw)),
            ("https://example.com/b", Some("B"), 2, Some(raw)),
        ]);

        let mut cursor = 0;
        let records = read_new_visits(&path, BrowserFamily::Chromium, "Chrome", &mut cursor);
        assert_eq!(records.len(), 2);
        assert_eq!(cursor, 2);
        assert_eq!(records[0].url, "https://example.com/a");
        assert_eq!(records[0].browser, "Chrome");

        let again = read_new_visits(&path, BrowserFamily::Chromium, "Chrome", &mut cursor);
        assert!(again.is_empty());
        assert_eq!(cursor, 2);
    }

    #[test]
    fn substitutes_title_placeholder() {
        let raw = (1_672_531_200 + WEBKIT_UNIX_OFFSET_SECS) * 1_000_000;
        let (_dir, path) = chromium_fixture(&[
            ("https://example.com", None, 1, Some(raw)),
            ("https://example.org", Some(""), 1, Some(raw)),
        ]);

        let mut cursor = 0;
        let records = read_new_visits(&path, BrowserFamily::Chromium, "Chrome", &mut cursor);
        assert_eq!(records[0].title, TITLE_PLACEHOLDER);
        assert_eq!(records[1].title, TITLE_PLACEHOLDER);
    }

    #[test]
    fn garbage_timestamp_falls_back_to_now() {
        let (_dir, path) = chromium_fixture(&[("https://example.com", Some("X"), 1, None)]);

        let before = Utc::now().timestamp();
        let mut cursor = 0;
        let records = read_new_visits(&path, BrowserFamily::Chromium, "Chrome", &mut cursor);
        assert_eq!(records.len(), 1);
        let parsed = chrono::NaiveDateTime::parse_from_str(&records[0].timestamp, TIMESTAMP_FORMAT)
            .expect("parse");
        let after = Utc::now().timestamp();
        assert!((before..=after).contains(&parsed.and_utc().timestamp()));
    }

    #[test]
    fn missing_table_yields_empty_batch() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("History");
        Connection::open(&path).expect("conn");

        let mut cursor = 0;
        let records = read_new_visits(&path, BrowserFamily::Chromium, "Chrome", &mut cursor);
        assert!(records.is_empty());
        assert_eq!(cursor, 0);
    }

    #[test]
    fn counts_firefox_rows() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("places.sqlite");
        let conn = Connection::open(&path).expect("conn");
        conn.execute(
            "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT, title TEXT, \
             visit_count INTEGER, last_visit_date INTEGER)",
            [],
        )
        .expect("create");
        conn.execute(
            "INSERT INTO moz_places (url, title, visit_count, last_visit_date) \
             VALUES ('https://example.com', 'Example', 3, 1672531200000000)",
            [],
        )
        .expect("insert");
        drop(conn);

        assert_eq!(count_rows(&path, BrowserFamily::Firefox).expect("count"), 1);
    }
}
