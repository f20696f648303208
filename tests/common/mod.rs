//! Shared fixtures for collection tests.
//!
//! Builds real SQLite history files with the Chromium `urls` and Firefox
//! `moz_places` shapes, so tests exercise the same read path as a live
//! browser profile.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::Connection;

use webtrail::browser::{BrowserFamily, Profile};

/// Seconds between the WebKit epoch (1601) and the Unix epoch.
pub const WEBKIT_UNIX_OFFSET_SECS: i64 = 11_644_473_600;

/// Chromium raw visit time for a Unix timestamp in seconds.
pub fn webkit_micros(unix_secs: i64) -> i64 {
    (unix_secs + WEBKIT_UNIX_OFFSET_SECS) * 1_000_000
}

/// Firefox raw visit time for a Unix timestamp in seconds.
pub fn unix_micros(unix_secs: i64) -> i64 {
    unix_secs * 1_000_000
}

pub fn create_chromium_history(path: &Path) {
    let conn = Connection::open(path).expect("conn");
    conn.execute(
        "CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT, title TEXT, \
         visit_count INTEGER, last_visit_time INTEGER)",
        [],
    )
    .expect("create urls");
}

pub fn insert_chromium_row(
    path: &Path,
    url: &str,
    title: Option<&str>,
    visit_count: i64,
    last_visit_time: Option<i64>,
) {
    let conn = Connection::open(path).expect("conn");
    conn.execute(
        "INSERT INTO urls (url, title, visit_count, last_visit_time) \
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![url, title, visit_count, last_visit_time],
    )
    .expect("insert url");
}

pub fn create_firefox_history(path: &Path) {
    let conn = Connection::open(path).expect("conn");
    conn.execute(
        "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT, title TEXT, \
         visit_count INTEGER, last_visit_date INTEGER)",
        [],
    )
    .expect("create moz_places");
}

pub fn insert_firefox_row(
    path: &Path,
    url: &str,
    title: Option<&str>,
    visit_count: i64,
    last_visit_date: Option<i64>,
) {
    let conn = Connection::open(path).expect("conn");
    conn.execute(
        "INSERT INTO moz_places (url, title, visit_count, last_visit_date) \
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![url, title, visit_count, last_visit_date],
    )
    .expect("insert place");
}

pub fn profile(family: BrowserFamily, label: &str, history_path: &Path) -> Profile {
    Profile {
        family,
        label: label.to_string(),
        history_path: history_path.to_path_buf(),
    }
}

pub fn single_profile(
    family: BrowserFamily,
    label: &str,
    history_path: &Path,
) -> BTreeMap<String, Profile> {
    let mut profiles = BTreeMap::new();
    profiles.insert(label.to_string(), profile(family, label, history_path));
    profiles
}
