use std::path::PathBuf;

/// Browser engine family; selects the schema used to read a history file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Chromium,
    Firefox,
}

/// One browser installation plus user profile acting as a history source.
///
/// Discovered once at startup and treated as immutable for the process
/// lifetime; the label is unique across all discovered profiles.
#[derive(Debug, Clone)]
pub struct Profile {
    pub family: BrowserFamily,
    pub label: String,
    pub history_path: PathBuf,
}

/// Normalized visit row read from a source database, not yet persisted.
#[derive(Debug, Clone)]
pub struct VisitRecord {
    /// Source row id, used only to advance the per-profile cursor.
    pub row_id: i64,
    pub url: String,
    pub title: String,
    pub visit_count: i64,
    /// UTC, second precision, "%Y-%m-%d %H:%M:%S".
    pub timestamp: String,
    /// Raw last-visit value exactly as stored by the source browser.
    pub raw_visit_time: i64,
    pub browser: String,
}
