//! Read-only query commands over the persisted store.
//!
//! Thin printing layer; all SQL lives in the store module. Every command
//! runs once and succeeds even when the result set is empty.

use anyhow::Result;
use chrono::Local;

use crate::store::HistoryStore;

pub fn view(store: &HistoryStore, limit: usize, json: bool) -> Result<()> {
    let rows = store.recent(limit)?;
    if json {
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
        return Ok(());
    }

    println!("Recent browsing history (last {limit} entries)");
    for row in &rows {
        println!("[{}] [{}]", row.timestamp, row.browser);
        println!("  title: {}", row.title);
        println!("  url:   {}", row.url);
    }
    println!("total entries in store: {}", store.total_entries()?);
    Ok(())
}

pub fn daily(store: &HistoryStore) -> Result<()> {
    let today = Local::now().format("%Y-%m-%d").to_string();
    println!("Daily browsing report - {today}");

    let domains = store.domains_for_day(&today)?;
    if domains.is_empty() {
        println!("  no browsing activity recorded today");
        return Ok(());
    }
    println!("Top sites visited today:");
    for (domain, visits, browser) in &domains {
        println!("  {domain} - {visits} visits [{browser}]");
    }

    let browsers = store.browser_totals_for_day(&today)?;
    println!("Browser usage today:");
    for (browser, visits) in &browsers {
        println!("  {browser}: {visits} visits");
    }
    Ok(())
}

pub fn top(store: &HistoryStore, days: u32) -> Result<()> {
    println!("Top visited sites (last {days} days)");
    let domains = store.top_domains(days)?;
    if domains.is_empty() {
        println!("  no data available");
        return Ok(());
    }
    for (rank, (domain, visits)) in domains.iter().enumerate() {
        println!("{:2}. {domain} - {visits} visits", rank + 1);
    }
    Ok(())
}

pub fn search(store: &HistoryStore, term: &str) -> Result<()> {
    let rows = store.search(term)?;
    println!("Search results for '{term}'");
    if rows.is_empty() {
        println!("  no results found");
        return Ok(());
    }
    println!("found {} result(s):", rows.len());
    for row in &rows {
        println!("[{}] [{}]", row.timestamp, row.browser);
        println!("  title: {}", row.title);
        println!("  url:   {}", row.url);
    }
    Ok(())
}

pub fn summary(store: &HistoryStore) -> Result<()> {
    let stats = store.summary()?;

    println!("Overall browsing summary");
    println!("  total entries: {}", stats.total_entries);
    println!("  unique urls:   {}", stats.unique_urls);
    if let (Some(first), Some(last)) = (&stats.first_timestamp, &stats.last_timestamp) {
        println!("  date range:    {} to {}", &first[..10.min(first.len())], &last[..10.min(last.len())]);
    }

    if !stats.per_browser.is_empty() {
        let total: i64 = stats.per_browser.iter().map(|(_, count)| count).sum();
        println!("Browser usage:");
        for (browser, count) in &stats.per_browser {
            let pct = if total > 0 {
                *count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            println!("  {browser}: {count} entries ({pct:.1}%)");
        }
    }

    if !stats.top_domains.is_empty() {
        println!("Top all-time sites:");
        for (rank, (domain, visits)) in stats.top_domains.iter().enumerate() {
            println!("  {:2}. {domain} - {visits} visits", rank + 1);
        }
    }

    if let Some((date, visits)) = &stats.most_active_day {
        println!("Most active day: {date} ({visits} visits)");
    }
    Ok(())
}
