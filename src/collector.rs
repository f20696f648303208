//! Collection cycle orchestration.
//!
//! One tick fully processes every known profile in order: snapshot, read
//! above the cursor, merge, report. Cursors live in process memory only;
//! a restart re-scans full history and relies on the store's unique key to
//! suppress re-insertion. The loop suspends only between ticks and always
//! finishes a tick before observing cancellation, so a merge is never
//! interrupted mid-batch.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::browser::Profile;
use crate::locate::{self, ProfileRoots};
use crate::reader;
use crate::snapshot::{self, ForcedCopy, ShellForcedCopy};
use crate::store::HistoryStore;

pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Outcome of one profile within one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileOutcome {
    /// New rows were merged into the store.
    Inserted(usize),
    /// Rows were read but every one already existed in the store.
    AlreadyKnown,
    /// Nothing above the cursor; the source was read before.
    NoNewSinceLastCheck,
    /// Nothing read and the cursor never advanced: missing or unreadable.
    NoHistory,
}

/// Per-tick result, mainly of interest to tests and callers embedding the
/// collector.
#[derive(Debug)]
pub struct TickReport {
    pub total_inserted: usize,
    pub outcomes: BTreeMap<String, ProfileOutcome>,
}

pub struct Collector {
    store: HistoryStore,
    roots: ProfileRoots,
    copier: Box<dyn ForcedCopy>,
    profiles: BTreeMap<String, Profile>,
    cursors: HashMap<String, i64>,
}

impl Collector {
    /// Collector that discovers profiles from `roots` on the first tick.
    pub fn new(store: HistoryStore, roots: ProfileRoots) -> Self {
        Self {
            store,
            roots,
            copier: Box::new(ShellForcedCopy),
            profiles: BTreeMap::new(),
            cursors: HashMap::new(),
        }
    }

    /// Collector over a fixed profile set, skipping discovery.
    pub fn with_profiles(store: HistoryStore, profiles: BTreeMap<String, Profile>) -> Self {
        Self {
            store,
            roots: ProfileRoots::default(),
            copier: Box::new(ShellForcedCopy),
            profiles,
            cursors: HashMap::new(),
        }
    }

    /// Last merged source row id for a profile label, if any tick read it.
    pub fn cursor(&self, label: &str) -> Option<i64> {
        self.cursors.get(label).copied()
    }

    /// Run one full collection pass over all known profiles.
    pub fn run_tick(&mut self) -> Result<TickReport> {
        if self.profiles.is_empty() {
            self.profiles = locate::discover(&self.roots, self.copier.as_ref());
        }
        info!(
            "collecting browser histories from {} profile(s)",
            self.profiles.len()
        );

        let mut report = TickReport {
            total_inserted: 0,
            outcomes: BTreeMap::new(),
        };
        let profiles: Vec<Profile> = self.profiles.values().cloned().collect();
        for profile in profiles {
            let mut cursor = self.cursors.get(&profile.label).copied().unwrap_or(0);
            let outcome = self.collect_profile(&profile, &mut cursor)?;
            self.cursors.insert(profile.label.clone(), cursor);

            match outcome {
                ProfileOutcome::Inserted(count) => {
                    info!("{}: {count} new entries", profile.label);
                    report.total_inserted += count;
                }
                ProfileOutcome::AlreadyKnown => info!("{}: no new entries", profile.label),
                ProfileOutcome::NoNewSinceLastCheck => {
                    debug!("{}: no new visits since last check", profile.label)
                }
                ProfileOutcome::NoHistory => info!("{}: no history found", profile.label),
            }
            report.outcomes.insert(profile.label, outcome);
        }

        if report.total_inserted > 0 {
            info!("total new entries saved: {}", report.total_inserted);
        } else {
            info!("no new browsing activity detected");
        }
        Ok(report)
    }

    /// Tick until `cancel` is raised. A failed tick is logged and retried
    /// on the next interval; cancellation is observed during the sleep and
    /// between ticks, never inside one.
    pub fn run_continuous(&mut self, interval: Duration, cancel: &AtomicBool) {
        while !cancel.load(Ordering::Relaxed) {
            if let Err(err) = self.run_tick() {
                warn!("collection tick failed: {err:#}");
            }
            debug!("next check in {}s", interval.as_secs());
            if !sleep_cancellable(interval, cancel) {
                break;
            }
        }
        info!("monitoring stopped");
    }

    fn collect_profile(&self, profile: &Profile, cursor: &mut i64) -> Result<ProfileOutcome> {
        let records = match snapshot::take(&profile.history_path, self.copier.as_ref()) {
            Some(snap) => {
                reader::read_new_visits(snap.path(), profile.family, &profile.label, cursor)
            }
            None => Vec::new(),
        };

        if records.is_empty() {
            return Ok(if *cursor == 0 {
                ProfileOutcome::NoHistory
            } else {
                ProfileOutcome::NoNewSinceLastCheck
            });
        }

        let inserted = self.store.persist(&records)?;
        Ok(if inserted > 0 {
            ProfileOutcome::Inserted(inserted)
        } else {
            ProfileOutcome::AlreadyKnown
        })
    }
}

/// Sleep in short steps so an interrupt is honored promptly. Returns false
/// when cancelled.
fn sleep_cancellable(duration: Duration, cancel: &AtomicBool) -> bool {
    let step = Duration::from_millis(500);
    let mut remaining = duration;
    while !remaining.is_zero() {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let slice = remaining.min(step);
        thread::sleep(slice);
        remaining -= slice;
    }
    !cancel.load(Ordering::Relaxed)
}
