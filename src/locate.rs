//! Discovery of browser history sources on the local machine.
//!
//! Scans the per-OS install locations of each supported browser family and
//! returns a mapping of unique display label to history file path. A
//! profile is included only when its history file exists, is non-empty,
//! and a snapshot-plus-row-count probe succeeds with at least one row.
//! Finding nothing is not an error; it yields an empty mapping.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::browser::{BrowserFamily, Profile};
use crate::reader;
use crate::snapshot::{self, ForcedCopy};

/// Chromium-family products scanned for profiles. Extending the family is
/// a matter of adding a (product, user-data root) pair per platform.
#[cfg(target_os = "windows")]
const CHROMIUM_VARIANTS: &[(&str, &[&str])] = &[
    ("Chrome", &["Google", "Chrome", "User Data"]),
    ("Edge", &["Microsoft", "Edge", "User Data"]),
    ("Brave", &["BraveSoftware", "Brave-Browser", "User Data"]),
];

#[cfg(target_os = "macos")]
const CHROMIUM_VARIANTS: &[(&str, &[&str])] = &[
    ("Chrome", &["Google", "Chrome"]),
    ("Edge", &["Microsoft Edge"]),
    ("Brave", &["BraveSoftware", "Brave-Browser"]),
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const CHROMIUM_VARIANTS: &[(&str, &[&str])] = &[
    ("Chrome", &["google-chrome"]),
    ("Edge", &["microsoft-edge"]),
    ("Brave", &["BraveSoftware", "Brave-Browser"]),
];

const FIREFOX_LABEL: &str = "Firefox";

/// Root directories to scan, resolved per OS. Kept as plain data so tests
/// can point discovery at a synthetic layout.
#[derive(Debug, Clone, Default)]
pub struct ProfileRoots {
    /// (product name, user-data directory holding profile subdirectories)
    pub chromium: Vec<(String, PathBuf)>,
    /// Directory holding Firefox profile subdirectories.
    pub firefox: Option<PathBuf>,
}

/// Resolve the well-known browser data roots for this OS.
pub fn default_roots() -> ProfileRoots {
    let mut chromium = Vec::new();
    if let Some(base) = chromium_base_dir() {
        for (product, rel) in CHROMIUM_VARIANTS {
            let mut root = base.clone();
            root.extend(rel.iter());
            chromium.push((product.to_string(), root));
        }
    }
    ProfileRoots {
        chromium,
        firefox: firefox_profiles_dir(),
    }
}

#[cfg(target_os = "windows")]
fn chromium_base_dir() -> Option<PathBuf> {
    std::env::var_os("LOCALAPPDATA")
        .map(PathBuf::from)
        .or_else(dirs::data_local_dir)
}

#[cfg(not(target_os = "windows"))]
fn chromium_base_dir() -> Option<PathBuf> {
    dirs::config_dir()
}

#[cfg(target_os = "windows")]
fn firefox_profiles_dir() -> Option<PathBuf> {
    std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .or_else(dirs::data_dir)
        .map(|base| base.join("Mozilla").join("Firefox").join("Profiles"))
}

#[cfg(target_os = "macos")]
fn firefox_profiles_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("Firefox").join("Profiles"))
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn firefox_profiles_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mozilla").join("firefox"))
}

/// Scan all roots and return the label -> profile mapping.
pub fn discover(roots: &ProfileRoots, copier: &dyn ForcedCopy) -> BTreeMap<String, Profile> {
    let mut profiles = BTreeMap::new();

    for (product, root) in &roots.chromium {
        discover_chromium(product, root, copier, &mut profiles);
    }

    if let Some(dir) = &roots.firefox {
        match find_firefox_profile(dir, copier) {
            Some(profile) => {
                profiles.insert(profile.label.clone(), profile);
            }
            None => debug!("Firefox: no usable profile under {}", dir.display()),
        }
    }

    if profiles.is_empty() {
        warn!("no browser history sources found");
    }
    profiles
}

fn discover_chromium(
    product: &str,
    root: &Path,
    copier: &dyn ForcedCopy,
    out: &mut BTreeMap<String, Profile>,
) {
    if !root.is_dir() {
        debug!("{product}: not installed ({})", root.display());
        return;
    }
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("{product}: cannot enumerate profiles: {err}");
            return;
        }
    };

    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let history = dir.join("History");
        let name = entry.file_name().to_string_lossy().into_owned();
        match probe_source(&history, BrowserFamily::Chromium, copier) {
            Probe::Usable(rows) => {
                let label = chromium_label(product, &name);
                info!("{label}: found history at {} ({rows} rows)", history.display());
                out.insert(
                    label.clone(),
                    Profile {
                        family: BrowserFamily::Chromium,
                        label,
                        history_path: history,
                    },
                );
            }
            Probe::Empty => debug!("{product}/{name}: history present but empty"),
            Probe::Absent => {}
            Probe::Unreadable => debug!("{product}/{name}: history unreadable"),
        }
    }
}

/// First profile directory containing a usable places database wins; names
/// containing "default" are tried first, the rest in enumeration order.
fn find_firefox_profile(profiles_dir: &Path, copier: &dyn ForcedCopy) -> Option<Profile> {
    if !profiles_dir.is_dir() {
        debug!("Firefox: not installed ({})", profiles_dir.display());
        return None;
    }
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(profiles_dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    candidates.sort_by_key(|dir| !dir_name_contains_default(dir));

    for dir in candidates {
        let places = dir.join("places.sqlite");
        if let Probe::Usable(rows) = probe_source(&places, BrowserFamily::Firefox, copier) {
            info!(
                "{FIREFOX_LABEL}: found history at {} ({rows} rows)",
                places.display()
            );
            return Some(Profile {
                family: BrowserFamily::Firefox,
                label: FIREFOX_LABEL.to_string(),
                history_path: places,
            });
        }
    }
    None
}

fn dir_name_contains_default(dir: &Path) -> bool {
    dir.file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase().contains("default"))
        .unwrap_or(false)
}

/// The default profile keeps the bare product name; any other profile is
/// suffixed so labels stay unique across profiles of the same family.
fn chromium_label(product: &str, profile_name: &str) -> String {
    if profile_name == "Default" {
        product.to_string()
    } else {
        format!("{product}-{profile_name}")
    }
}

enum Probe {
    Absent,
    Empty,
    Unreadable,
    Usable(i64),
}

fn probe_source(path: &Path, family: BrowserFamily, copier: &dyn ForcedCopy) -> Probe {
    let Ok(meta) = std::fs::metadata(path) else {
        return Probe::Absent;
    };
    if meta.len() == 0 {
        return Probe::Empty;
    }
    let Some(snap) = snapshot::take(path, copier) else {
        return Probe::Unreadable;
    };
    match reader::count_rows(snap.path(), family) {
        Ok(rows) if rows > 0 => Probe::Usable(rows),
        Ok(_) => Probe::Empty,
        Err(err) => {
            warn!("probe failed for {}: {err:#}", path.display());
            Probe::Unreadable
        }
    }
}
