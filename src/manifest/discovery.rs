//! Fragment discovery, signatures and change classification.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::ManifestConfig;
use crate::error::ConfigError;

/// A discovered module manifest fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    path: String,
    file: PathBuf,
    signature: String,
}

impl Fragment {
    /// Root-relative canonical path, e.g. `/modules/blog/module.json`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Location on disk.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Content signature at discovery time.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Name of the directory holding the fragment.
    #[must_use]
    pub fn module_name(&self) -> &str {
        module_name(&self.path)
    }

    /// Directory holding the fragment.
    #[must_use]
    pub fn module_dir(&self) -> &Path {
        self.file.parent().unwrap_or(&self.file)
    }
}

pub(crate) fn module_name(path: &str) -> &str {
    path.rsplit('/').nth(1).unwrap_or_default()
}

/// Change state of one fragment relative to the cached signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// Not in the cached signatures.
    New,
    /// Present in both, signature differs.
    Changed,
    /// Cached but no longer on disk.
    Removed,
    /// Same signature as cached.
    Unchanged,
}

impl ModuleState {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Changed => "changed",
            Self::Removed => "removed",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hashes the file's modification time, size and change time.
///
/// Content is never read; touching a file without changing it still counts
/// as a change.
pub fn signature(file: &Path) -> IoResult<String> {
    let meta = fs::metadata(file)?;
    let stamp = stamp(&meta);
    Ok(blake3::hash(stamp.as_bytes()).to_hex().to_string())
}

#[cfg(unix)]
fn stamp(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    format!(
        "{}.{},{},{}.{}",
        meta.mtime(),
        meta.mtime_nsec(),
        meta.size(),
        meta.ctime(),
        meta.ctime_nsec()
    )
}

#[cfg(not(unix))]
fn stamp(meta: &fs::Metadata) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = |t: IoResult<SystemTime>| {
        t.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_nanos())
    };
    let modified = nanos(meta.modified());
    let created = meta.created().map_or(modified, |c| nanos(Ok(c)));
    format!("{modified},{},{created}", meta.len())
}

/// Lists the directories named by one search path.
fn search_dirs(root: &Path, search_path: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let Some(base) = search_path.strip_suffix("/*") else {
        return Ok(vec![root.join(search_path)]);
    };

    let base = root.join(base);
    let unreadable = |source: std::io::Error| ConfigError::UnreadableFragment {
        path: base.clone(),
        source,
    };
    let entries = match fs::read_dir(&base) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(unreadable(e)),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry.map_err(unreadable)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Whether `file` exists as a regular file. A missing file is not an error.
fn fragment_exists(file: &Path) -> Result<bool, ConfigError> {
    match fs::metadata(file) {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ConfigError::UnreadableFragment {
            path: file.to_path_buf(),
            source,
        }),
    }
}

fn canonical(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(format!("/{}", parts.join("/")))
}

/// Finds every fragment under the configured search paths.
///
/// Paths are deduplicated and sorted.
///
/// # Errors
/// `ConfigError::UnreadableFragment` if a search directory cannot be listed
/// or a fragment cannot be stat'ed. Dropping it would make its cached entry
/// look removed.
pub fn discover(config: &ManifestConfig) -> Result<Vec<Fragment>, ConfigError> {
    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();

    for search_path in &config.search_paths {
        for dir in search_dirs(&config.root, search_path)? {
            let file = dir.join(&config.fragment_name);
            if !fragment_exists(&file)? {
                continue;
            }
            let Some(path) = canonical(&config.root, &file) else {
                continue;
            };
            if config.is_excluded(module_name(&path)) {
                debug!(fragment = %path, "skipping excluded module");
                continue;
            }
            found.entry(path).or_insert(file);
        }
    }

    found
        .into_iter()
        .map(|(path, file)| {
            let signature = signature(&file).map_err(|source| ConfigError::UnreadableFragment {
                path: file.clone(),
                source,
            })?;
            Ok(Fragment { path, file, signature })
        })
        .collect()
}

/// Classifies the union of cached and current fragments.
pub fn classify(
    cached: &BTreeMap<String, String>,
    current: &[Fragment],
) -> BTreeMap<String, ModuleState> {
    let current_map: BTreeMap<&str, &str> = current
        .iter()
        .map(|f| (f.path(), f.signature()))
        .collect();
    let paths: BTreeSet<&str> = cached
        .keys()
        .map(String::as_str)
        .chain(current_map.keys().copied())
        .collect();

    paths
        .into_iter()
        .map(|path| {
            let state = match (cached.get(path), current_map.get(path)) {
                (None, _) => ModuleState::New,
                (Some(_), None) => ModuleState::Removed,
                (Some(old), Some(new)) if old != new => ModuleState::Changed,
                _ => ModuleState::Unchanged,
            };
            (path.to_string(), state)
        })
        .collect()
}
