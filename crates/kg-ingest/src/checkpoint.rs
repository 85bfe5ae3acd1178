//! Checkpoint tracking for ingestion runs.
//!
//! A checkpoint is the set of item indices whose graph documents have
//! been committed. It is persisted as a JSON array of integers and
//! rewritten after every successful item, so a restarted run skips
//! exactly the work that reached the graph store.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::CheckpointError;

/// Identity of a run's persisted progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey(PathBuf);

impl CheckpointKey {
    /// Use an explicit checkpoint path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Derive the checkpoint path from the input location.
    ///
    /// `talents.json` becomes `talents.checkpoint.json`, or
    /// `talents.<category>.checkpoint.json` when a single category is
    /// ingested. `dir` overrides the input's directory.
    pub fn for_input(input: &Path, category: Option<&str>, dir: Option<&Path>) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "input".to_string());

        let file_name = match category {
            Some(category) => format!("{}.{}.checkpoint.json", stem, slugify(category)),
            None => format!("{}.checkpoint.json", stem),
        };

        let dir = dir
            .map(Path::to_path_buf)
            .or_else(|| input.parent().map(Path::to_path_buf))
            .unwrap_or_default();

        Self(dir.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "category".to_string()
    } else {
        slug.to_string()
    }
}

/// Durable storage for committed-index sets.
///
/// The batch processor is the only writer for a given key; running two
/// processors against the same key at once is not supported.
pub trait CheckpointStore: Send + Sync {
    /// Load the committed indices. Missing record means an empty set.
    fn load(&self, key: &CheckpointKey) -> Result<BTreeSet<usize>, CheckpointError>;

    /// Atomically replace the record with `indices`.
    fn save(&self, key: &CheckpointKey, indices: &BTreeSet<usize>) -> Result<(), CheckpointError>;

    /// Delete the record. Returns whether one existed.
    fn reset(&self, key: &CheckpointKey) -> Result<bool, CheckpointError>;
}

/// Checkpoints stored as JSON files, one per key.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCheckpointStore;

impl FileCheckpointStore {
    pub fn new() -> Self {
        Self
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, key: &CheckpointKey) -> Result<BTreeSet<usize>, CheckpointError> {
        let path = key.path();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(checkpoint = %key, "No existing checkpoint, starting fresh");
                return Ok(BTreeSet::new());
            }
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let indices: BTreeSet<usize> =
            serde_json::from_str(&text).map_err(|e| CheckpointError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        debug!(checkpoint = %key, committed = indices.len(), "Loaded checkpoint");
        Ok(indices)
    }

    fn save(&self, key: &CheckpointKey, indices: &BTreeSet<usize>) -> Result<(), CheckpointError> {
        let bytes = serde_json::to_vec(indices).map_err(|e| CheckpointError::Io {
            path: key.path().to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        write_atomic(key.path(), |file| file.write_all(&bytes)).map_err(|source| {
            CheckpointError::Io {
                path: key.path().to_path_buf(),
                source,
            }
        })?;

        debug!(checkpoint = %key, committed = indices.len(), "Saved checkpoint");
        Ok(())
    }

    fn reset(&self, key: &CheckpointKey) -> Result<bool, CheckpointError> {
        match std::fs::remove_file(key.path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CheckpointError::Io {
                path: key.path().to_path_buf(),
                source,
            }),
        }
    }
}

/// Checkpoints held in memory only.
///
/// Used for dry runs, where nothing reaches the graph store and the
/// on-disk record must stay untouched.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: Mutex<HashMap<CheckpointKey, BTreeSet<usize>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record for `key`.
    pub fn seeded(key: &CheckpointKey, indices: BTreeSet<usize>) -> Self {
        let store = Self::new();
        store.records().insert(key.clone(), indices);
        store
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<CheckpointKey, BTreeSet<usize>>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, key: &CheckpointKey) -> Result<BTreeSet<usize>, CheckpointError> {
        Ok(self.records().get(key).cloned().unwrap_or_default())
    }

    fn save(&self, key: &CheckpointKey, indices: &BTreeSet<usize>) -> Result<(), CheckpointError> {
        self.records().insert(key.clone(), indices.clone());
        Ok(())
    }

    fn reset(&self, key: &CheckpointKey) -> Result<bool, CheckpointError> {
        Ok(self.records().remove(key).is_some())
    }
}

/// Write `path` through a temp file in the same directory.
///
/// The target is replaced by rename only after `write` succeeded and the
/// data reached disk; on any error the temp file is removed and the
/// previous content stays in place.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    #[cfg(unix)]
    File::open(&dir)?.sync_all()?;

    Ok(())
}
