//! dcrsynth-store
//!
//! Local, versioned artifact storage.
//!
//! Every persist writes two files per table: a timestamped audit copy and the
//! canonical `latest` copy. Only the latest copy matters to downstream
//! deployment, so only its failure is an error; a failed audit copy is logged
//! and reported as a warning. Pruning only ever deletes timestamped copies.
//!
//! Writes for one table are serialized with a per-table lock, so independent
//! tables may be persisted concurrently.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use walkdir::WalkDir;

use dcrsynth_core::model::{ArtifactVersion, PersistedArtifact};

pub mod errors;
pub mod layout;
mod sink;

pub use crate::errors::{StoreError, StoreResult};

const MAX_TIMESTAMP_BUMPS: u32 = 1000;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl StoreConfig {
    pub fn local(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(StoreError::io(
                root,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty store root"),
            ));
        }
        Ok(Self { root })
    }
}

/// Filesystem artifact store.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

impl ArtifactStore {
    /// Open (and create if needed) the store root.
    pub fn open(cfg: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&cfg.root).map_err(|e| StoreError::io(&cfg.root, e))?;
        Ok(Self {
            root: cfg.root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_lock(&self, table_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(table_id.to_string())
            .or_default()
            .clone()
    }

    pub fn latest_path(&self, table_id: &str) -> PathBuf {
        self.root.join(layout::latest_file_name(table_id))
    }

    /// Persist using the current UTC time.
    pub fn persist(&self, table_id: &str, document: &Value) -> StoreResult<PersistedArtifact> {
        self.persist_at(table_id, document, OffsetDateTime::now_utc())
    }

    /// Persist with an explicit creation time.
    pub fn persist_at(
        &self,
        table_id: &str,
        document: &Value,
        at: OffsetDateTime,
    ) -> StoreResult<PersistedArtifact> {
        layout::validate_table_id(table_id)?;
        let bytes = serde_json::to_vec_pretty(document)?;
        let digest = sha256_hex(&bytes);
        let size_bytes = bytes.len() as u64;
        let lock = self.table_lock(table_id);
        let _guard = lock.lock();

        let mut warnings = Vec::new();
        let mut at = at;
        let mut bumps = 0;
        let timestamped = loop {
            let timestamp = layout::format_timestamp(at)?;
            let ts_path = self.root.join(layout::versioned_file_name(table_id, &timestamp));
            match write_new(&ts_path, &bytes) {
                Ok(()) => {
                    break Some(ArtifactVersion {
                        table_id: table_id.to_string(),
                        timestamp,
                        path: ts_path,
                        is_latest: false,
                        size_bytes,
                        sha256: Some(digest.clone()),
                    })
                }
                // Same-millisecond persist: move to the next free millisecond.
                Err(e)
                    if e.kind() == std::io::ErrorKind::AlreadyExists
                        && ts_path.is_file()
                        && bumps < MAX_TIMESTAMP_BUMPS =>
                {
                    at += Duration::milliseconds(1);
                    bumps += 1;
                }
                Err(e) => {
                    tracing::warn!(table = table_id, path = %ts_path.display(), "timestamped copy not written: {e}");
                    warnings.push(format!(
                        "timestamped copy {} not written: {e}",
                        ts_path.display()
                    ));
                    break None;
                }
            }
        };

        let latest_path = self.latest_path(table_id);
        write_atomic(&latest_path, &bytes).map_err(|source| StoreError::LatestWrite {
            path: latest_path.clone(),
            source,
        })?;
        tracing::debug!(table = table_id, path = %latest_path.display(), size_bytes, "artifact persisted");

        Ok(PersistedArtifact {
            latest: ArtifactVersion {
                table_id: table_id.to_string(),
                timestamp: layout::LATEST_MARKER.to_string(),
                path: latest_path,
                is_latest: true,
                size_bytes,
                sha256: Some(digest),
            },
            timestamped,
            warnings,
        })
    }

    /// Read the canonical copy, if one exists.
    pub fn read_latest(&self, table_id: &str) -> StoreResult<Option<Value>> {
        layout::validate_table_id(table_id)?;
        let path = self.latest_path(table_id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Timestamped versions for `table_id`, newest first.
    pub fn timestamped_versions(&self, table_id: &str) -> StoreResult<Vec<ArtifactVersion>> {
        layout::validate_table_id(table_id)?;
        let mut out = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                StoreError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some(timestamp) = layout::parse_versioned(table_id, name) else {
                continue;
            };
            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            out.push(ArtifactVersion {
                table_id: table_id.to_string(),
                timestamp: timestamp.to_string(),
                path: entry.path().to_path_buf(),
                is_latest: false,
                size_bytes,
                sha256: None,
            });
        }
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(out)
    }

    /// Timestamped versions newest first, followed by the latest copy if present.
    pub fn list_versions(&self, table_id: &str) -> StoreResult<Vec<ArtifactVersion>> {
        let mut out = self.timestamped_versions(table_id)?;
        let latest = self.latest_path(table_id);
        match fs::metadata(&latest) {
            Ok(m) => out.push(ArtifactVersion {
                table_id: table_id.to_string(),
                timestamp: layout::LATEST_MARKER.to_string(),
                path: latest,
                is_latest: true,
                size_bytes: m.len(),
                sha256: None,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(latest, e)),
        }
        Ok(out)
    }

    /// Delete all but the newest `keep` timestamped versions. Never touches
    /// the latest copy. Returns the number of files deleted.
    pub fn prune(&self, table_id: &str, keep: usize) -> StoreResult<usize> {
        let lock = self.table_lock(table_id);
        let _guard = lock.lock();

        let versions = self.timestamped_versions(table_id)?;
        let mut removed = 0;
        for v in versions.iter().skip(keep) {
            match fs::remove_file(&v.path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&v.path, e)),
            }
        }
        if removed > 0 {
            tracing::debug!(table = table_id, removed, keep, "pruned old versions");
        }
        Ok(removed)
    }

    /// Write an auxiliary JSON report (e.g. the manual-deployment list) into the store root.
    pub fn write_report<T: Serialize>(&self, file_name: &str, value: &T) -> StoreResult<PathBuf> {
        layout::validate_table_id(file_name)?;
        let path = self.root.join(file_name);
        let bytes = serde_json::to_vec_pretty(value)?;
        write_atomic(&path, &bytes).map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }
}

/// Write a file that must not exist yet.
fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut f = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    f.write_all(bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
