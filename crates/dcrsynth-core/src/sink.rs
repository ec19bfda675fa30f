//! Artifact persistence seam.
//!
//! The core crate does no filesystem I/O. Hosts hand the engine an
//! [`ArtifactSink`] (the `dcrsynth-store` crate provides the filesystem one).

use serde_json::Value;

use crate::errors::CoreResult;
use crate::model::PersistedArtifact;

pub trait ArtifactSink: Send + Sync {
    /// Write the timestamped and latest copies of `document`.
    ///
    /// Must fail with `CoreError::PersistenceFatal` only when the latest copy
    /// could not be written; a failed timestamped copy is reported in
    /// `PersistedArtifact::warnings`.
    fn persist(&self, table_id: &str, document: &Value) -> CoreResult<PersistedArtifact>;

    /// Delete all but the newest `keep` timestamped versions. Returns the
    /// number removed.
    fn prune(&self, table_id: &str, keep: usize) -> CoreResult<usize>;
}

/// A sink that keeps nothing. Used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl ArtifactSink for DiscardSink {
    fn persist(&self, table_id: &str, document: &Value) -> CoreResult<PersistedArtifact> {
        let size_bytes = serde_json::to_vec_pretty(document)?.len() as u64;
        Ok(PersistedArtifact {
            latest: crate::model::ArtifactVersion {
                table_id: table_id.to_string(),
                timestamp: "latest".to_string(),
                path: std::path::PathBuf::new(),
                is_latest: true,
                size_bytes,
                sha256: None,
            },
            timestamped: None,
            warnings: Vec::new(),
        })
    }

    fn prune(&self, _table_id: &str, _keep: usize) -> CoreResult<usize> {
        Ok(0)
    }
}
