use serde_json::Value;

use dcrsynth_core::model::PersistedArtifact;
use dcrsynth_core::sink::ArtifactSink;
use dcrsynth_core::{CoreError, CoreResult};

use crate::{ArtifactStore, StoreError};

fn to_core(table_id: &str, e: StoreError) -> CoreError {
    match e {
        StoreError::InvalidTableId(id) => {
            CoreError::invalid_argument(format!("table id '{id}' cannot be stored"))
        }
        other => CoreError::PersistenceFatal {
            table: table_id.to_string(),
            reason: other.to_string(),
        },
    }
}

impl ArtifactSink for ArtifactStore {
    fn persist(&self, table_id: &str, document: &Value) -> CoreResult<PersistedArtifact> {
        ArtifactStore::persist(self, table_id, document).map_err(|e| to_core(table_id, e))
    }

    fn prune(&self, table_id: &str, keep: usize) -> CoreResult<usize> {
        ArtifactStore::prune(self, table_id, keep).map_err(|e| to_core(table_id, e))
    }
}
