//! Batch processing.
//!
//! Failures are per table: they are recorded and the loop moves on. The one
//! exception is a template structure error on the very first table, which
//! means the template file itself is bad and aborts the run.
//!
//! With the `parallel` feature the tables after the first one are processed
//! on the rayon pool. Results are folded into a [`BatchSummary`] only after
//! every table has finished, so nothing shared is mutated while tables run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::errors::{CoreError, CoreResult};
use crate::naming::NameCollision;
use crate::pipeline::{Engine, PipelineDiagnostic, TableFailure, TableInput, TableReport};
use crate::sink::ArtifactSink;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// What happened to one table.
#[derive(Debug)]
pub enum TableOutcome {
    /// Passed the risk gate; ready for automated deployment.
    Ready(TableReport),
    /// Persisted, but routed to manual deployment by the risk gate.
    Manual(TableReport),
    Failed(TableFailure),
    /// Not started because the batch was cancelled.
    Cancelled(String),
}

impl TableOutcome {
    pub fn table_id(&self) -> &str {
        match self {
            Self::Ready(r) | Self::Manual(r) => &r.table_id,
            Self::Failed(f) => &f.table_id,
            Self::Cancelled(t) => t,
        }
    }

    fn from_result(result: Result<TableReport, TableFailure>) -> Self {
        match result {
            Ok(r) if r.risk.should_deploy => Self::Ready(r),
            Ok(r) => Self::Manual(r),
            Err(f) => Self::Failed(f),
        }
    }
}

/// Serializable view of a failed table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTable {
    pub table_id: String,
    pub code: String,
    pub reason: String,
    pub diagnostics: Vec<PipelineDiagnostic>,
}

impl From<TableFailure> for FailedTable {
    fn from(f: TableFailure) -> Self {
        Self {
            table_id: f.table_id,
            code: f.error.code().to_string(),
            reason: f.error.to_string(),
            diagnostics: f.diagnostics,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub total: usize,
    pub ready: usize,
    pub manual: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Immutable end-of-run summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub counts: BatchCounts,
    pub ready: Vec<TableReport>,
    pub manual: Vec<TableReport>,
    pub failed: Vec<FailedTable>,
    pub cancelled: Vec<String>,
    pub collisions: Vec<NameCollision>,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: Vec<TableOutcome>, collisions: Vec<NameCollision>) -> Self {
        let mut s = BatchSummary {
            collisions,
            ..Default::default()
        };
        for o in outcomes {
            match o {
                TableOutcome::Ready(r) => s.ready.push(r),
                TableOutcome::Manual(r) => s.manual.push(r),
                TableOutcome::Failed(f) => s.failed.push(f.into()),
                TableOutcome::Cancelled(t) => s.cancelled.push(t),
            }
        }
        s.counts = BatchCounts {
            total: s.ready.len() + s.manual.len() + s.failed.len() + s.cancelled.len(),
            ready: s.ready.len(),
            manual: s.manual.len(),
            failed: s.failed.len(),
            cancelled: s.cancelled.len(),
        };
        s
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }
}

/// Hooks for a batch run.
#[derive(Default, Clone, Copy)]
pub struct BatchOptions<'a> {
    /// Checked before each table starts.
    pub cancel: Option<&'a AtomicBool>,
    /// Called once per finished table, from whichever thread ran it.
    pub on_table: Option<&'a (dyn Fn(&TableOutcome) + Sync)>,
}

impl<'a> BatchOptions<'a> {
    fn cancelled(&self) -> bool {
        self.cancel
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl Engine {
    /// Process every table and fold the outcomes into a summary.
    pub fn run_batch(
        &self,
        tables: &[TableInput],
        sink: &dyn ArtifactSink,
        opts: BatchOptions<'_>,
    ) -> CoreResult<BatchSummary> {
        let mut seen = BTreeSet::new();
        for t in tables {
            if !seen.insert(t.table_id.as_str()) {
                return Err(CoreError::invalid_argument(format!(
                    "table {} appears more than once in the batch",
                    t.table_id
                )));
            }
        }

        let plan = self.plan(tables.iter().map(|t| t.table_id.as_str()));
        let mut collision_notes = BTreeMap::new();
        for c in &plan.collisions {
            for t in &c.tables {
                collision_notes.insert(
                    t.clone(),
                    format!("name {} is shared with {}", c.name, c.tables.join(", ")),
                );
            }
        }

        let run_one = |t: &TableInput| -> TableOutcome {
            if opts.cancelled() {
                return TableOutcome::Cancelled(t.table_id.clone());
            }
            let outcome =
                TableOutcome::from_result(self.process_table_with(t, sink, &collision_notes));
            match &outcome {
                TableOutcome::Failed(f) => {
                    tracing::warn!(table = %f.table_id, code = f.error.code(), "table failed: {}", f.error)
                }
                TableOutcome::Manual(r) => {
                    tracing::info!(table = %r.table_id, name = %r.resource_name, "manual deployment advised")
                }
                _ => tracing::debug!(table = outcome.table_id(), "table processed"),
            }
            if let Some(cb) = opts.on_table {
                cb(&outcome);
            }
            outcome
        };

        let Some((first, rest)) = tables.split_first() else {
            return Ok(BatchSummary::from_outcomes(Vec::new(), plan.collisions));
        };

        let first_outcome = match run_one(first) {
            TableOutcome::Failed(f) if matches!(f.error, CoreError::TemplateStructure { .. }) => {
                tracing::error!(table = %f.table_id, "template is unusable, aborting batch");
                return Err(f.error);
            }
            other => other,
        };

        #[cfg(feature = "parallel")]
        let rest_outcomes: Vec<TableOutcome> = rest.par_iter().map(run_one).collect();
        #[cfg(not(feature = "parallel"))]
        let rest_outcomes: Vec<TableOutcome> = rest.iter().map(run_one).collect();

        let mut outcomes = Vec::with_capacity(tables.len());
        outcomes.push(first_outcome);
        outcomes.extend(rest_outcomes);

        let summary = BatchSummary::from_outcomes(outcomes, plan.collisions);
        tracing::info!(
            total = summary.counts.total,
            ready = summary.counts.ready,
            manual = summary.counts.manual,
            failed = summary.counts.failed,
            cancelled = summary.counts.cancelled,
            "batch finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, ProvisioningMode};
    use crate::model::ColumnDefinition;
    use crate::pipeline::testing::{template_json, MemorySink};
    use crate::synthesize::Template;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn engine_with(cfg: EngineConfig, template: serde_json::Value) -> Engine {
        Engine::new(cfg, Template::from_value(template, ProvisioningMode::Direct).unwrap()).unwrap()
    }

    fn table(id: &str, n: usize) -> TableInput {
        let columns = (0..n)
            .map(|i| ColumnDefinition::new(format!("Col{i}"), "string"))
            .collect();
        TableInput::new(id, columns)
    }

    #[test]
    fn partial_failures_do_not_stop_the_batch() {
        let engine = engine_with(EngineConfig::default(), template_json());
        let sink = MemorySink::default();
        let tables = vec![table("Syslog", 3), table("Empty", 0), table("SecurityEvent", 5)];

        let s = engine.run_batch(&tables, &sink, BatchOptions::default()).unwrap();
        assert_eq!(s.counts.total, 3);
        assert_eq!(s.counts.ready, 2);
        assert_eq!(s.counts.failed, 1);
        assert_eq!(s.failed[0].table_id, "Empty");
        assert_eq!(s.failed[0].code, "schema.unavailable");
    }

    #[test]
    fn wide_tables_are_routed_to_manual() {
        let mut cfg = EngineConfig::default();
        cfg.risk.column_count_hard_limit = 10;
        let engine = engine_with(cfg, template_json());
        let sink = MemorySink::default();

        let s = engine
            .run_batch(&[table("Syslog", 3), table("WideTable", 11)], &sink, BatchOptions::default())
            .unwrap();
        assert_eq!(s.counts.manual, 1);
        assert_eq!(s.manual[0].table_id, "WideTable");
        assert!(s.manual[0].risk.manual_deployment_advised);
        // Manual tables are still persisted for later deployment.
        assert_eq!(sink.written.lock().unwrap().len(), 2);
    }

    #[test]
    fn bad_template_on_first_table_aborts() {
        let engine = engine_with(EngineConfig::default(), json!({"resources": []}));
        let r = engine.run_batch(
            &[table("Syslog", 1), table("SecurityEvent", 1)],
            &MemorySink::default(),
            BatchOptions::default(),
        );
        assert_matches!(r, Err(CoreError::TemplateStructure { .. }));
    }

    #[test]
    fn template_error_after_first_table_is_recorded_per_table() {
        let engine = engine_with(EngineConfig::default(), json!({"resources": []}));
        let s = engine
            .run_batch(
                &[table("Heartbeat", 0), table("Syslog", 1), table("SecurityEvent", 1)],
                &MemorySink::default(),
                BatchOptions::default(),
            )
            .unwrap();
        let codes: Vec<_> = s.failed.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(
            codes,
            vec!["schema.unavailable", "template.structure", "template.structure"]
        );
        assert_eq!(s.counts.ready, 0);
    }

    #[test]
    fn persistence_failure_is_recorded_and_batch_continues() {
        let engine = engine_with(EngineConfig::default(), template_json());
        let sink = MemorySink {
            fail_latest_for: Some("SecurityEvent".to_string()),
            ..Default::default()
        };
        let s = engine
            .run_batch(
                &[table("Syslog", 1), table("SecurityEvent", 1), table("Heartbeat", 1)],
                &sink,
                BatchOptions::default(),
            )
            .unwrap();
        assert_eq!(s.counts.ready, 2);
        assert_eq!(s.failed[0].code, "persist.fatal");
    }

    #[test]
    fn cancellation_skips_remaining_tables() {
        let engine = engine_with(EngineConfig::default(), template_json());
        let cancel = AtomicBool::new(false);
        let seen = AtomicUsize::new(0);
        let on_table = |_: &TableOutcome| {
            seen.fetch_add(1, Ordering::SeqCst);
            cancel.store(true, Ordering::SeqCst);
        };
        let opts = BatchOptions {
            cancel: Some(&cancel),
            on_table: Some(&on_table),
        };

        let s = engine
            .run_batch(&[table("Syslog", 1), table("Heartbeat", 1)], &MemorySink::default(), opts)
            .unwrap();
        assert_eq!(s.counts.ready, 1);
        assert_eq!(s.cancelled, vec!["Heartbeat"]);
        assert!(!s.is_clean());
    }

    #[test]
    fn duplicate_tables_are_rejected() {
        let engine = engine_with(EngineConfig::default(), template_json());
        let r = engine.run_batch(
            &[table("Syslog", 1), table("Syslog", 2)],
            &MemorySink::default(),
            BatchOptions::default(),
        );
        assert_matches!(r, Err(CoreError::InvalidArgument(_)));
    }

    #[test]
    fn collisions_are_flagged_on_each_table() {
        let mut cfg = EngineConfig::default();
        cfg.naming.max_length = Some(20);
        cfg.naming.abbreviations.clear();
        let engine = engine_with(cfg, template_json());
        let s = engine
            .run_batch(
                &[table("DeviceEvents", 1), table("DeviceFileEvents", 1)],
                &MemorySink::default(),
                BatchOptions::default(),
            )
            .unwrap();
        assert_eq!(s.collisions.len(), 1);
        for r in &s.ready {
            assert!(r.diagnostics.iter().any(|d| d.code == "naming.collision"));
        }
    }
}
