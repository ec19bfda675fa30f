//! Per-table generation pipeline.
//!
//! Every table runs the same fixed sequence:
//! - normalize the raw schema
//! - resolve the resource name
//! - synthesize the document from the shared template
//! - assess deployment risk (exactly once, before anything is persisted)
//! - persist through an [`ArtifactSink`] and prune old versions
//!
//! This module defines:
//! - `PipelineContext` (diagnostics collected while a table is processed)
//! - `Engine` (validated config + immutable template)
//! - `TableReport` / `TableFailure` (the per-table result value)
//!
//! The batch loop lives in [`batch`].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{validate_config, EngineConfig};
use crate::errors::{CoreError, CoreResult};
use crate::model::{ColumnDefinition, PersistedArtifact, ResourceName, RiskAssessment};
use crate::naming::{detect_collisions, resolve_name, NameCollision, NameRequest};
use crate::normalize::normalize;
use crate::risk::assess;
use crate::sink::ArtifactSink;
use crate::synthesize::{synthesize, SynthesisOptions, SynthesisRequest, Template};

pub mod batch;

/// A structured diagnostic emitted while processing a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineDiagnostic {
    pub level: DiagnosticLevel,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// Diagnostics sink shared by the stages of one table.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub diagnostics: Vec<PipelineDiagnostic>,
}

impl PipelineContext {
    pub fn push_info(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.push(DiagnosticLevel::Info, code, message);
    }

    pub fn push_warning(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.push(DiagnosticLevel::Warning, code, message);
    }

    pub fn push_error(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.push(DiagnosticLevel::Error, code, message);
    }

    fn push(&mut self, level: DiagnosticLevel, code: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(PipelineDiagnostic {
            level,
            code: code.into(),
            message: message.into(),
        });
    }

    pub fn warnings(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .count()
    }
}

/// One table to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInput {
    pub table_id: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableInput {
    pub fn new(table_id: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            table_id: table_id.into(),
            columns,
        }
    }
}

/// Successful run for one table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReport {
    pub table_id: String,
    pub resource_name: ResourceName,
    pub stream_input_name: String,
    pub stream_output_name: String,
    pub risk: RiskAssessment,
    pub persisted: PersistedArtifact,
    pub dropped_columns: Vec<String>,
    pub diagnostics: Vec<PipelineDiagnostic>,
}

/// Failed run for one table.
#[derive(Debug)]
pub struct TableFailure {
    pub table_id: String,
    pub error: CoreError,
    pub diagnostics: Vec<PipelineDiagnostic>,
}

/// Name resolution result for one table, without synthesis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub table_id: String,
    pub resource_name: Option<ResourceName>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    pub collisions: Vec<NameCollision>,
}

/// Validated configuration plus the shared, read-only template.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    template: Template,
    synthesis: SynthesisOptions,
}

impl Engine {
    pub fn new(config: EngineConfig, template: Template) -> CoreResult<Self> {
        validate_config(&config)?;
        let synthesis = SynthesisOptions {
            parameters: config.template.parameters.clone(),
            detached: config.template.detached,
            custom_table_output: config.template.custom_table_output,
        };
        Ok(Self {
            config,
            template,
            synthesis,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn resolve_name(&self, table_id: &str) -> CoreResult<ResourceName> {
        resolve_name(
            &NameRequest::from_config(&self.config, table_id),
            &self.config.naming.abbreviations,
        )
    }

    /// Resolve every name and report collisions. No synthesis, no I/O.
    pub fn plan<'a, I>(&self, table_ids: I) -> Plan
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entries: Vec<PlanEntry> = table_ids
            .into_iter()
            .map(|t| match self.resolve_name(t) {
                Ok(name) => PlanEntry {
                    table_id: t.to_string(),
                    resource_name: Some(name),
                    error: None,
                },
                Err(e) => PlanEntry {
                    table_id: t.to_string(),
                    resource_name: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        let collisions = detect_collisions(
            entries
                .iter()
                .filter_map(|e| e.resource_name.as_ref().map(|n| (e.table_id.as_str(), n))),
        );

        Plan {
            entries,
            collisions,
        }
    }

    /// Run the full pipeline for one table.
    pub fn process_table(
        &self,
        input: &TableInput,
        sink: &dyn ArtifactSink,
    ) -> Result<TableReport, TableFailure> {
        self.process_table_with(input, sink, &BTreeMap::new())
    }

    pub(crate) fn process_table_with(
        &self,
        input: &TableInput,
        sink: &dyn ArtifactSink,
        collisions: &BTreeMap<String, String>,
    ) -> Result<TableReport, TableFailure> {
        let mut ctx = PipelineContext::default();
        if let Some(note) = collisions.get(&input.table_id) {
            ctx.push_warning("naming.collision", note.clone());
        }

        match self.run_stages(input, sink, &mut ctx) {
            Ok(report) => Ok(report),
            Err(error) => {
                ctx.push_error(error.code(), error.to_string());
                Err(TableFailure {
                    table_id: input.table_id.clone(),
                    error,
                    diagnostics: ctx.diagnostics,
                })
            }
        }
    }

    fn run_stages(
        &self,
        input: &TableInput,
        sink: &dyn ArtifactSink,
        ctx: &mut PipelineContext,
    ) -> CoreResult<TableReport> {
        let table_id = input.table_id.as_str();
        let cfg = &self.config;

        let schema = normalize(&input.columns, &cfg.normalization.exclude_columns);
        for w in &schema.warnings {
            ctx.push_warning(
                "normalize.column",
                format!("{} ({}): {}", w.column, w.source_type, w.message),
            );
        }
        if schema.is_empty() {
            return Err(CoreError::SchemaUnavailable {
                table: table_id.to_string(),
            });
        }
        ctx.push_info(
            "normalize.done",
            format!(
                "{} column(s) kept, {} dropped",
                schema.columns.len(),
                schema.dropped.len()
            ),
        );

        let name = self.resolve_name(table_id)?;

        let req = SynthesisRequest {
            table_id,
            resource_name: &name,
            columns: &schema.columns,
            location: &cfg.naming.location,
        };
        let artifact = synthesize(&self.template, &req, &self.synthesis, ctx)?;

        let risk = assess(&artifact, &cfg.risk);
        for w in &risk.warnings {
            ctx.push_warning("risk.advisory", w.clone());
        }
        if let Some(reason) = &risk.reason {
            ctx.push_warning("risk.manual", reason.clone());
        }

        let persisted = sink.persist(table_id, &artifact.raw_document)?;
        for w in &persisted.warnings {
            ctx.push_warning("persist.timestamped", w.clone());
        }

        match sink.prune(table_id, cfg.retention.keep) {
            Ok(0) => {}
            Ok(n) => ctx.push_info("persist.pruned", format!("pruned {n} old version(s)")),
            Err(e) => ctx.push_warning("persist.prune_failed", e.to_string()),
        }

        Ok(TableReport {
            table_id: table_id.to_string(),
            resource_name: artifact.resource_name,
            stream_input_name: artifact.stream_input_name,
            stream_output_name: artifact.stream_output_name,
            risk,
            persisted,
            dropped_columns: schema.dropped,
            diagnostics: std::mem::take(&mut ctx.diagnostics),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{template_json, MemorySink};
    use super::*;
    use crate::config::ProvisioningMode;
    use assert_matches::assert_matches;

    fn engine() -> Engine {
        let t = Template::from_value(template_json(), ProvisioningMode::Direct).unwrap();
        Engine::new(EngineConfig::default(), t).unwrap()
    }

    #[test]
    fn processes_a_table_end_to_end() {
        let sink = MemorySink::default();
        let input = TableInput::new(
            "Syslog",
            vec![
                ColumnDefinition::new("TimeGenerated", "datetime"),
                ColumnDefinition::new("TenantId", "string"),
                ColumnDefinition::new("Duration", "timespan"),
            ],
        );

        let report = engine().process_table(&input, &sink).unwrap();
        assert_eq!(report.resource_name.as_str(), "dcr-Syslog-eastus");
        assert_eq!(report.stream_input_name, "Custom-Syslog");
        assert!(report.risk.should_deploy);
        assert_eq!(report.risk.column_count, 2);
        assert_eq!(report.dropped_columns, vec!["TenantId"]);
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.code == "normalize.column" && d.level == DiagnosticLevel::Warning));
        assert_eq!(sink.written.lock().unwrap().as_slice(), ["Syslog"]);
    }

    #[test]
    fn empty_schema_is_unavailable_and_not_persisted() {
        let sink = MemorySink::default();
        let failure = engine()
            .process_table(&TableInput::new("Syslog", vec![]), &sink)
            .unwrap_err();
        assert_matches!(failure.error, CoreError::SchemaUnavailable { .. });
        assert!(sink.written.lock().unwrap().is_empty());
        assert_eq!(
            failure.diagnostics.last().map(|d| d.level),
            Some(DiagnosticLevel::Error)
        );
    }

    #[test]
    fn latest_write_failure_is_fatal_for_the_table() {
        let sink = MemorySink {
            fail_latest_for: Some("Syslog".to_string()),
            ..Default::default()
        };
        let input = TableInput::new("Syslog", vec![ColumnDefinition::new("Message", "string")]);
        let failure = engine().process_table(&input, &sink).unwrap_err();
        assert_matches!(failure.error, CoreError::PersistenceFatal { .. });
    }

    #[test]
    fn plan_reports_collisions() {
        let mut cfg = EngineConfig::default();
        cfg.naming.max_length = Some(20);
        cfg.naming.abbreviations.clear();
        let t = Template::from_value(template_json(), ProvisioningMode::Direct).unwrap();
        let engine = Engine::new(cfg, t).unwrap();

        let plan = engine.plan(["DeviceEvents", "DeviceFileEvents", "Syslog"]);
        assert_eq!(plan.entries.len(), 3);
        assert_eq!(plan.collisions.len(), 1);
        assert_eq!(plan.collisions[0].tables, vec!["DeviceEvents", "DeviceFileEvents"]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.risk.column_count_hard_limit = 0;
        let t = Template::from_value(template_json(), ProvisioningMode::Direct).unwrap();
        assert!(Engine::new(cfg, t).is_err());
    }
}
