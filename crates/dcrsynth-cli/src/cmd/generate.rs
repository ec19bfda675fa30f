use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use dcrsynth_core::model::Complexity;
use dcrsynth_core::pipeline::batch::{BatchOptions, BatchSummary, TableOutcome};
use dcrsynth_core::sink::{ArtifactSink, DiscardSink};

use super::Global;
use crate::args::EngineArgs;
use crate::io::input;
use crate::output::{self, Tone};

pub const MANUAL_DEPLOYMENT_FILE: &str = "manual-deployment.json";

pub struct Options {
    pub schema: String,
    pub template: Option<String>,
    pub tables: Vec<String>,
    pub keep: Option<usize>,
    pub detached: bool,
    pub dry_run: bool,
    pub engine: EngineArgs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManualEntry {
    table_id: String,
    resource_name: String,
    column_count: usize,
    size_bytes: u64,
    complexity: Complexity,
    reason: Option<String>,
    artifact: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManualDeployment {
    run_id: String,
    generated_at: String,
    tables: Vec<ManualEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateOut {
    run_id: String,
    mode: String,
    out_dir: String,
    dry_run: bool,
    manual_list: Option<String>,
    summary: BatchSummary,
}

fn manual_list(run_id: &str, summary: &BatchSummary) -> Result<ManualDeployment> {
    Ok(ManualDeployment {
        run_id: run_id.to_string(),
        generated_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
        tables: summary
            .manual
            .iter()
            .map(|r| ManualEntry {
                table_id: r.table_id.clone(),
                resource_name: r.resource_name.to_string(),
                column_count: r.risk.column_count,
                size_bytes: r.risk.size_bytes,
                complexity: r.risk.complexity,
                reason: r.risk.reason.clone(),
                artifact: r.persisted.latest.path.display().to_string(),
            })
            .collect(),
    })
}

pub async fn run(g: &Global, opts: Options) -> Result<ExitCode> {
    let mut cfg = g.load_config(&opts.engine)?;
    if let Some(keep) = opts.keep {
        cfg.retention.keep = keep;
    }
    if opts.detached {
        cfg.template.detached = true;
    }
    let mode = cfg.template.mode;
    let engine = g.engine(cfg, opts.template.as_deref()).await?;

    let mut tables = input::load_schema(&opts.schema).await?;
    if !opts.tables.is_empty() {
        for wanted in &opts.tables {
            if !tables.iter().any(|t| &t.table_id == wanted) {
                return Err(anyhow!("table {wanted} is not in schema {}", opts.schema));
            }
        }
        tables.retain(|t| opts.tables.contains(&t.table_id));
    }

    let store = if opts.dry_run {
        None
    } else {
        Some(Arc::new(g.open_store()?))
    };
    let sink: Arc<dyn ArtifactSink> = match &store {
        Some(s) => s.clone(),
        None => Arc::new(DiscardSink),
    };

    let run_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(run_id = %run_id, tables = tables.len(), mode = %mode, "generation started");

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing the current table(s)");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let pb = if output::is_json() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(tables.len() as u64);
        pb.set_style(ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")?);
        pb
    };

    let summary = {
        let pb = pb.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let on_table = |o: &TableOutcome| {
                pb.inc(1);
                pb.set_message(o.table_id().to_string());
            };
            let batch_opts = BatchOptions {
                cancel: Some(cancel.as_ref()),
                on_table: Some(&on_table),
            };
            engine.run_batch(&tables, sink.as_ref(), batch_opts)
        })
        .await
        .context("batch worker stopped unexpectedly")?
        .context("generation aborted")?
    };
    pb.finish_and_clear();

    let manual_path = match &store {
        Some(store) => {
            let list = manual_list(&run_id, &summary)?;
            let path = store.write_report(MANUAL_DEPLOYMENT_FILE, &list)?;
            Some(path.display().to_string())
        }
        None => None,
    };

    let code = if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    };

    if output::is_json() {
        output::print(&GenerateOut {
            run_id,
            mode: mode.to_string(),
            out_dir: g.out.display().to_string(),
            dry_run: opts.dry_run,
            manual_list: manual_path,
            summary,
        })?;
    } else {
        print_summary(&summary, manual_path.as_deref())?;
    }
    Ok(code)
}

fn print_summary(s: &BatchSummary, manual_path: Option<&str>) -> Result<()> {
    let mut out = output::stdout();
    for r in &s.ready {
        output::line(
            &mut out,
            Tone::Ok,
            "ready ",
            &format!(
                "{} -> {} ({} columns, {})",
                r.table_id, r.resource_name, r.risk.column_count, r.risk.complexity
            ),
        )?;
    }
    for r in &s.manual {
        output::line(
            &mut out,
            Tone::Warn,
            "manual",
            &format!(
                "{} -> {}: {}",
                r.table_id,
                r.resource_name,
                r.risk.reason.as_deref().unwrap_or("manual deployment advised")
            ),
        )?;
    }
    for f in &s.failed {
        output::line(
            &mut out,
            Tone::Fail,
            "failed",
            &format!("{} [{}]: {}", f.table_id, f.code, f.reason),
        )?;
    }
    for t in &s.cancelled {
        output::line(&mut out, Tone::Warn, "cancelled", t)?;
    }
    for c in &s.collisions {
        output::line(
            &mut out,
            Tone::Warn,
            "collision",
            &format!("{} shared by {}", c.name, c.tables.join(", ")),
        )?;
    }
    let c = &s.counts;
    output::line(
        &mut out,
        Tone::Plain,
        "summary:",
        &format!(
            "{} table(s): {} ready, {} manual, {} failed, {} cancelled",
            c.total, c.ready, c.manual, c.failed, c.cancelled
        ),
    )?;
    if let Some(p) = manual_path {
        if c.manual > 0 {
            output::line(&mut out, Tone::Plain, "manual deployment list:", p)?;
        }
    }
    Ok(())
}
