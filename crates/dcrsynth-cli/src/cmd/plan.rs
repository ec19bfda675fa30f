use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;

use dcrsynth_core::pipeline::Plan;

use super::Global;
use crate::args::EngineArgs;
use crate::io::input;
use crate::output::{self, Tone};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanOut {
    mode: String,
    max_length: usize,
    #[serde(flatten)]
    plan: Plan,
}

pub async fn run(g: &Global, schema: &str, overrides: &EngineArgs) -> Result<ExitCode> {
    let cfg = g.load_config(overrides)?;
    let engine = g.engine(cfg, None).await?;
    let tables = input::load_schema(schema).await?;

    let plan = engine.plan(tables.iter().map(|t| t.table_id.as_str()));
    let ok = plan.collisions.is_empty() && plan.entries.iter().all(|e| e.error.is_none());

    if output::is_json() {
        output::print(&PlanOut {
            mode: engine.config().template.mode.to_string(),
            max_length: engine.config().max_name_length(),
            plan,
        })?;
    } else {
        let mut out = output::stdout();
        for e in &plan.entries {
            match (&e.resource_name, &e.error) {
                (Some(name), _) => output::line(
                    &mut out,
                    Tone::Ok,
                    &e.table_id,
                    &format!("{name} ({} chars)", name.len()),
                )?,
                (None, err) => output::line(
                    &mut out,
                    Tone::Fail,
                    &e.table_id,
                    err.as_deref().unwrap_or("unresolved"),
                )?,
            }
        }
        for c in &plan.collisions {
            output::line(
                &mut out,
                Tone::Warn,
                "collision",
                &format!("{} shared by {}", c.name, c.tables.join(", ")),
            )?;
        }
    }
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(2) })
}
