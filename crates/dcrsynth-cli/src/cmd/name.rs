use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;

use dcrsynth_core::config::validate_config;
use dcrsynth_core::model::ResourceName;
use dcrsynth_core::naming::{resolve_name, NameRequest};

use super::Global;
use crate::args::EngineArgs;
use crate::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NameOut {
    table_id: String,
    resource_name: ResourceName,
    length: usize,
    max_length: usize,
}

pub fn run(g: &Global, table: &str, overrides: &EngineArgs) -> Result<ExitCode> {
    let cfg = g.load_config(overrides)?;
    validate_config(&cfg).context("invalid configuration")?;

    let req = NameRequest::from_config(&cfg, table);
    let name = resolve_name(&req, &cfg.naming.abbreviations)
        .with_context(|| format!("resolving name for {table}"))?;

    if output::is_json() {
        output::print(&NameOut {
            table_id: table.to_string(),
            length: name.len(),
            max_length: req.max_length,
            resource_name: name,
        })?;
    } else {
        println!("{name}");
    }
    Ok(ExitCode::SUCCESS)
}
