use std::collections::BTreeMap;
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;

use super::Global;
use crate::args::EngineArgs;
use crate::output;

#[derive(Debug, Serialize)]
struct PruneOut {
    keep: usize,
    removed: BTreeMap<String, usize>,
}

pub fn run(g: &Global, tables: &[String], keep: Option<usize>) -> Result<ExitCode> {
    let keep = match keep {
        Some(k) => k,
        None => g.load_config(&EngineArgs::default())?.retention.keep,
    };
    let store = g.open_store()?;

    let mut removed = BTreeMap::new();
    for table in tables {
        let n = store
            .prune(table, keep)
            .with_context(|| format!("pruning {table}"))?;
        removed.insert(table.clone(), n);
    }

    if output::is_json() {
        output::print(&PruneOut { keep, removed })?;
    } else {
        for (table, n) in &removed {
            println!("{table}: removed {n} version(s), kept up to {keep}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
