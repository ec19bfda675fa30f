use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;

use dcrsynth_core::model::ArtifactVersion;

use super::Global;
use crate::output::{self, Tone};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionsOut {
    table_id: String,
    versions: Vec<ArtifactVersion>,
}

pub fn run(g: &Global, table: &str) -> Result<ExitCode> {
    let store = g.open_store()?;
    let versions = store.list_versions(table)?;

    if output::is_json() {
        output::print(&VersionsOut {
            table_id: table.to_string(),
            versions,
        })?;
        return Ok(ExitCode::SUCCESS);
    }

    if versions.is_empty() {
        output::eprintln_line(&format!("no stored versions for {table}"));
        return Ok(ExitCode::SUCCESS);
    }
    let mut out = output::stdout();
    for v in &versions {
        let tone = if v.is_latest { Tone::Ok } else { Tone::Plain };
        output::line(
            &mut out,
            tone,
            &v.timestamp,
            &format!("{} ({} bytes)", v.path.display(), v.size_bytes),
        )?;
    }
    Ok(ExitCode::SUCCESS)
}
