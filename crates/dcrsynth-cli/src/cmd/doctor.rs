use std::fs;
use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;

use dcrsynth_core::config::validate_config;
use dcrsynth_core::model::ColumnDefinition;
use dcrsynth_core::pipeline::TableInput;
use dcrsynth_core::sink::DiscardSink;

use super::Global;
use crate::args::EngineArgs;
use crate::output::{self, Tone};

const PROBE_TABLE: &str = "DoctorProbe_CL";
const PROBE_FILE: &str = ".dcrsynth-doctor";

#[derive(Debug, Serialize)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn new(name: &str, result: Result<String>) -> Self {
        match result {
            Ok(detail) => Self {
                name: name.to_string(),
                ok: true,
                detail,
            },
            Err(e) => Self {
                name: name.to_string(),
                ok: false,
                detail: format!("{e:#}"),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorOut {
    pub ok: bool,
    pub checks: Vec<Check>,
}

pub async fn run(g: &Global, template: Option<&str>, overrides: &EngineArgs) -> Result<ExitCode> {
    let mut checks = Vec::new();

    let cfg = g.load_config(overrides).and_then(|c| {
        validate_config(&c)?;
        Ok(c)
    });
    checks.push(Check::new(
        "config",
        cfg.as_ref()
            .map(|c| {
                format!(
                    "mode {}, max name length {}, keep {}",
                    c.template.mode,
                    c.max_name_length(),
                    c.retention.keep
                )
            })
            .map_err(|e| anyhow::anyhow!("{e:#}")),
    ));

    if let Ok(cfg) = cfg {
        let probe = async {
            let engine = g.engine(cfg, template).await?;
            let input = TableInput::new(
                PROBE_TABLE,
                vec![
                    ColumnDefinition::new("TimeGenerated", "datetime"),
                    ColumnDefinition::new("Message", "string"),
                ],
            );
            let report = engine
                .process_table(&input, &DiscardSink)
                .map_err(|f| anyhow::anyhow!("{} [{}]", f.error, f.error.code()))?;
            Ok::<_, anyhow::Error>(format!(
                "synthesized probe table as {} ({} bytes)",
                report.resource_name, report.risk.size_bytes
            ))
        };
        checks.push(Check::new("template", probe.await));
    }

    checks.push(Check::new("artifact_dir", check_artifact_dir(g)));

    let ok = checks.iter().all(|c| c.ok);
    if output::is_json() {
        output::print(&DoctorOut { ok, checks })?;
    } else {
        let mut out = output::stdout();
        for c in &checks {
            let (tone, label) = if c.ok { (Tone::Ok, "ok  ") } else { (Tone::Fail, "FAIL") };
            output::line(&mut out, tone, label, &format!("{}: {}", c.name, c.detail))?;
        }
    }
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn check_artifact_dir(g: &Global) -> Result<String> {
    let store = g.open_store()?;
    let probe = store.root().join(PROBE_FILE);
    fs::write(&probe, b"ok")?;
    fs::remove_file(&probe)?;
    Ok(format!("{} is writable", store.root().display()))
}
