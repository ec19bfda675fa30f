use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};

use dcrsynth_core::config::EngineConfig;
use dcrsynth_core::pipeline::Engine;
use dcrsynth_store::{ArtifactStore, StoreConfig};

use crate::args::{Cli, Command, EngineArgs};
use crate::io::input;

mod doctor;
mod generate;
mod name;
mod plan;
mod prune;
mod versions;

/// Global flags every command sees.
#[derive(Debug, Clone)]
pub struct Global {
    pub config: Option<PathBuf>,
    pub out: PathBuf,
}

impl Global {
    pub fn load_config(&self, overrides: &EngineArgs) -> Result<EngineConfig> {
        input::load_config(self.config.as_deref(), overrides)
    }

    /// Config, then template, then engine. Failures here end the run.
    pub async fn engine(&self, cfg: EngineConfig, template: Option<&str>) -> Result<Engine> {
        let template = input::load_template(template, cfg.template.mode).await?;
        Engine::new(cfg, template).context("invalid configuration")
    }

    pub fn open_store(&self) -> Result<ArtifactStore> {
        let cfg = StoreConfig::local(&self.out)?;
        ArtifactStore::open(cfg)
            .with_context(|| format!("opening artifact directory {}", self.out.display()))
    }
}

pub async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let g = Global {
        config: cli.config,
        out: cli.out,
    };
    match cli.command {
        Command::Generate {
            schema,
            template,
            tables,
            keep,
            detached,
            dry_run,
            engine,
        } => {
            let opts = generate::Options {
                schema,
                template,
                tables,
                keep,
                detached,
                dry_run,
                engine,
            };
            generate::run(&g, opts).await
        }
        Command::Plan { schema, engine } => plan::run(&g, &schema, &engine).await,
        Command::Name { table, engine } => name::run(&g, &table, &engine),
        Command::Versions { table } => versions::run(&g, &table),
        Command::Prune { tables, keep } => prune::run(&g, &tables, keep),
        Command::Doctor { template, engine } => doctor::run(&g, template.as_deref(), &engine).await,
    }
}
