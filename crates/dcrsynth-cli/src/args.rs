use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use dcrsynth_core::config::ProvisioningMode;

#[derive(Parser, Debug, Clone)]
#[command(name = "dcrsynth", version, about = "Data collection rule template synthesis")]
pub struct Cli {
    /// Emit JSON output on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log format on stderr. Filter with RUST_LOG (default: warn).
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Engine config file (JSON). Flags override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Artifact directory (default: ./artifacts)
    #[arg(long, global = true, default_value = "./artifacts")]
    pub out: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Config overrides shared by the commands that build an engine.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Provisioning mode: direct | with-endpoint
    #[arg(long)]
    pub mode: Option<ProvisioningMode>,

    /// Resource name prefix.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Location; also the name's location suffix.
    #[arg(long)]
    pub location: Option<String>,

    /// Optional trailing name segment.
    #[arg(long)]
    pub suffix: Option<String>,

    /// Override the mode's maximum name length.
    #[arg(long)]
    pub max_length: Option<usize>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Synthesize, assess and persist a rule document for every table.
    Generate {
        /// Schema file path or URL.
        schema: String,

        /// Template file path or URL (default: bundled template for the mode).
        #[arg(long)]
        template: Option<String>,

        /// Only process these tables (repeatable).
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Timestamped versions to keep per table.
        #[arg(long)]
        keep: Option<usize>,

        /// Blank workspace/endpoint references in the output.
        #[arg(long)]
        detached: bool,

        /// Run everything but persist nothing.
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Resolve names for every table in a schema and report collisions.
    Plan {
        /// Schema file path or URL.
        schema: String,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Resolve the resource name for one table.
    Name {
        table: String,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// List stored versions of a table's artifact.
    Versions { table: String },

    /// Delete old timestamped versions, keeping the newest ones.
    Prune {
        /// Tables to prune (repeatable).
        #[arg(required = true)]
        tables: Vec<String>,

        #[arg(long)]
        keep: Option<usize>,
    },

    /// Check config, template and artifact directory.
    Doctor {
        /// Template file path or URL (default: bundled template for the mode).
        #[arg(long)]
        template: Option<String>,

        #[command(flatten)]
        engine: EngineArgs,
    },
}
