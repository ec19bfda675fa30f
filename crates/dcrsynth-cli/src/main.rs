use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod cmd;
mod io;
mod output;

fn init_tracing(format: args::LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match format {
        args::LogFormat::Text => builder.init(),
        args::LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = args::Cli::parse();
    output::init(cli.json);
    init_tracing(cli.log_format);

    match cmd::dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!("fatal: {e:?}");
            if output::is_json() {
                let _ = output::print(&serde_json::json!({ "ok": false, "error": format!("{e:#}") }));
            } else {
                output::eprintln_line(&format!("error: {e:#}"));
            }
            ExitCode::FAILURE
        }
    }
}
