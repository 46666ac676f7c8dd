use anyhow::Result;
use clap::Parser;
use shoptrace_common::observability::init_logging;
use shoptrace_config::{TraceConfig, TraceConfigLoader, default_config_path};
use shoptrace_runtime::TraceRuntime;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cli::Cli;
use session::{Session, log_config};

mod cli;
mod session;

fn load_config(cli: &Cli) -> Result<TraceConfig> {
    let loader = match (&cli.config, default_config_path()) {
        (Some(path), _) => TraceConfigLoader::new().with_file(path),
        (None, Some(path)) => TraceConfigLoader::new().with_optional_file(path),
        (None, None) => TraceConfigLoader::new(),
    };
    let mut cfg = loader.load()?;
    cli.apply_overrides(&mut cfg);
    Ok(cfg)
}

async fn run(cli: &Cli, cfg: &TraceConfig, shutdown: &CancellationToken) -> Result<Value> {
    let session = Session::open(cfg, &cli.url, shutdown).await?;
    let result = session.run(&cli.command).await;
    if let Err(e) = session.close().await {
        error!(error = %e, "failed to close browser session");
    }
    result
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Flags beat env, env beats the file.
    let cfg = load_config(&cli)?;
    let log_path = init_logging(log_config(&cfg.logging))?;

    let runtime = TraceRuntime::build("shoptrace", None)?;
    let shutdown = runtime.cancellation();
    info!(log = %log_path.display(), url = %cli.url, command = ?cli.command, "starting");

    let output = runtime.run_until_ctrl_c(run(&cli, &cfg, &shutdown));
    runtime.shutdown(Duration::from_secs(1));

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}
