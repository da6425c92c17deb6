use clap::Parser;
use dipa::normalize::{cli::Args, run_workflow};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug)?;
    run_workflow(args)
}

fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let level = if debug { "debug" } else { "info" };

    let filter = tracing_subscriber::EnvFilter::try_from_env("DIPA_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
