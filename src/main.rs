use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use labelsleuth::cli::Cli;
use labelsleuth::config::load_settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads SLEUTH_* variables
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "labelsleuth=warn",
        1 => "labelsleuth=debug,info",
        _ => "labelsleuth=trace,debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();

    let mut settings = load_settings().await;
    cli.apply_to_settings(&mut settings);

    labelsleuth::cli::run(cli.command, &settings).await
}
