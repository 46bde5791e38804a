use std::path::PathBuf;

use anyhow::Context;
use arbengine::infrastructure::config::{Config, Credentials};
use arbengine::infrastructure::App;
use clap::Parser;
use tracing::{error, info};

/// Resilient OKX client and multi-strategy trading engine.
#[derive(Debug, Parser)]
#[command(name = "arbengine", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Strategy to start in addition to the persisted active set (repeatable)
    #[arg(long = "start", value_name = "NAME")]
    start: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = if cli.config.exists() {
        Config::load(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        eprintln!("{} not found, using defaults", cli.config.display());
        Config::default()
    };
    config.logging.init().context("failed to initialise logging")?;

    let credentials = Credentials::from_env().context("exchange credentials")?;
    info!(version = env!("CARGO_PKG_VERSION"), "arbengine starting");

    let app = App::build(&config, &credentials).context("failed to build engine")?;
    if let Err(e) = app.run(&config, &cli.start).await {
        error!(error = %e, "Fatal error");
        return Err(e.into());
    }

    info!("arbengine stopped");
    Ok(())
}
