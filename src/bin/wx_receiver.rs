use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use wxstation::logging;
use wxstation::receiver::{self, ReceiverConfig};

/// Bridge nRF24L01 weather station packets to openHAB.
#[derive(Debug, Parser)]
#[command(name = "wx-receiver", version, about)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init("wx-receiver", &cli.log_dir, cli.verbose) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    let config = match ReceiverConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match receiver::serve(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
