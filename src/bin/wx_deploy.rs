use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use wxstation::config::ConfigManager;
use wxstation::deploy::{self, DeployOptions};
use wxstation::logging;

/// Deploy openHAB configuration and the weather station receiver to the
/// home server over SSH.
#[derive(Debug, Parser)]
#[command(name = "wx-deploy", version, about)]
struct Cli {
    /// Base directory for relative paths
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Deploy profile (TOML); defaults to <config dir>/wxstation/deploy.toml
    #[arg(long)]
    profile: Option<PathBuf>,

    /// SSH config file containing the host entry
    #[arg(long)]
    ssh_config: Option<PathBuf>,

    /// Host alias in the SSH config
    #[arg(long)]
    host: Option<String>,

    /// Local directory holding the openHAB files
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// openHAB configuration directory used when OPENHAB_CONF is unset
    #[arg(long)]
    remote_dir: Option<String>,

    /// Do not restart openHAB after copying files
    #[arg(long)]
    no_restart: bool,

    /// Print what would be deployed without connecting
    #[arg(long)]
    dry_run: bool,

    /// Skip the receiver binary and service
    #[arg(long)]
    skip_receiver: bool,

    /// Skip the openHAB files (receiver only)
    #[arg(long)]
    skip_openhab: bool,

    /// Remote directory for the receiver (~ expands to the remote home)
    #[arg(long)]
    receiver_dir: Option<String>,

    /// systemd unit running the receiver
    #[arg(long = "receiver-service-name")]
    receiver_service: Option<String>,

    /// Local receiver binary to upload
    #[arg(long = "receiver-bin")]
    receiver_binary: Option<PathBuf>,

    /// Local receiver config.json
    #[arg(long = "receiver-config-file")]
    receiver_config: Option<PathBuf>,

    /// Also upload the receiver config.json
    #[arg(long)]
    with_receiver_config: bool,

    /// Also upload openhabian.conf to the remote home directory
    #[arg(long)]
    openhabian_conf: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

impl Cli {
    fn options(&self) -> Result<DeployOptions> {
        let manager = match &self.profile {
            Some(path) => ConfigManager::with_profile(path),
            None => ConfigManager::new()?,
        };
        tracing::debug!("Deploy profile: {}", manager.profile_path().display());
        let profile = manager.load_profile()?;

        let mut options = DeployOptions::from_profile(&profile, self.project_root.clone());
        if let Some(path) = &self.ssh_config {
            options.ssh_config = path.clone();
        }
        if let Some(host) = &self.host {
            options.host = host.clone();
        }
        if let Some(dir) = &self.config_dir {
            options.config_dir = dir.clone();
        }
        if let Some(dir) = &self.remote_dir {
            options.remote_dir = dir.clone();
        }
        if let Some(dir) = &self.receiver_dir {
            options.receiver_dir = dir.clone();
        }
        if let Some(service) = &self.receiver_service {
            options.receiver_service = service.clone();
        }
        if let Some(path) = &self.receiver_binary {
            options.receiver_binary = path.clone();
        }
        if let Some(path) = &self.receiver_config {
            options.receiver_config = path.clone();
        }
        options.restart_openhab = !self.no_restart;
        options.dry_run = self.dry_run;
        options.deploy_openhab = !self.skip_openhab;
        options.deploy_receiver = !self.skip_receiver;
        options.deploy_receiver_config = self.with_receiver_config;
        options.deploy_openhabian_conf = self.openhabian_conf;
        Ok(options)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init("wx-deploy", &cli.log_dir, cli.verbose) {
        eprintln!("Error: {e:#}");
        return ExitCode::from(1);
    }

    let options = match cli.options() {
        Ok(options) => options,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(1);
        }
    };

    match deploy::run(&options) {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(report)) if report.success() => ExitCode::SUCCESS,
        Ok(Some(_)) => {
            info!("Deployment finished with failures");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}
