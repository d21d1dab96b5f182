pub mod openhab;
pub mod plan;
pub mod probe;
pub mod receiver;
pub mod service;
pub mod sudo_check;
#[cfg(test)]
pub(crate) mod testing;

use crate::config::{DeployProfile, OpenhabFile};
use crate::models::SshHost;
use crate::ssh_config;
use crate::ssh_service::{RemoteShell, SshSession};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use openhab::OpenhabOutcome;
pub use sudo_check::SudoCheckError;

/// Wait between restarting openHAB and asking systemd for its state.
const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Base for every relative local path, including the key file.
    pub project_root: PathBuf,
    pub ssh_config: PathBuf,
    pub host: String,
    pub config_dir: PathBuf,
    pub remote_dir: String,
    pub openhab_service: String,
    pub openhab_files: Vec<OpenhabFile>,
    pub restart_openhab: bool,
    pub dry_run: bool,
    pub deploy_openhab: bool,
    pub deploy_receiver: bool,
    pub receiver_dir: String,
    pub receiver_service: String,
    pub receiver_binary: PathBuf,
    pub receiver_config: PathBuf,
    pub deploy_receiver_config: bool,
    pub deploy_openhabian_conf: bool,
    pub settle: Duration,
}

impl DeployOptions {
    pub fn from_profile(profile: &DeployProfile, project_root: PathBuf) -> Self {
        Self {
            project_root,
            ssh_config: profile.ssh_config.clone(),
            host: profile.host.clone(),
            config_dir: profile.config_dir.clone(),
            remote_dir: profile.remote_dir.clone(),
            openhab_service: profile.openhab_service.clone(),
            openhab_files: profile.openhab_files.clone(),
            restart_openhab: true,
            dry_run: false,
            deploy_openhab: true,
            deploy_receiver: true,
            receiver_dir: profile.receiver_dir.clone(),
            receiver_service: profile.receiver_service.clone(),
            receiver_binary: profile.receiver_binary.clone(),
            receiver_config: profile.receiver_config.clone(),
            deploy_receiver_config: false,
            deploy_openhabian_conf: false,
            settle: DEFAULT_SETTLE,
        }
    }

    /// Resolve a local path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.project_root.join(path)
    }

    pub fn local_config_dir(&self) -> PathBuf {
        self.resolve(&self.config_dir)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub openhab: Option<OpenhabOutcome>,
    pub openhabian_conf: Option<bool>,
    pub receiver: Option<bool>,
}

impl DeployReport {
    pub fn success(&self) -> bool {
        self.openhab.as_ref().map_or(true, OpenhabOutcome::success)
            && self.openhabian_conf.unwrap_or(true)
            && self.receiver.unwrap_or(true)
    }
}

/// Resolve the host profile and key file. Any failure here is fatal.
pub fn resolve_host(options: &DeployOptions) -> Result<(SshHost, PathBuf)> {
    let config_path = options.resolve(&options.ssh_config);
    let host = ssh_config::load_host(&config_path, &options.host)?;
    let key = ssh_config::resolve_identity_file(&host, &options.project_root)?;
    Ok((host, key))
}

/// Run a deployment. A dry run only prints the plan. `Ok(None)` is returned
/// for dry runs, `Ok(Some(report))` once the pipeline finished.
pub fn run(options: &DeployOptions) -> Result<Option<DeployReport>> {
    let (host, key) = resolve_host(options)?;

    if options.dry_run {
        for line in plan::render(options, &host, &key) {
            println!("{line}");
        }
        return Ok(None);
    }

    tracing::info!("Using SSH host: {}", options.host);
    let mut session = SshSession::new(host.clone(), key);
    session.connect()?;
    let report = deploy_with(&mut session, options, &host);
    session.close();
    report.map(Some)
}

/// The pipeline over an established shell.
pub fn deploy_with<R: RemoteShell>(
    shell: &mut R,
    options: &DeployOptions,
    host: &SshHost,
) -> Result<DeployReport> {
    sudo_check::ensure_restricted_sudo(shell, &host.user)?;
    let env = probe::probe(shell, &options.remote_dir, &options.openhab_service)
        .context("Failed to probe remote environment")?;

    let mut report = DeployReport::default();

    if options.deploy_openhab {
        let files = openhab::mappings(
            &options.local_config_dir(),
            &env.openhab_conf,
            &options.openhab_files,
        );
        report.openhab = Some(openhab::deploy(
            shell,
            &env,
            &files,
            &options.openhab_service,
            options.restart_openhab,
            options.settle,
        )?);
    }

    if options.deploy_openhabian_conf {
        let local = options.local_config_dir().join("openhabian.conf");
        report.openhabian_conf = Some(openhab::deploy_openhabian_conf(shell, &env, &local)?);
    }

    if options.deploy_receiver {
        let plan = receiver::ReceiverPlan {
            binary: options.resolve(&options.receiver_binary),
            config: options
                .deploy_receiver_config
                .then(|| options.resolve(&options.receiver_config)),
            remote_dir: env.expand_home(&options.receiver_dir),
            service: options.receiver_service.clone(),
        };
        report.receiver = Some(receiver::deploy(shell, &plan, options.settle)?);
    }

    match &report.openhab {
        Some(outcome) => tracing::info!(
            "Deployment complete! ({} openHAB files deployed)",
            outcome.deployed
        ),
        None => tracing::info!("Deployment complete!"),
    }
    match report.receiver {
        Some(true) => tracing::info!(
            "Receiver files deployed and service '{}' restarted",
            options.receiver_service
        ),
        Some(false) => tracing::error!("Receiver deployment encountered issues (see output above)"),
        None => {}
    }

    Ok(report)
}
