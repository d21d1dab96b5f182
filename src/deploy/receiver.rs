use super::probe::join_remote;
use super::service;
use crate::ssh_service::{shell_path, RemoteShell};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const RECEIVER_BINARY_NAME: &str = "wx-receiver";
pub const RECEIVER_CONFIG_NAME: &str = "config.json";

#[derive(Debug, Clone)]
pub struct ReceiverPlan {
    pub binary: PathBuf,
    /// Deployed only when set.
    pub config: Option<PathBuf>,
    /// `~`-expanded when the remote home is known.
    pub remote_dir: String,
    pub service: String,
}

impl ReceiverPlan {
    /// `(local, remote name, mode)` for every file to install.
    pub fn files(&self) -> Vec<(&Path, &'static str, &'static str)> {
        let mut files = vec![(self.binary.as_path(), RECEIVER_BINARY_NAME, "755")];
        if let Some(config) = &self.config {
            files.push((config.as_path(), RECEIVER_CONFIG_NAME, "644"));
        }
        files
    }
}

/// Install the receiver files and restart its existing service. Returns
/// `false` on any failure; the unit itself is never created or modified.
pub fn deploy<R: RemoteShell>(shell: &mut R, plan: &ReceiverPlan, settle: Duration) -> Result<bool> {
    let files = plan.files();
    let missing: Vec<String> = files
        .iter()
        .filter(|(local, _, _)| !local.exists())
        .map(|(local, _, _)| local.display().to_string())
        .collect();
    if !missing.is_empty() {
        tracing::error!(
            "Receiver deployment skipped: missing local files: {}",
            missing.join(", ")
        );
        return Ok(false);
    }

    tracing::info!("Deploying receiver application files...");
    let mkdir = shell.exec(&format!("mkdir -p {}", shell_path(&plan.remote_dir)))?;
    if !mkdir.success() {
        tracing::error!(
            "Failed to create receiver directory {}: {}",
            plan.remote_dir,
            mkdir.stderr.trim()
        );
        return Ok(false);
    }

    for (local, name, mode) in files {
        let remote = join_remote(&plan.remote_dir, name);
        // Upload beside the target and rename, so a running binary is replaced
        // instead of written into.
        let staged = join_remote(&plan.remote_dir, &format!(".{name}.tmp"));
        tracing::info!("Deploying {} -> {}...", local.display(), remote);

        if let Err(e) = shell.upload(local, &staged) {
            tracing::error!("SCP failed for {}: {:#}", name, e);
            return Ok(false);
        }
        let install = shell.exec(&format!(
            "chmod {mode} {tmp} && mv -f {tmp} {dst}",
            tmp = shell_path(&staged),
            dst = shell_path(&remote),
        ))?;
        if !install.success() {
            tracing::error!("Failed to install {}: {}", name, install.stderr.trim());
            return Ok(false);
        }
        tracing::info!("Successfully deployed {}", name);
    }

    service::restart_and_verify(shell, &plan.service, settle)
}
