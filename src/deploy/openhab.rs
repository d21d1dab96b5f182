use super::probe::{join_remote, RemoteEnv};
use super::service;
use crate::config::OpenhabFile;
use crate::models::FileMapping;
use crate::ssh_service::{shell_quote, RemoteShell};
use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

const CONFIG_FILE_MODE: &str = "644";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenhabOutcome {
    pub deployed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// `None` when no restart was attempted.
    pub restarted: Option<bool>,
    /// Mapped files found on the server after the run.
    pub present: usize,
}

impl OpenhabOutcome {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.restarted != Some(false)
    }
}

/// Local file → `<conf>/<subdir>/<file>` for every configured file.
pub fn mappings(local_dir: &Path, conf_base: &str, files: &[OpenhabFile]) -> Vec<FileMapping> {
    files
        .iter()
        .map(|f| {
            FileMapping::new(
                local_dir.join(&f.file),
                join_remote(&join_remote(conf_base, &f.subdir), &f.file),
            )
        })
        .collect()
}

/// Copy the mapped files through the staging directory, then restart the
/// openHAB service when at least one file landed.
pub fn deploy<R: RemoteShell>(
    shell: &mut R,
    env: &RemoteEnv,
    files: &[FileMapping],
    service_name: &str,
    restart: bool,
    settle: Duration,
) -> Result<OpenhabOutcome> {
    let mut outcome = OpenhabOutcome::default();

    tracing::info!("Creating remote directories...");
    let dirs: BTreeSet<&str> = files
        .iter()
        .filter_map(|m| m.remote.rsplit_once('/').map(|(dir, _)| dir))
        .filter(|dir| !dir.is_empty())
        .collect();
    for dir in dirs {
        let mkdir = shell.exec(&format!("mkdir -p {}", shell_quote(dir)))?;
        if !mkdir.success() {
            tracing::warn!("Failed to create {}: {}", dir, mkdir.stderr.trim());
        }
    }

    let temp_dir = env.temp_dir();
    let mkdir = shell.exec(&format!("mkdir -p {}", shell_quote(&temp_dir)))?;
    if !mkdir.success() {
        tracing::warn!(
            "Failed to create temp directory {}: {}",
            temp_dir,
            mkdir.stderr.trim()
        );
    }

    tracing::info!("Deploying openHAB configuration files...");
    for mapping in files {
        let name = mapping.file_name();
        if !mapping.local.exists() {
            tracing::warn!("{} not found, skipping...", mapping.local.display());
            outcome.skipped += 1;
            continue;
        }

        tracing::info!("Deploying {} -> {}...", name, mapping.remote);
        let temp_path = join_remote(&temp_dir, &name);
        if let Err(e) = shell.upload(&mapping.local, &temp_path) {
            tracing::error!("SCP failed for {}: {:#}", name, e);
            outcome.failed += 1;
            continue;
        }

        let install = shell.exec(&format!(
            "cp {tmp} {dst} && chmod {mode} {dst} && rm {tmp}",
            tmp = shell_quote(&temp_path),
            dst = shell_quote(&mapping.remote),
            mode = CONFIG_FILE_MODE,
        ))?;
        if install.success() {
            tracing::info!("Successfully deployed {}", name);
            outcome.deployed += 1;
        } else {
            tracing::error!("Failed to deploy {}: {}", name, install.stderr.trim());
            outcome.failed += 1;
        }
    }

    if restart && outcome.deployed > 0 {
        outcome.restarted = Some(service::restart_and_verify(shell, service_name, settle)?);
    } else if restart {
        tracing::info!("No openHAB files deployed, not restarting '{}'", service_name);
    }

    outcome.present = verify(shell, files)?;
    tracing::info!("{} of {} openHAB files present on the server", outcome.present, files.len());
    Ok(outcome)
}

/// Log whether each mapped file exists on the server.
pub fn verify<R: RemoteShell>(shell: &mut R, files: &[FileMapping]) -> Result<usize> {
    let mut present = 0;
    for mapping in files {
        let check = shell.exec(&format!(
            "test -f {} && echo 'EXISTS' || echo 'MISSING'",
            shell_quote(&mapping.remote)
        ))?;
        let state = check.stdout_trimmed();
        if state == "EXISTS" {
            present += 1;
            tracing::debug!("{}: {}", mapping.remote, state);
        } else {
            tracing::warn!("{}: {}", mapping.remote, state);
        }
    }
    Ok(present)
}

/// Copy `openhabian.conf` into the remote home directory. `false` when the
/// file could not be deployed.
pub fn deploy_openhabian_conf<R: RemoteShell>(
    shell: &mut R,
    env: &RemoteEnv,
    local: &Path,
) -> Result<bool> {
    tracing::info!("Deploying openhabian.conf...");
    if !local.exists() {
        tracing::warn!("{} not found, skipping openhabian.conf deployment", local.display());
        return Ok(false);
    }
    let Some(home) = env.home.as_deref() else {
        tracing::warn!("Could not determine remote home directory; skipping openhabian.conf");
        return Ok(false);
    };

    let remote = join_remote(home, "openhabian.conf");
    match shell.upload(local, &remote) {
        Ok(()) => {
            tracing::info!("{} -> {}", local.display(), remote);
            Ok(true)
        }
        Err(e) => {
            tracing::error!("Failed to deploy openhabian.conf: {:#}", e);
            Ok(false)
        }
    }
}
