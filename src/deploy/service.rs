use crate::ssh_service::{shell_quote, RemoteShell};
use anyhow::Result;
use std::thread;
use std::time::Duration;

/// Restart a systemd unit through the deploy user's sudo rule and check it
/// comes back `active`.
pub fn restart_and_verify<R: RemoteShell>(
    shell: &mut R,
    service: &str,
    settle: Duration,
) -> Result<bool> {
    tracing::info!("Restarting service '{}'...", service);
    let restart = shell.exec(&format!("sudo systemctl restart {}", shell_quote(service)))?;
    if !restart.success() {
        tracing::error!(
            "Failed to restart service '{}': {}. The unit must already exist on the server.",
            service,
            restart.stderr.trim()
        );
        return Ok(false);
    }

    if !settle.is_zero() {
        thread::sleep(settle);
    }

    let status = shell.exec(&format!("systemctl is-active {}", shell_quote(service)))?;
    match status.stdout_trimmed() {
        "active" => {
            tracing::info!("Service '{}' is active", service);
            Ok(true)
        }
        other => {
            tracing::error!("Service '{}' is not active (status: {})", service, other);
            Ok(false)
        }
    }
}
