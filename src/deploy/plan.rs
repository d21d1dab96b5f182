use super::openhab;
use super::receiver::{RECEIVER_BINARY_NAME, RECEIVER_CONFIG_NAME};
use super::DeployOptions;
use crate::models::{FileMapping, SshHost};
use std::path::Path;

fn transfer_line(local: &Path, remote: &str) -> String {
    if local.exists() {
        format!("  {} -> {}", local.display(), remote)
    } else {
        format!("  {} -> {} (FILE NOT FOUND)", local.display(), remote)
    }
}

pub fn render(options: &DeployOptions, host: &SshHost, key: &Path) -> Vec<String> {
    let mut lines = vec![
        "DRY RUN - No files will be deployed".to_string(),
        String::new(),
        format!("Using SSH host: {}", options.host),
        format!("Would connect to: {} (port {})", host.destination(), host.port()),
        format!("Using key: {}", key.display()),
    ];

    lines.push(String::new());
    if options.deploy_openhab {
        lines.push("Would deploy openHAB config files:".to_string());
        let mappings: Vec<FileMapping> = openhab::mappings(
            &options.local_config_dir(),
            &options.remote_dir,
            &options.openhab_files,
        );
        lines.extend(mappings.iter().map(|m| transfer_line(&m.local, &m.remote)));
        if options.restart_openhab {
            lines.push(format!(
                "Would restart service '{}' if any file is deployed",
                options.openhab_service
            ));
        }
    } else {
        lines.push("Skipping openHAB config deployment (receiver-only mode).".to_string());
    }

    if options.deploy_openhabian_conf {
        lines.push(String::new());
        lines.push("Would deploy openhabian.conf:".to_string());
        lines.push(transfer_line(
            &options.local_config_dir().join("openhabian.conf"),
            "$HOME/openhabian.conf",
        ));
    }

    if options.deploy_receiver {
        let dir = options.receiver_dir.trim_end_matches('/');
        lines.push(String::new());
        lines.push("Would deploy receiver application files:".to_string());
        lines.push(transfer_line(
            &options.resolve(&options.receiver_binary),
            &format!("{dir}/{RECEIVER_BINARY_NAME}"),
        ));
        if options.deploy_receiver_config {
            lines.push(transfer_line(
                &options.resolve(&options.receiver_config),
                &format!("{dir}/{RECEIVER_CONFIG_NAME}"),
            ));
        }
        lines.push(format!(
            "Would restart existing systemd service '{}.service' (it must already exist on the server)",
            options.receiver_service
        ));
    }

    lines
}
