use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, fmt::writer::MakeWriterExt, EnvFilter};

/// Install the global subscriber for one of the binaries.
///
/// Events go to stdout and to `<log_dir>/<tool>_<timestamp>.log`. `RUST_LOG`
/// still applies on top of the crate directive.
pub fn init(tool: &str, log_dir: &Path, verbose: bool) -> Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    }

    let log_file = log_dir.join(format!(
        "{}_{}.log",
        tool,
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let file = File::create(&log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("wxstation={level}").parse()?)
        .add_directive(format!("{}={level}", tool.replace('-', "_")).parse()?);

    fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(std::io::stdout.and(Arc::new(file)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    debug!("Logging to {}", log_file.display());
    Ok(())
}
