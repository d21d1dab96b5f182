use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use wxstation::ssh_config;
use wxstation::ssh_service::{CommandOutput, RemoteShell, SshSession};

/// Run one command on the weather station server over SSH.
#[derive(Debug, Parser)]
#[command(name = "wx-exec", version, about)]
struct Cli {
    /// Command line to run remotely
    command: String,

    /// Base directory for relative paths
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[arg(long, default_value = ".ssh/config")]
    ssh_config: PathBuf,

    /// Host alias in the SSH config
    #[arg(long, default_value = "server")]
    host: String,

    /// Print stderr even when the command succeeds
    #[arg(long)]
    show_stderr: bool,
}

fn execute(cli: &Cli) -> Result<CommandOutput> {
    let host = ssh_config::load_host(&cli.project_root.join(&cli.ssh_config), &cli.host)?;
    let key = ssh_config::resolve_identity_file(&host, &cli.project_root)?;

    let mut session = SshSession::new(host, key);
    session.connect()?;
    tracing::debug!("Running on {}: {}", session.host().destination(), cli.command);
    let output = session.exec(&cli.command);
    session.close();
    output
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress goes to stderr so stdout carries only the remote output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wxstation=warn".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match execute(&cli) {
        Ok(output) => {
            print!("{}", output.stdout);
            let _ = std::io::stdout().flush();
            if !output.success() || cli.show_stderr {
                eprint!("{}", output.stderr);
            }
            ExitCode::from(u8::try_from(output.status).unwrap_or(1))
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}
