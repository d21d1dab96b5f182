use crate::models::SshHost;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

const CONNECT_TIMEOUT_SECS: u32 = 10;
const LOG_PREVIEW_CHARS: usize = 500;
/// `ssh` reserves this status for its own failures.
const SSH_FAILURE_STATUS: i32 = 255;
/// `sun_path` holds 104 bytes including the terminating NUL on macOS.
const MAX_CONTROL_PATH_LEN: usize = 103;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// The remote operations the deploy pipeline needs. Commands run one at a
/// time, each finishing before the next is issued.
pub trait RemoteShell {
    fn exec(&mut self, command: &str) -> Result<CommandOutput>;
    fn upload(&mut self, local: &Path, remote_path: &str) -> Result<()>;
}

/// Session over the system `ssh`/`scp` binaries. All invocations share one
/// master connection through OpenSSH connection multiplexing.
#[derive(Debug)]
pub struct SshSession {
    host: SshHost,
    identity_file: PathBuf,
    control_path: PathBuf,
    connected: bool,
}

impl SshSession {
    pub fn new(host: SshHost, identity_file: PathBuf) -> Self {
        let control_path = control_path(std::process::id());
        Self {
            host,
            identity_file,
            control_path,
            connected: false,
        }
    }

    pub fn host(&self) -> &SshHost {
        &self.host
    }

    /// Open the master connection. Authentication and network failures
    /// surface here rather than on the first command.
    pub fn connect(&mut self) -> Result<()> {
        tracing::info!(
            "Connecting to {} (port {})...",
            self.host.destination(),
            self.host.port()
        );

        // The persisted master keeps its stderr open, so capture it in a file
        // rather than a pipe that would never reach EOF.
        let err_path = std::env::temp_dir().join(format!(
            "wxstation-{}-connect.err",
            std::process::id()
        ));
        let err_file = create_capture_file(&err_path)?;

        let status = self
            .ssh_command()
            .arg("-o")
            .arg("ControlPersist=yes")
            .arg(self.host.destination())
            .arg("exit")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(err_file))
            .status()
            .with_context(|| format!("Failed to execute ssh for {}", self.host.alias))?;

        let stderr = fs::read_to_string(&err_path).unwrap_or_default();
        let _ = fs::remove_file(&err_path);

        if !status.success() {
            if stderr.contains("Permission denied") {
                anyhow::bail!("Authentication failed. Check your SSH key: {}", stderr.trim());
            }
            anyhow::bail!("SSH connection failed: {}", stderr.trim());
        }

        self.connected = true;
        tracing::info!("Connected successfully!");
        Ok(())
    }

    /// Stop the master connection. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.connected {
            return;
        }
        let result = self
            .ssh_command()
            .arg("-O")
            .arg("exit")
            .arg(self.host.destination())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = result {
            tracing::warn!("Failed to close SSH master connection: {}", e);
        }
        self.connected = false;
    }

    fn common_options(&self, cmd: &mut Command) {
        cmd.arg("-i")
            .arg(&self.identity_file)
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}"))
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg("LogLevel=ERROR")
            .arg("-o")
            .arg("ControlMaster=auto")
            .arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()));
    }

    fn ssh_command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-p").arg(self.host.port().to_string());
        self.common_options(&mut cmd);
        cmd
    }

    fn scp_command(&self) -> Command {
        let mut cmd = Command::new("scp");
        cmd.arg("-P").arg(self.host.port().to_string());
        self.common_options(&mut cmd);
        cmd
    }
}

impl RemoteShell for SshSession {
    fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        tracing::debug!("Executing SSH command: {}", command);
        let output = self
            .ssh_command()
            .arg(self.host.destination())
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute ssh command: {command}"))?;

        let result = to_command_output(output);
        tracing::debug!(
            status = result.status,
            stdout = preview(&result.stdout),
            stderr = preview(&result.stderr),
            "SSH command result"
        );
        if result.status == SSH_FAILURE_STATUS {
            tracing::warn!("ssh reported a connection failure: {}", result.stderr.trim());
        }
        Ok(result)
    }

    fn upload(&mut self, local: &Path, remote_path: &str) -> Result<()> {
        tracing::debug!("Uploading {} -> {}", local.display(), remote_path);
        let output = self
            .scp_command()
            .arg("-q")
            .arg(local)
            .arg(format!("{}:{}", self.host.destination(), remote_path))
            .stdin(Stdio::null())
            .output()
            .context("Failed to execute scp upload command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!("SCP upload failed: {}", stderr.trim()));
        }
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Socket for the master connection. `%C` expands to a 40 character hash, so
/// the base stays short instead of following `TMPDIR`.
fn control_path(pid: u32) -> PathBuf {
    let base = if cfg!(unix) {
        PathBuf::from("/tmp")
    } else {
        std::env::temp_dir()
    };
    base.join(format!("wx-{pid}-%C"))
}

/// Create `path` for writing without following a planted link. A stale file
/// or link left at the same name is removed first.
fn create_capture_file(path: &Path) -> Result<File> {
    let _ = fs::remove_file(path);
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))
}

fn to_command_output(output: Output) -> CommandOutput {
    CommandOutput {
        // Killed by a signal: no code, report as an ssh-level failure.
        status: output.status.code().unwrap_or(SSH_FAILURE_STATUS),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Single-quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Like [`shell_quote`], but a leading `~` still expands to the remote home.
pub fn shell_path(value: &str) -> String {
    match value.strip_prefix("~/") {
        Some(rest) => format!("\"$HOME\"/{}", shell_quote(rest)),
        None if value == "~" => "\"$HOME\"".to_string(),
        None => shell_quote(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(shell_quote("/etc/openhab"), "'/etc/openhab'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(600);
        assert_eq!(preview(&long).chars().count(), LOG_PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn tilde_paths_keep_home_expansion() {
        assert_eq!(
            shell_path("~/weather_station/server"),
            r#""$HOME"/'weather_station/server'"#
        );
        assert_eq!(shell_path("~"), r#""$HOME""#);
        assert_eq!(shell_path("/opt/wx"), "'/opt/wx'");
        assert_eq!(shell_path("/opt/~wx"), "'/opt/~wx'");
    }

    #[test]
    fn expanded_control_path_fits_a_unix_socket() {
        let path = control_path(u32::MAX).to_string_lossy().to_string();
        let expanded = path.replace("%C", &"a".repeat(40));
        assert!(
            expanded.len() <= MAX_CONTROL_PATH_LEN,
            "{} is {} bytes",
            expanded,
            expanded.len()
        );
        #[cfg(unix)]
        assert!(path.starts_with("/tmp/"));
    }

    #[cfg(unix)]
    #[test]
    fn capture_file_does_not_follow_links() {
        let dir = std::env::temp_dir().join(format!("wxstation-capture-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let target = dir.join("victim");
        fs::write(&target, "keep me").unwrap();
        let link = dir.join("connect.err");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let mut file = create_capture_file(&link).unwrap();
        std::io::Write::write_all(&mut file, b"ssh: timeout").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "keep me");
        assert!(!fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn control_path_is_unique_per_process() {
        let host = SshHost {
            alias: "server".into(),
            host: "pi.local".into(),
            user: "pi".into(),
            port: None,
            identity_file: PathBuf::from("id"),
        };
        let session = SshSession::new(host, PathBuf::from("id"));
        let path = session.control_path.to_string_lossy().to_string();
        assert!(path.contains(&std::process::id().to_string()));
        assert!(path.ends_with("%C"));
    }
}
