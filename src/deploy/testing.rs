use crate::ssh_service::{CommandOutput, RemoteShell};
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct FakeShell {
    responses: Vec<(String, CommandOutput)>,
    failing_uploads: Vec<String>,
    pub commands: Vec<String>,
    pub uploads: Vec<(PathBuf, String)>,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix`. Earlier entries win; anything
    /// unscripted succeeds with empty output.
    pub fn respond(mut self, prefix: &str, status: i32, stdout: &str) -> Self {
        self.responses.push((
            prefix.to_string(),
            CommandOutput {
                status,
                stdout: stdout.to_string(),
                stderr: if status == 0 { String::new() } else { format!("{prefix} failed") },
            },
        ));
        self
    }

    /// Fail uploads whose remote path contains `needle`.
    pub fn fail_upload(mut self, needle: &str) -> Self {
        self.failing_uploads.push(needle.to_string());
        self
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.commands.iter().any(|c| c.starts_with(prefix))
    }
}

impl RemoteShell for FakeShell {
    fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        self.commands.push(command.to_string());
        let output = self
            .responses
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or(CommandOutput {
                status: 0,
                stdout: String::new(),
                stderr: String::new(),
            });
        Ok(output)
    }

    fn upload(&mut self, local: &Path, remote_path: &str) -> Result<()> {
        if self.failing_uploads.iter().any(|n| remote_path.contains(n.as_str())) {
            bail!("SCP upload failed: permission denied");
        }
        self.uploads.push((local.to_path_buf(), remote_path.to_string()));
        Ok(())
    }
}

/// Fresh directory under the system temp dir, unique per test name and process.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wxstation-deploy-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}
