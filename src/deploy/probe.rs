use crate::ssh_service::{shell_quote, RemoteShell};
use anyhow::Result;

const TEMP_DIR_NAME: &str = ".openhab-deploy-tmp";

/// What the shell probes found out about the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEnv {
    pub home: Option<String>,
    /// openHAB conf directory holding `items/`, `sitemaps/` and `rules/`.
    pub openhab_conf: String,
}

impl RemoteEnv {
    /// Staging directory for files that need a `cp` into a protected location.
    pub fn temp_dir(&self) -> String {
        match &self.home {
            Some(home) => join_remote(home, TEMP_DIR_NAME),
            None => join_remote("/tmp", TEMP_DIR_NAME),
        }
    }

    /// Expand a leading `~` with the remote home directory.
    pub fn expand_home(&self, path: &str) -> String {
        match (&self.home, path) {
            (Some(home), "~") => home.clone(),
            (Some(home), p) if p.starts_with("~/") => join_remote(home, &p[2..]),
            _ => path.to_string(),
        }
    }
}

/// Detect the openHAB conf directory and the remote home.
///
/// `OPENHAB_CONF` wins when the login environment exports it; otherwise
/// `default_conf` is used.
pub fn probe<R: RemoteShell>(shell: &mut R, default_conf: &str, service: &str) -> Result<RemoteEnv> {
    let conf = shell.exec("printenv OPENHAB_CONF || echo ''")?;
    let openhab_conf = match conf.stdout_trimmed() {
        "" => default_conf.to_string(),
        env => {
            tracing::info!("Using OPENHAB_CONF from remote environment: {}", env);
            env.to_string()
        }
    };

    let status = shell.exec(&format!(
        "systemctl is-active {} 2>&1 || true",
        shell_quote(service)
    ))?;
    tracing::info!(
        "Service '{}' is currently: {}",
        service,
        match status.stdout_trimmed() {
            "" => "unknown",
            s => s,
        }
    );

    let home = shell.exec("echo $HOME")?;
    let home = match home.stdout_trimmed() {
        "" => {
            tracing::warn!("Could not determine remote home directory");
            None
        }
        h => Some(h.to_string()),
    };

    Ok(RemoteEnv { home, openhab_conf })
}

pub fn join_remote(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::testing::FakeShell;

    fn env(home: Option<&str>) -> RemoteEnv {
        RemoteEnv {
            home: home.map(str::to_string),
            openhab_conf: "/etc/openhab".to_string(),
        }
    }

    #[test]
    fn prefers_openhab_conf_from_environment() {
        let mut shell = FakeShell::new()
            .respond("printenv OPENHAB_CONF", 0, "/srv/openhab/conf\n")
            .respond("echo $HOME", 0, "/home/openhab-deploy\n");

        let env = probe(&mut shell, "/etc/openhab", "openhab").unwrap();
        assert_eq!(env.openhab_conf, "/srv/openhab/conf");
        assert_eq!(env.home.as_deref(), Some("/home/openhab-deploy"));
    }

    #[test]
    fn falls_back_to_default_conf() {
        let mut shell = FakeShell::new()
            .respond("printenv OPENHAB_CONF", 0, "\n")
            .respond("echo $HOME", 0, "");

        let env = probe(&mut shell, "/opt/openhab/conf", "openhab").unwrap();
        assert_eq!(env.openhab_conf, "/opt/openhab/conf");
        assert_eq!(env.home, None);
        assert_eq!(env.temp_dir(), "/tmp/.openhab-deploy-tmp");
    }

    #[test]
    fn expands_tilde_with_remote_home() {
        let env = env(Some("/home/pi/"));
        assert_eq!(env.expand_home("~"), "/home/pi/");
        assert_eq!(env.expand_home("~/weather_station/server"), "/home/pi/weather_station/server");
        assert_eq!(env.expand_home("/opt/wx"), "/opt/wx");
        assert_eq!(env.temp_dir(), "/home/pi/.openhab-deploy-tmp");
    }

    #[test]
    fn tilde_is_left_alone_without_home() {
        assert_eq!(env(None).expand_home("~/wx"), "~/wx");
    }
}
