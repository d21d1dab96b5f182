use crate::ssh_service::RemoteShell;
use anyhow::Result;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Matches sudoers grants such as `(ALL) ALL`, `(ALL : ALL) ALL` or
/// `(ALL) NOPASSWD: ALL`.
const UNRESTRICTED_RULE: &str = r"\(ALL(?:[^)]*)\)\s*(?:NOPASSWD:|PASSWD:)?\s*ALL\b";

const SKIPPED_PREFIXES: [&str; 3] = ["Matching Defaults entries", "Defaults", "User "];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SudoCheckError {
    /// `sudo -l -n` failed, usually because it wants a password.
    NotConfigured { user: String, output: String },
    Unrestricted { user: String, rules: Vec<String> },
}

impl fmt::Display for SudoCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SudoCheckError::NotConfigured { user, output } => write!(
                f,
                "unable to run 'sudo -l -n' as remote user '{user}': {}\n\
                 sudo is not configured for non-interactive use. Deploy with a dedicated \
                 user that has limited, passwordless sudo rules.",
                output.trim()
            ),
            SudoCheckError::Unrestricted { user, rules } => {
                writeln!(
                    f,
                    "remote user '{user}' appears to have unrestricted sudo access."
                )?;
                writeln!(f, "The following sudoers entries look unsafe:")?;
                for rule in rules {
                    writeln!(f, "  {rule}")?;
                }
                write!(
                    f,
                    "Refusing to deploy with full sudo privileges. Use a dedicated deployment \
                     user with only the service restart rules it needs."
                )
            }
        }
    }
}

impl std::error::Error for SudoCheckError {}

fn unrestricted_rule() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(UNRESTRICTED_RULE).expect("sudo rule pattern is valid"))
}

/// Lines of `sudo -l` output that grant full root access.
pub fn find_unrestricted_rules(sudo_output: &str) -> Vec<String> {
    sudo_output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !SKIPPED_PREFIXES.iter().any(|prefix| line.starts_with(prefix)))
        .filter(|line| unrestricted_rule().is_match(line))
        .map(str::to_string)
        .collect()
}

/// Check the remote account's passwordless sudo grants. Returns the user name
/// reported by `whoami`.
pub fn ensure_restricted_sudo<R: RemoteShell>(shell: &mut R, expected_user: &str) -> Result<String> {
    let whoami = shell.exec("whoami")?;
    let remote_user = match whoami.stdout_trimmed() {
        "" => "<unknown>".to_string(),
        user => user.to_string(),
    };

    if remote_user != expected_user {
        tracing::warn!(
            "SSH config user is '{}', but remote reports 'whoami' as '{}'",
            expected_user,
            remote_user
        );
    }

    let listing = shell.exec("sudo -l -n 2>&1")?;
    if !listing.success() {
        return Err(SudoCheckError::NotConfigured {
            user: remote_user,
            output: listing.stdout,
        }
        .into());
    }

    let rules = find_unrestricted_rules(&listing.stdout);
    if !rules.is_empty() {
        return Err(SudoCheckError::Unrestricted {
            user: remote_user,
            rules,
        }
        .into());
    }

    tracing::info!("Sudo rules for '{}' are restricted", remote_user);
    Ok(remote_user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::testing::FakeShell;

    #[test]
    fn flags_full_root_grants() {
        for rule in [
            "(ALL) ALL",
            "(ALL:ALL) ALL",
            "(ALL : ALL) ALL",
            "(ALL) NOPASSWD: ALL",
            "(ALL) PASSWD: ALL",
        ] {
            assert_eq!(find_unrestricted_rules(rule), vec![rule.to_string()], "{rule}");
        }
    }

    #[test]
    fn ignores_scoped_rules() {
        let output = "\
Matching Defaults entries for openhab-deploy on server:
    env_reset, mail_badpass, secure_path=/usr/local/sbin\\:/usr/local/bin

User openhab-deploy may run the following commands on server:
    (root) NOPASSWD: /usr/bin/systemctl restart openhab
    (root) NOPASSWD: /usr/bin/systemctl restart weather-station
";
        assert!(find_unrestricted_rules(output).is_empty());
    }

    #[test]
    fn does_not_match_all_as_a_prefix() {
        assert!(find_unrestricted_rules("(ALL) NOPASSWD: ALLOWED_CMDS").is_empty());
    }

    #[test]
    fn unrestricted_user_aborts() {
        let mut shell = FakeShell::new()
            .respond("whoami", 0, "admin\n")
            .respond("sudo -l -n", 0, "User admin may run:\n    (ALL : ALL) ALL\n");

        let err = ensure_restricted_sudo(&mut shell, "admin").unwrap_err();
        match err.downcast_ref::<SudoCheckError>() {
            Some(SudoCheckError::Unrestricted { user, rules }) => {
                assert_eq!(user, "admin");
                assert_eq!(rules, &vec!["(ALL : ALL) ALL".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn password_prompt_aborts() {
        let mut shell = FakeShell::new()
            .respond("whoami", 0, "deploy\n")
            .respond("sudo -l -n", 1, "sudo: a password is required\n");

        let err = ensure_restricted_sudo(&mut shell, "deploy").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SudoCheckError>(),
            Some(SudoCheckError::NotConfigured { .. })
        ));
    }

    #[test]
    fn restricted_user_passes() {
        let mut shell = FakeShell::new()
            .respond("whoami", 0, "openhab-deploy\n")
            .respond(
                "sudo -l -n",
                0,
                "    (root) NOPASSWD: /usr/bin/systemctl restart openhab\n",
            );

        let user = ensure_restricted_sudo(&mut shell, "openhab-deploy").unwrap();
        assert_eq!(user, "openhab-deploy");
    }
}
