use crate::models::SshHost;
use anyhow::{bail, Context, Result};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::fs;
use std::path::{Path, PathBuf};

/// Fields collected for the requested alias before validation.
#[derive(Debug, Default)]
struct PartialHost {
    host: Option<String>,
    user: Option<String>,
    port: Option<u16>,
    identity_file: Option<String>,
}

/// Load the profile for `alias` from the config file at `path`.
///
/// A missing file, an unknown alias, or a block without `HostName`, `User`
/// and `IdentityFile` are all errors.
pub fn load_host(path: &Path, alias: &str) -> Result<SshHost> {
    if !path.exists() {
        bail!("SSH config file not found: {}", path.display());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read SSH config file {}", path.display()))?;

    match parse_host(&content, alias)? {
        Some(host) => {
            tracing::debug!("Loaded host '{}' from {}", alias, path.display());
            Ok(host)
        }
        None => {
            let suggestions = suggest_aliases(&content, alias);
            if suggestions.is_empty() {
                bail!("Host '{}' not found in SSH config file: {}", alias, path.display());
            }
            bail!(
                "Host '{}' not found in SSH config file: {} (did you mean: {}?)",
                alias,
                path.display(),
                suggestions.join(", ")
            );
        }
    }
}

/// Parse the block for `alias`. `Ok(None)` means no such `Host` line exists.
pub fn parse_host(content: &str, alias: &str) -> Result<Option<SshHost>> {
    let mut found = false;
    let mut in_target = false;
    let mut partial = PartialHost::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = split_directive(line);
        if key == "host" {
            in_target = value.split_whitespace().any(|pattern| pattern == alias);
            found |= in_target;
            continue;
        }
        if !in_target {
            continue;
        }

        match key.as_str() {
            "hostname" => partial.host = Some(value.to_string()),
            "user" => partial.user = Some(value.to_string()),
            "port" => {
                let port = value
                    .parse::<u16>()
                    .with_context(|| format!("Invalid Port '{}' for host '{}'", value, alias))?;
                partial.port = Some(port);
            }
            "identityfile" => partial.identity_file = Some(value.to_string()),
            _ => {}
        }
    }

    if !found {
        return Ok(None);
    }

    match partial {
        PartialHost {
            host: Some(host),
            user: Some(user),
            port,
            identity_file: Some(identity_file),
        } => Ok(Some(SshHost {
            alias: alias.to_string(),
            host,
            user,
            port,
            identity_file: PathBuf::from(identity_file),
        })),
        _ => bail!(
            "SSH config for host '{}' missing required fields (HostName, User, IdentityFile)",
            alias
        ),
    }
}

/// Resolve the identity file against the project root and make sure it exists.
pub fn resolve_identity_file(host: &SshHost, project_root: &Path) -> Result<PathBuf> {
    let raw = host.identity_file.to_string_lossy();
    let resolved = if let Some(rest) = raw.strip_prefix("~/") {
        dirs::home_dir()
            .context("Could not determine local home directory")?
            .join(rest)
    } else if host.identity_file.is_absolute() {
        host.identity_file.clone()
    } else {
        project_root.join(&host.identity_file)
    };

    if !resolved.exists() {
        bail!("SSH key file not found: {}", resolved.display());
    }
    Ok(resolved)
}

/// `Key value` or `Key=value`, key lowercased.
fn split_directive(line: &str) -> (String, &str) {
    let split_at = line
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(line.len());
    let (key, rest) = line.split_at(split_at);
    let value = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '=');
    (key.to_lowercase(), value.trim())
}

fn suggest_aliases(content: &str, alias: &str) -> Vec<String> {
    let matcher = SkimMatcherV2::default();
    let mut scored: Vec<(i64, String)> = content
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            let (key, value) = split_directive(line);
            (key == "host").then_some(value)
        })
        .flat_map(str::split_whitespace)
        .filter(|candidate| !candidate.contains('*'))
        .filter_map(|candidate| {
            matcher
                .fuzzy_match(candidate, alias)
                .or_else(|| matcher.fuzzy_match(alias, candidate))
                .map(|score| (score, candidate.to_string()))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.dedup_by(|a, b| a.1 == b.1);
    scored.into_iter().take(3).map(|(_, name)| name).collect()
}
