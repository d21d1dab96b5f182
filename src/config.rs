use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One openHAB configuration file and the sub-directory of the openHAB conf
/// directory it is deployed into.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OpenhabFile {
    pub file: String,
    pub subdir: String,
}

impl OpenhabFile {
    fn new(file: &str, subdir: &str) -> Self {
        Self {
            file: file.to_string(),
            subdir: subdir.to_string(),
        }
    }
}

/// Defaults for `wx-deploy`, read from `deploy.toml`. Command line flags
/// take precedence over every field here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DeployProfile {
    pub host: String,
    pub ssh_config: PathBuf,
    pub config_dir: PathBuf,
    pub remote_dir: String,
    pub openhab_service: String,
    pub receiver_dir: String,
    pub receiver_service: String,
    pub receiver_binary: PathBuf,
    pub receiver_config: PathBuf,
    pub openhab_files: Vec<OpenhabFile>,
}

impl Default for DeployProfile {
    fn default() -> Self {
        Self {
            host: "server-deploy".to_string(),
            ssh_config: PathBuf::from(".ssh/config"),
            config_dir: PathBuf::from("server/config/openhab_config"),
            remote_dir: "/etc/openhab".to_string(),
            openhab_service: "openhab".to_string(),
            receiver_dir: "~/weather_station/server".to_string(),
            receiver_service: "weather-station".to_string(),
            receiver_binary: PathBuf::from("target/release/wx-receiver"),
            receiver_config: PathBuf::from("server/config.json"),
            openhab_files: vec![
                OpenhabFile::new("weather_station.items", "items"),
                OpenhabFile::new("weather_station.sitemap", "sitemaps"),
                OpenhabFile::new("weather_station.rules", "rules"),
            ],
        }
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    profile_file: PathBuf,
}

impl ConfigManager {
    /// Use `<config dir>/wxstation/deploy.toml`, creating the directory if needed.
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("wxstation");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        }

        Ok(Self {
            profile_file: config_dir.join("deploy.toml"),
        })
    }

    pub fn with_profile(path: impl Into<PathBuf>) -> Self {
        Self {
            profile_file: path.into(),
        }
    }

    pub fn profile_path(&self) -> &Path {
        &self.profile_file
    }

    pub fn load_profile(&self) -> Result<DeployProfile> {
        // If profile doesn't exist, create it with default values
        if !self.profile_file.exists() {
            let profile = DeployProfile::default();
            self.save_profile(&profile)?;
            tracing::info!(
                "Created default deploy profile at {}",
                self.profile_file.display()
            );
            return Ok(profile);
        }

        let content =
            fs::read_to_string(&self.profile_file).context("Failed to read deploy profile")?;
        let profile: DeployProfile =
            toml::from_str(&content).context("Failed to parse deploy profile")?;
        Ok(profile)
    }

    pub fn save_profile(&self, profile: &DeployProfile) -> Result<()> {
        if let Some(parent) = self.profile_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create profile directory")?;
            }
        }
        let toml = toml::to_string_pretty(profile).context("Failed to serialize profile")?;
        fs::write(&self.profile_file, toml).context("Failed to write deploy profile")?;
        Ok(())
    }
}
