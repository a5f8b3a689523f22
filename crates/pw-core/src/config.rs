use crate::policy::IpVersion;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/pwarden/config.yaml";

/// Locations and flags of the external tools the engine drives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub iptables: String,
    pub ip6tables: String,
    /// Passed as `-w <secs>` so concurrent xtables users queue instead of failing
    pub wait_seconds: Option<u32>,
    pub save: SaveConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            iptables: "/usr/sbin/iptables".to_string(),
            ip6tables: "/usr/sbin/ip6tables".to_string(),
            wait_seconds: Some(600),
            save: SaveConfig::default(),
        }
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            ipv4: vec![
                "/usr/libexec/iptables/iptables.init".to_string(),
                "save".to_string(),
            ],
            ipv6: vec![
                "/usr/libexec/iptables/ip6tables.init".to_string(),
                "save".to_string(),
            ],
        }
    }
}

impl ToolConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse config {:?}", path))
    }

    /// Load an explicit config file, else the system default if present, else built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            tracing::debug!(path = %default_path.display(), "loading tool config");
            return Self::from_file(default_path);
        }

        Ok(Self::default())
    }

    /// Base argv for the filter tool of the given family, wait flag included
    pub fn filter_command(&self, ip_version: IpVersion) -> Vec<String> {
        let binary = match ip_version {
            IpVersion::Ipv4 => &self.iptables,
            IpVersion::Ipv6 => &self.ip6tables,
        };

        let mut cmd = vec![binary.clone()];
        if let Some(secs) = self.wait_seconds {
            cmd.push("-w".to_string());
            cmd.push(secs.to_string());
        }
        cmd
    }

    pub fn save_command(&self, ip_version: IpVersion) -> Vec<String> {
        match ip_version {
            IpVersion::Ipv4 => self.save.ipv4.clone(),
            IpVersion::Ipv6 => self.save.ipv6.clone(),
        }
    }
}
