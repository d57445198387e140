//! fleet.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ident::DEFAULT_SEGMENTS;

/// Default static pod directory watched by the node agent.
pub const DEFAULT_MANIFEST_DIR: &str = "/etc/kubernetes/manifests";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub manifests: ManifestsConfig,
    pub naming: NamingConfig,
    pub readiness: ReadinessConfig,
    pub invoke: InvokeConfig,
    pub scale: ScaleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestsConfig {
    pub dir: PathBuf,
}

impl Default for ManifestsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_MANIFEST_DIR),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Suffix the node agent appends to mirror pod names. Resolved from
    /// `NODE_NAME` or the kernel hostname when unset.
    pub node_name: Option<String>,
    pub id_lengths: Vec<usize>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            node_name: None,
            id_lengths: DEFAULT_SEGMENTS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub namespace: String,
    pub poll_interval: String,
    pub max_poll_interval: String,
    pub timeout: String,
    pub max_consecutive_errors: u32,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            poll_interval: "500ms".to_string(),
            max_poll_interval: "5s".to_string(),
            timeout: "2m".to_string(),
            max_consecutive_errors: 5,
        }
    }
}

impl ReadinessConfig {
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        duration_field("readiness.poll_interval", &self.poll_interval)
    }

    pub fn max_poll_interval(&self) -> Result<Duration, ConfigError> {
        duration_field("readiness.max_poll_interval", &self.max_poll_interval)
    }

    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        duration_field("readiness.timeout", &self.timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokeConfig {
    pub timeout: String,
    /// Port the function listens on inside the pod.
    pub port: u16,
}

impl Default for InvokeConfig {
    fn default() -> Self {
        Self {
            timeout: "10s".to_string(),
            port: 8000,
        }
    }
}

impl InvokeConfig {
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        duration_field("invoke.timeout", &self.timeout)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Cancel the remaining instances as soon as one fails.
    pub fail_fast: bool,
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FleetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Reject duration strings up front rather than at first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.readiness.poll_interval()?;
        self.readiness.max_poll_interval()?;
        self.readiness.timeout()?;
        self.invoke.timeout()?;

        let lengths = &self.naming.id_lengths;
        if lengths.is_empty() || lengths.contains(&0) {
            return Err(ConfigError::IdLengths(lengths.clone()));
        }
        Ok(())
    }

    /// The node suffix for mirror pod names.
    pub fn node_name(&self) -> Result<String, ConfigError> {
        if let Some(name) = self.naming.node_name.as_deref().filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }
        if let Ok(name) = std::env::var("NODE_NAME") {
            if !name.trim().is_empty() {
                return Ok(name.trim().to_string());
            }
        }
        ["/proc/sys/kernel/hostname", "/etc/hostname"]
            .iter()
            .filter_map(|p| std::fs::read_to_string(p).ok())
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
            .ok_or(ConfigError::NodeName)
    }
}

fn duration_field(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| ConfigError::Duration {
        field,
        value: value.to_string(),
    })
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
