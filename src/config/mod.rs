// ABOUTME: Deployment configuration types and stratus.yml loading.
// ABOUTME: Documents are validated against a provider schema before use.

mod backend;
mod validate;

pub use backend::{BackendConfig, CloudType, GpuType, NorthflankConfig, RunpodConfig};
pub use validate::{ValidationError, Violation, validate_document};

use crate::error::{Error, Result};
use crate::types::{DeploymentName, ProviderKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "stratus.yml";
pub const CONFIG_FILENAME_ALT: &str = "stratus.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".stratus/config.yml";

/// Image deployed when the config does not name one.
pub const DEFAULT_IMAGE: &str = "ghcr.io/stratus-dev/workspace:latest";

/// A validated deployment configuration. Immutable once constructed: the
/// only way to obtain one is [`validate_document`], which rejects unknown
/// providers and enumerates every schema violation at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub name: DeploymentName,

    #[serde(default)]
    pub image: Option<String>,

    /// Extra environment passed to every vendor-CLI invocation for this
    /// deployment (API tokens and the like).
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// Deadline for lifecycle-mutating vendor calls.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(flatten)]
    pub backend: BackendConfig,
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}

impl DeploymentConfig {
    pub fn provider(&self) -> ProviderKind {
        match self.backend {
            BackendConfig::Runpod(_) => ProviderKind::Runpod,
            BackendConfig::Northflank(_) => ProviderKind::Northflank,
        }
    }

    pub fn image_or_default(&self) -> &str {
        self.image.as_deref().unwrap_or(DEFAULT_IMAGE)
    }
}

/// Load the raw, not-yet-validated YAML document.
pub fn load_document(path: &Path) -> Result<serde_yaml::Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Find and load the config document from the usual locations.
pub fn discover_document(dir: &Path) -> Result<serde_yaml::Value> {
    let candidates = [
        dir.join(CONFIG_FILENAME),
        dir.join(CONFIG_FILENAME_ALT),
        dir.join(CONFIG_FILENAME_DIR),
    ];

    for path in &candidates {
        if path.exists() {
            return load_document(path);
        }
    }

    Err(Error::ConfigNotFound(dir.to_path_buf()))
}

/// Write a starter stratus.yml for the given provider.
pub fn init_config(
    dir: &Path,
    provider: ProviderKind,
    name: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let name = match name {
        Some(n) => DeploymentName::new(n).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => DeploymentName::new("my-workspace").map_err(|e| Error::InvalidConfig(e.to_string()))?,
    };

    std::fs::write(&config_path, template_yaml(provider, &name))?;
    Ok(())
}

fn template_yaml(provider: ProviderKind, name: &DeploymentName) -> String {
    match provider {
        ProviderKind::Runpod => format!(
            r#"provider: runpod
name: {name}
image: {DEFAULT_IMAGE}
gpu_type: A4000
gpu_count: 1
cloud_type: COMMUNITY
volume_size_gb: 50
"#
        ),
        ProviderKind::Northflank => format!(
            r#"provider: northflank
name: {name}
image: {DEFAULT_IMAGE}
plan: nf-compute-50
port: 8080
min_instances: 1
max_instances: 1
"#
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_round_trips_through_validation() {
        let name = DeploymentName::new("demo").unwrap();
        for provider in ProviderKind::ALL {
            let yaml = template_yaml(provider, &name);
            let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
            let config = validate_document(&doc).unwrap();
            assert_eq!(config.provider(), provider);
            assert_eq!(config.name.as_str(), "demo");
        }
    }

    #[test]
    fn image_falls_back_to_default() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str("provider: runpod\nname: gpu1\ngpu_type: A100\n").unwrap();
        let config = validate_document(&doc).unwrap();
        assert_eq!(config.image_or_default(), DEFAULT_IMAGE);
    }
}
