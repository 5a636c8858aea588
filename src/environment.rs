use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CpResult;

/// Per-role instance settings: boot source, attached volume, and whether the
/// role sits behind a load balancer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub boot_from_volume: bool,
    #[serde(default)]
    pub volume_size: Option<u32>,
    #[serde(default)]
    pub loadbalancer: bool,
}

/// A single environment: the image, keypair, and per-role shapes that a run
/// stages into one cloud region/project. Split mode stages a second
/// `Environment` (`env2`) for cross-environment server/client pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub image_name: String,
    pub public_key_file: PathBuf,
    #[serde(default)]
    pub api_versions: ApiVersions,
    #[serde(default)]
    pub master: RoleConfig,
    #[serde(default)]
    pub server: RoleConfig,
    #[serde(default)]
    pub client: RoleConfig,
    #[serde(default)]
    pub secgroup_rules: Vec<SecGroupRule>,
    #[serde(default)]
    pub dns_nameservers: Vec<String>,
    #[serde(default)]
    pub shared_userdata: Option<String>,
    #[serde(default)]
    pub external_network: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiVersions {
    #[serde(default = "default_compute_api")]
    pub compute: String,
    #[serde(default = "default_network_api")]
    pub network: String,
    #[serde(default = "default_volume_api")]
    pub volume: String,
    #[serde(default = "default_image_api")]
    pub image: String,
}

fn default_compute_api() -> String {
    "2".into()
}
fn default_network_api() -> String {
    "2.0".into()
}
fn default_volume_api() -> String {
    "3".into()
}
fn default_image_api() -> String {
    "2".into()
}

impl Default for ApiVersions {
    fn default() -> Self {
        Self {
            compute: default_compute_api(),
            network: default_network_api(),
            volume: default_volume_api(),
            image: default_image_api(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecGroupRule {
    pub protocol: String,
    pub port_min: u16,
    pub port_max: u16,
    #[serde(default = "default_cidr")]
    pub cidr: String,
}

fn default_cidr() -> String {
    "0.0.0.0/0".into()
}

impl Environment {
    pub fn load(path: &Path) -> CpResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let env: Environment = serde_yaml::from_str(&text)?;
        Ok(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_environment_parses() {
        let yaml = "image_name: ubuntu-22.04\npublic_key_file: /tmp/key.pub\n";
        let env: Environment = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(env.image_name, "ubuntu-22.04");
        assert_eq!(env.api_versions.compute, "2");
        assert!(env.secgroup_rules.is_empty());
    }
}
