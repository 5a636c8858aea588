use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CpError, CpResult};

/// Recovery behavior when the registration barrier times out with missing
/// workers still unaccounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryType {
    Ask,
    Rebuild,
    Abort,
    Ignore,
}

impl Default for RecoveryType {
    fn default() -> Self {
        RecoveryType::Ask
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Full,
    SingleRouter,
    SingleNetwork,
}

impl Default for NetworkMode {
    fn default() -> Self {
        NetworkMode::Full
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    List,
    Concurrent,
}

impl Default for TestMode {
    fn default() -> Self {
        TestMode::List
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub recovery_type: RecoveryType,
    /// Seconds to wait for all expected workers to register before the
    /// recovery decision is consulted.
    #[serde(default = "default_recovery_threshold")]
    pub threshold: u64,
    #[serde(default = "default_recovery_retries")]
    pub retries: u32,
}

fn default_recovery_threshold() -> u64 {
    600
}

fn default_recovery_retries() -> u32 {
    3
}

/// A run configuration: everything the Driver needs to plan, stage, run, and
/// tear down one CloudPunch test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network_mode: NetworkMode,
    #[serde(default = "default_one")]
    pub number_routers: u32,
    #[serde(default = "default_one")]
    pub networks_per_router: u32,
    #[serde(default = "default_one")]
    pub instances_per_network: u32,
    #[serde(default)]
    pub server_client_mode: bool,
    #[serde(default = "default_true")]
    pub servers_give_results: bool,
    #[serde(default)]
    pub overtime_results: bool,
    #[serde(default = "default_instance_threads")]
    pub instance_threads: usize,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default)]
    pub test: Vec<String>,
    #[serde(default)]
    pub test_mode: TestMode,
    #[serde(default)]
    pub test_start_delay: u64,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub flavor_file: Option<PathBuf>,
    #[serde(default)]
    pub hostmap: Option<PathBuf>,
    #[serde(default)]
    pub admin_mode: bool,
    #[serde(default)]
    pub datadog: DatadogConfig,
    /// Per-workload configuration blobs, keyed by workload name (`fio`,
    /// `iperf`, `stress`, `ping`, `jmeter`, or an ad-hoc name).
    #[serde(default)]
    pub test_config: HashMap<String, serde_json::Value>,
    /// Ad-hoc workload source, keyed by name, shipped to workers verbatim.
    #[serde(default)]
    pub test_files: HashMap<String, String>,
    #[serde(default)]
    pub loadbalancers: LoadBalancers,
}

/// Per-role load-balancer addresses, indexed by network index (1-based),
/// populated by the planner at stage time and consulted by the control
/// plane's `match_ip` enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadBalancers {
    #[serde(default)]
    pub server: Vec<String>,
    #[serde(default)]
    pub client: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatadogConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_one() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_instance_threads() -> usize {
    10
}

fn default_retry_count() -> u32 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_mode: NetworkMode::default(),
            number_routers: 1,
            networks_per_router: 1,
            instances_per_network: 1,
            server_client_mode: false,
            servers_give_results: true,
            overtime_results: false,
            instance_threads: default_instance_threads(),
            retry_count: default_retry_count(),
            test: Vec::new(),
            test_mode: TestMode::default(),
            test_start_delay: 0,
            recovery: RecoveryConfig::default(),
            flavor_file: None,
            hostmap: None,
            admin_mode: false,
            datadog: DatadogConfig::default(),
            test_config: HashMap::new(),
            test_files: HashMap::new(),
            loadbalancers: LoadBalancers::default(),
        }
    }
}

/// Upper bounds on topology size, taken from the limits a production
/// deployment enforces to keep a single run's blast radius sane.
const MAX_ROUTERS: u32 = 50;
const MAX_NETWORKS_PER_ROUTER: u32 = 50;
const MAX_INSTANCES_PER_NETWORK: u32 = 50;

impl Config {
    /// Load a run configuration from a YAML file, falling back to defaults
    /// when no path is given.
    pub fn load_or_default(config_path: Option<PathBuf>) -> CpResult<Self> {
        if let Some(path) = config_path {
            if path.exists() {
                let config_str = std::fs::read_to_string(&path)?;
                let config: Config = serde_yaml::from_str(&config_str)?;
                tracing::info!("loaded run configuration from {:?}", path);
                config.validate()?;
                return Ok(config);
            }
            return Err(CpError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        tracing::info!("using default run configuration");
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> CpResult<()> {
        let config_str = serde_yaml::to_string(self)?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(config_path, config_str)?;
        tracing::info!("run configuration saved to {:?}", config_path);
        Ok(())
    }

    /// Validate the numeric bounds and cross-field rules a run must satisfy
    /// before staging begins.
    pub fn validate(&self) -> CpResult<()> {
        if self.number_routers == 0 || self.number_routers > MAX_ROUTERS {
            return Err(CpError::Configuration(format!(
                "number_routers must be between 1 and {MAX_ROUTERS}"
            )));
        }
        if self.networks_per_router == 0 || self.networks_per_router > MAX_NETWORKS_PER_ROUTER {
            return Err(CpError::Configuration(format!(
                "networks_per_router must be between 1 and {MAX_NETWORKS_PER_ROUTER}"
            )));
        }
        if self.instances_per_network == 0 || self.instances_per_network > MAX_INSTANCES_PER_NETWORK
        {
            return Err(CpError::Configuration(format!(
                "instances_per_network must be between 1 and {MAX_INSTANCES_PER_NETWORK}"
            )));
        }
        if matches!(self.network_mode, NetworkMode::SingleRouter) && self.number_routers != 1 {
            return Err(CpError::Configuration(
                "network_mode single_router requires number_routers == 1".into(),
            ));
        }
        if matches!(self.network_mode, NetworkMode::SingleNetwork)
            && (self.number_routers != 1 || self.networks_per_router != 1)
        {
            return Err(CpError::Configuration(
                "network_mode single_network requires number_routers == 1 and networks_per_router == 1"
                    .into(),
            ));
        }
        if self.instance_threads == 0 {
            return Err(CpError::Configuration(
                "instance_threads must be at least 1".into(),
            ));
        }
        if self.test.is_empty() {
            return Err(CpError::Configuration(
                "at least one test must be configured".into(),
            ));
        }
        Ok(())
    }

    /// Split mode (a second `--env` file for a dedicated client environment)
    /// only makes sense paired with server/client pairing in `full` network
    /// mode; a lone `env2` with no pairing has nothing to pair across
    /// environments, and only `full` mode gives client routers/networks the
    /// +127 offset this implies.
    pub fn validate_for_environments(&self, env_count: usize) -> CpResult<()> {
        if env_count == 2 {
            if !self.server_client_mode {
                return Err(CpError::Configuration(
                    "a second --env file requires server_client_mode to be enabled".into(),
                ));
            }
            if !matches!(self.network_mode, NetworkMode::Full) {
                return Err(CpError::Configuration(
                    "a second --env file requires network_mode: full".into(),
                ));
            }
        }
        Ok(())
    }

    /// Total number of instances a topology of this shape produces,
    /// excluding the master (server/client roles only).
    pub fn total_instances(&self) -> u32 {
        match self.network_mode {
            NetworkMode::Full => {
                self.number_routers * self.networks_per_router * self.instances_per_network
            }
            NetworkMode::SingleRouter => self.networks_per_router * self.instances_per_network,
            NetworkMode::SingleNetwork => self.instances_per_network,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let mut config = Config::default();
        config.test = vec!["ping".into()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_routers_rejected() {
        let mut config = Config::default();
        config.test = vec!["ping".into()];
        config.number_routers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn single_router_requires_one_router() {
        let mut config = Config::default();
        config.test = vec!["ping".into()];
        config.network_mode = NetworkMode::SingleRouter;
        config.number_routers = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn split_mode_requires_pairing_and_full_network_mode() {
        let mut config = Config::default();
        config.test = vec!["ping".into()];
        assert!(config.validate_for_environments(2).is_err());

        config.server_client_mode = true;
        assert!(config.validate_for_environments(2).is_ok());

        config.network_mode = NetworkMode::SingleRouter;
        assert!(config.validate_for_environments(2).is_err());
    }

    #[test]
    fn round_trip_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        let mut config = Config::default();
        config.test = vec!["iperf".into()];
        config.save(&path).unwrap();
        let loaded = Config::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.test, vec!["iperf".to_string()]);
    }
}
