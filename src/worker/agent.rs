/// The worker's infinite run loop: register once, then repeatedly wait for
/// a `go`, execute the configured tests, and report results.
/// Network errors never terminate the loop — they retry with a fixed 1s
/// backoff, matching the Python worker's `while status != 200: sleep(1)`
/// polling idiom throughout `cp_worker.py`.
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::config::TestMode;

use super::workloads::{self, Workload, WorkloadOutcome};

const POLL_BACKOFF: Duration = Duration::from_secs(1);
const POLL_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize)]
struct RegisterBody {
    hostname: String,
    internal_ip: String,
    external_ip: Option<String>,
    role: String,
}

#[derive(Debug, Serialize)]
struct StatusBody<'a> {
    hostname: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(flatten)]
    config: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ResultBody {
    hostname: String,
    results: serde_json::Value,
}

async fn dispatch(
    registry: &HashMap<&'static str, Box<dyn Workload>>,
    name: &str,
    config: &serde_json::Value,
    ad_hoc: &HashMap<String, PathBuf>,
) -> WorkloadOutcome {
    if let Some(workload) = registry.get(name) {
        return workload.run(config).await;
    }
    if let Some(path) = ad_hoc.get(name) {
        return workloads::run_subprocess_contract(&path.to_string_lossy(), &[], config).await;
    }
    WorkloadOutcome::Error(format!("unknown test {name}"))
}

pub struct Agent {
    client: Client,
    base_url: String,
    hostname: String,
    internal_ip: String,
    external_ip: Option<String>,
    role: String,
    workdir: PathBuf,
    registry: Arc<HashMap<&'static str, Box<dyn Workload>>>,
}

impl Agent {
    pub fn new(
        base_url: impl Into<String>,
        hostname: String,
        internal_ip: String,
        external_ip: Option<String>,
        role: String,
        workdir: PathBuf,
    ) -> Self {
        Self {
            client: Client::builder().timeout(POLL_TIMEOUT).build().expect("reqwest client"),
            base_url: base_url.into(),
            hostname,
            internal_ip,
            external_ip,
            role,
            workdir,
            registry: Arc::new(workloads::builtin_registry()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Never returns: registers once, then loops `run_iteration` forever.
    pub async fn run(&self) -> ! {
        self.wait_for_health().await;
        self.register().await;
        loop {
            self.run_iteration().await;
        }
    }

    async fn wait_for_health(&self) {
        loop {
            tracing::info!("attempting to connect to control plane at {}", self.base_url);
            match self.client.get(self.url("/api/system/health")).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!("connected successfully to control plane");
                    return;
                }
                _ => tokio::time::sleep(POLL_BACKOFF).await,
            }
        }
    }

    async fn register(&self) {
        let body = RegisterBody {
            hostname: self.hostname.clone(),
            internal_ip: self.internal_ip.clone(),
            external_ip: self.external_ip.clone(),
            role: self.role.clone(),
        };
        loop {
            tracing::info!("attempting to register to control plane");
            match self.client.post(self.url("/api/register")).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!("registered to control plane");
                    return;
                }
                _ => tokio::time::sleep(POLL_BACKOFF).await,
            }
        }
    }

    async fn wait_for_go(&self) {
        let body = StatusBody { hostname: &self.hostname };
        loop {
            let outcome = self
                .client
                .post(self.url("/api/test/status"))
                .json(&body)
                .send()
                .await
                .ok();
            if let Some(resp) = outcome {
                if let Ok(parsed) = resp.json::<StatusResponse>().await {
                    if parsed.status == "go" {
                        return;
                    }
                }
            }
            tokio::time::sleep(POLL_BACKOFF).await;
        }
    }

    async fn fetch_config(&self) -> serde_json::Value {
        let body = StatusBody { hostname: &self.hostname };
        loop {
            let outcome = self
                .client
                .post(self.url("/api/test/run"))
                .json(&body)
                .send()
                .await
                .ok();
            if let Some(resp) = outcome {
                if resp.status().is_success() {
                    if let Ok(parsed) = resp.json::<RunResponse>().await {
                        return parsed.config;
                    }
                }
            }
            tokio::time::sleep(POLL_BACKOFF).await;
        }
    }

    /// Write ad-hoc workload source shipped in `config.test_files` to disk
    /// before it can be invoked.
    fn save_ad_hoc_tests(&self, config: &serde_json::Value) -> HashMap<String, PathBuf> {
        let mut saved = HashMap::new();
        let Some(files) = config.get("test_files").and_then(|v| v.as_object()) else {
            return saved;
        };
        let _ = std::fs::create_dir_all(&self.workdir);
        for (name, source) in files {
            let Some(source) = source.as_str() else { continue };
            let path = self.workdir.join(name);
            if std::fs::write(&path, source).is_ok() {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    if let Ok(metadata) = std::fs::metadata(&path) {
                        let mut perms = metadata.permissions();
                        perms.set_mode(0o755);
                        let _ = std::fs::set_permissions(&path, perms);
                    }
                }
                saved.insert(name.clone(), path);
            }
        }
        saved
    }

    /// Execute the configured test list in `list` (sequential) or
    /// `concurrent` mode, honoring `test_start_delay` between starts.
    async fn run_tests(&self, config: &serde_json::Value, ad_hoc: &HashMap<String, PathBuf>) -> HashMap<String, serde_json::Value> {
        let tests: Vec<String> = config
            .get("test")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let mode = config
            .get("test_mode")
            .and_then(|v| v.as_str())
            .map(|s| if s == "concurrent" { TestMode::Concurrent } else { TestMode::List })
            .unwrap_or(TestMode::List);
        let start_delay = config.get("test_start_delay").and_then(|v| v.as_u64()).unwrap_or(0);

        match mode {
            TestMode::List => {
                let mut results = HashMap::new();
                for name in tests {
                    if start_delay > 0 {
                        tokio::time::sleep(Duration::from_secs(start_delay)).await;
                    }
                    tracing::info!("starting test {name}");
                    let outcome = self.dispatch(&name, config, ad_hoc).await;
                    results.insert(name, outcome.into_json());
                }
                results
            }
            TestMode::Concurrent => {
                if start_delay > 0 {
                    tokio::time::sleep(Duration::from_secs(start_delay)).await;
                }
                let mut tasks = JoinSet::new();
                for name in tests {
                    let config = config.clone();
                    let ad_hoc = ad_hoc.clone();
                    let registry = Arc::clone(&self.registry);
                    tasks.spawn(async move {
                        let outcome = dispatch(&registry, &name, &config, &ad_hoc).await;
                        (name, outcome)
                    });
                }
                let mut results = HashMap::new();
                while let Some(Ok((name, outcome))) = tasks.join_next().await {
                    results.insert(name, outcome.into_json());
                }
                results
            }
        }
    }

    async fn dispatch(&self, name: &str, config: &serde_json::Value, ad_hoc: &HashMap<String, PathBuf>) -> WorkloadOutcome {
        dispatch(&self.registry, name, config, ad_hoc).await
    }

    fn should_report(&self, config: &serde_json::Value) -> bool {
        let server_client_mode = config.get("server_client_mode").and_then(|v| v.as_bool()).unwrap_or(false);
        if !server_client_mode {
            return true;
        }
        let servers_give_results = config.get("servers_give_results").and_then(|v| v.as_bool()).unwrap_or(true);
        self.role == "client" || (self.role == "server" && servers_give_results)
    }

    async fn send_results(&self, results: HashMap<String, serde_json::Value>) {
        let body = ResultBody {
            hostname: self.hostname.clone(),
            results: serde_json::to_value(results).unwrap_or(serde_json::Value::Null),
        };
        loop {
            tracing::info!("attempting to send test results to control plane");
            match self.client.post(self.url("/api/test/results")).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::info!("sent test results to control plane");
                    return;
                }
                _ => tokio::time::sleep(POLL_BACKOFF).await,
            }
        }
    }

    async fn run_iteration(&self) {
        self.wait_for_go().await;
        let config = self.fetch_config().await;
        let ad_hoc = self.save_ad_hoc_tests(&config);
        let results = self.run_tests(&config, &ad_hoc).await;
        tracing::info!("all tests have finished");

        if self.should_report(&config) {
            self.send_results(results).await;
        } else {
            tracing::info!("not expected to send results");
        }
        tracing::info!("test process complete, starting over");
    }
}
