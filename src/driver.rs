/// Driver: the operator-facing pipeline that stages an environment, drives
/// a test run to completion against the Control Plane, and tears the
/// environment back down on every exit path.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::adapter::CloudAdapter;
use crate::cleanup_engine::{CleanupEngine, CleanupFile};
use crate::config::{Config, RecoveryType};
use crate::error::{CpError, CpResult};
use crate::inventory::ResourceInventory;
use crate::run::{self, expected_reporters};
use crate::staging::{registered_percent, Executor};
use crate::topology::{self, InstanceDescriptor};
use crate::ui;

const HTTP_TIMEOUT: Duration = Duration::from_secs(3);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// What the registration barrier decided to do about a missing fleet once
/// the recovery threshold was consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    Rebuild,
    Abort,
    Ignore,
    KeepWaiting,
}

/// The operator's choice at the end of a reuse-mode run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReuseDecision {
    Same,
    Different,
    Abort,
}

/// Thin HTTP client over the Control Plane's endpoint table, every call
/// wrapped in the 3s-timeout / `retry_count`-attempt / 1s-backoff policy
/// this module applies uniformly.
pub struct ControlClient {
    client: Client,
    base_url: String,
    retry_count: u32,
}

impl ControlClient {
    pub fn new(base_url: impl Into<String>, retry_count: u32, insecure: bool) -> CpResult<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(CpError::from)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            retry_count,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Poll `/api/system/health` until it answers 200.
    pub async fn wait_for_health(&self) -> CpResult<()> {
        for attempt in 0..self.retry_count {
            if let Ok(resp) = self.client.get(self.url("/api/system/health")).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            if attempt + 1 < self.retry_count {
                tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
        Err(CpError::ControlPlaneUnavailable(format!(
            "control plane at {} did not answer health checks",
            self.base_url
        )))
    }

    pub async fn registered_count(&self) -> CpResult<usize> {
        #[derive(Deserialize)]
        struct Listing {
            count: usize,
        }
        let listing: Listing = self.get_with_retry("/api/register").await?;
        Ok(listing.count)
    }

    pub async fn registered_hostnames(&self) -> CpResult<HashSet<String>> {
        #[derive(Deserialize)]
        struct Listing {
            instances: Vec<run::Registration>,
        }
        let listing: Listing = self.get_with_retry("/api/register").await?;
        Ok(listing.instances.into_iter().map(|r| r.hostname).collect())
    }

    pub async fn publish_config(&self, config: &serde_json::Value) -> CpResult<()> {
        self.post_with_retry("/api/config", config).await
    }

    pub async fn seal_match(&self) -> CpResult<()> {
        let _: serde_json::Value = self.get_with_retry("/api/test/match").await?;
        Ok(())
    }

    pub async fn results(&self) -> CpResult<Vec<run::TestResult>> {
        self.get_with_retry("/api/test/results").await
    }

    pub async fn reset_status(&self) -> CpResult<()> {
        for attempt in 0..self.retry_count {
            match self.client.delete(self.url("/api/test/status")).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ if attempt + 1 < self.retry_count => tokio::time::sleep(RETRY_BACKOFF).await,
                _ => {}
            }
        }
        Err(CpError::ControlPlaneUnavailable(
            "failed to reset run status".into(),
        ))
    }

    async fn get_with_retry<T: serde::de::DeserializeOwned>(&self, path: &str) -> CpResult<T> {
        let mut last_err = None;
        for attempt in 0..self.retry_count {
            match self.client.get(self.url(path)).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json::<T>().await.map_err(CpError::from);
                }
                Ok(resp) => last_err = Some(format!("{path} returned {}", resp.status())),
                Err(e) => last_err = Some(e.to_string()),
            }
            if attempt + 1 < self.retry_count {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
        Err(CpError::ControlPlaneUnavailable(last_err.unwrap_or_else(|| path.to_string())))
    }

    async fn post_with_retry(&self, path: &str, body: &serde_json::Value) -> CpResult<()> {
        let mut last_err = None;
        for attempt in 0..self.retry_count {
            match self.client.post(self.url(path)).json(body).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => last_err = Some(format!("{path} returned {}", resp.status())),
                Err(e) => last_err = Some(e.to_string()),
            }
            if attempt + 1 < self.retry_count {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
        Err(CpError::ControlPlaneUnavailable(last_err.unwrap_or_else(|| path.to_string())))
    }
}

/// Everything the Driver needs to stage one environment and recover from a
/// partial fleet.
pub struct StagedEnvironment {
    pub cp_id: String,
    pub env_label: String,
    pub plan: Vec<InstanceDescriptor>,
    pub executor: Executor,
    pub inventory: Arc<ResourceInventory>,
}

/// Stage one environment end to end: master, network scaffolding, then the
/// bounded-concurrency instance pool.
pub async fn stage_environment(
    adapter: Arc<dyn CloudAdapter>,
    cp_id: &str,
    env_label: &str,
    config: &Config,
) -> CpResult<StagedEnvironment> {
    let inventory = Arc::new(ResourceInventory::new());
    let executor = Executor::new(Arc::clone(&adapter), Arc::clone(&inventory));

    ui::print_step(1, 9, &format!("staging {env_label}"));
    executor.stage_master(cp_id, env_label).await?;

    let plan = topology::plan(config);
    executor
        .stage_networks(cp_id, env_label, &config.network_mode, &plan)
        .await?;
    executor
        .stage_instances(cp_id, env_label, &config.network_mode, plan.clone(), config.instance_threads)
        .await?;

    print_inventory_table(&inventory);

    Ok(StagedEnvironment {
        cp_id: cp_id.to_string(),
        env_label: env_label.to_string(),
        plan,
        executor,
        inventory,
    })
}

fn print_inventory_table(inventory: &ResourceInventory) {
    let rows: Vec<Vec<String>> = inventory
        .for_kind(crate::inventory::ResourceKind::Instance)
        .into_iter()
        .map(|entry| vec![entry.handle.name.clone(), entry.handle.id.clone(), String::new()])
        .collect();
    if !rows.is_empty() {
        ui::print_table(&["hostname", "fixed ip", "floating ip"], &rows);
    }
}

/// Poll until every non-master worker has registered, applying
/// the recovery policy once `recovery.retries` polls have passed without
/// reaching 100%.
pub async fn registration_barrier(
    control: &ControlClient,
    config: &Config,
    total_workers: usize,
) -> CpResult<RecoveryDecision> {
    let mut polls = 0u32;
    loop {
        let registered = control.registered_count().await?;
        if registered >= total_workers {
            return Ok(RecoveryDecision::Ignore);
        }

        polls += 1;
        if config.recovery.enable && polls >= config.recovery.retries {
            let percent = registered_percent(registered, total_workers);
            if percent >= config.recovery.threshold as f64 {
                return Ok(match config.recovery.recovery_type {
                    RecoveryType::Rebuild => RecoveryDecision::Rebuild,
                    RecoveryType::Abort => RecoveryDecision::Abort,
                    RecoveryType::Ignore => RecoveryDecision::Ignore,
                    RecoveryType::Ask => {
                        let answer = ui::prompt_line(&format!(
                            "{registered}/{total_workers} workers registered ({percent:.0}%); rebuild, abort, or ignore?"
                        ));
                        match answer.as_str() {
                            "rebuild" => RecoveryDecision::Rebuild,
                            "abort" => RecoveryDecision::Abort,
                            _ => RecoveryDecision::Ignore,
                        }
                    }
                });
            }
        }

        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Re-stage the missing descriptors and loop the barrier again, per the
/// `rebuild` recovery path.
pub async fn rebuild_missing(
    staged: &StagedEnvironment,
    control: &ControlClient,
    config: &Config,
) -> CpResult<()> {
    let registered = control.registered_hostnames().await?;
    staged
        .executor
        .recover_missing(
            &staged.cp_id,
            &staged.env_label,
            &config.network_mode,
            &staged.plan,
            &registered,
            config.instance_threads,
        )
        .await?;
    Ok(())
}

/// Poll for results, then render them, prompting for a
/// reuse decision when the caller is running in reuse mode.
pub async fn collect_results(control: &ControlClient, config: &Config, total_workers: usize) -> CpResult<Vec<run::TestResult>> {
    let expected = expected_reporters(total_workers, config.server_client_mode, config.servers_give_results);
    loop {
        let results = control.results().await?;
        if results.len() >= expected {
            return Ok(results);
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
}

pub fn prompt_reuse_decision() -> ReuseDecision {
    loop {
        let answer = ui::prompt_line("run again with same|different config, or abort?");
        match answer.as_str() {
            "same" => return ReuseDecision::Same,
            "different" => return ReuseDecision::Different,
            "abort" => return ReuseDecision::Abort,
            _ => ui::print_warning("please answer same, different, or abort"),
        }
    }
}

pub fn write_results(results: &[run::TestResult], path: Option<&std::path::Path>) -> CpResult<()> {
    write_results_numbered(results, path, 0)
}

/// Write results, suffixing the filename with `test_number` starting at the
/// *second* reuse-mode iteration (`test_number == 0` writes the plain path),
/// matching `post_results`'s `'%s-%s%s' % (stem, test_number, ext)` naming.
pub fn write_results_numbered(
    results: &[run::TestResult],
    path: Option<&std::path::Path>,
    test_number: u32,
) -> CpResult<()> {
    let text = serde_json::to_string_pretty(results)?;
    match path {
        Some(path) if test_number > 0 => {
            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            let ext = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
            let numbered = path.with_file_name(format!("{stem}-{test_number}{ext}"));
            std::fs::write(numbered, text)?;
        }
        Some(path) => std::fs::write(path, text)?,
        None => println!("{text}"),
    }
    Ok(())
}

/// Tear down both environments regardless of how the pipeline
/// exited, persisting any leftovers to a cleanup file.
pub async fn cleanup_environment(
    adapter: Arc<dyn CloudAdapter>,
    inventory: &ResourceInventory,
    run_name: &str,
    env_label: &str,
    retry_attempts: u32,
    api_versions: std::collections::HashMap<String, String>,
) -> CpResult<()> {
    let engine = CleanupEngine::new(adapter);
    let leftovers = engine.run(inventory, env_label, retry_attempts).await;

    if leftovers.is_empty() {
        ui::print_success(&format!("{env_label} cleaned up"));
        return Ok(());
    }

    let file = CleanupFile::from_inventory(
        &rebuild_inventory_from_leftovers(leftovers),
        api_versions,
    );
    let path = CleanupFile::path_for(run_name, env_label);
    file.write_if_nonempty(&path)?;
    ui::print_warning(&format!(
        "some resources in {env_label} could not be deleted; see {}",
        path.display()
    ));
    Ok(())
}

fn rebuild_inventory_from_leftovers(
    leftovers: std::collections::HashMap<crate::inventory::ResourceKind, Vec<crate::adapter::ResourceHandle>>,
) -> ResourceInventory {
    let inventory = ResourceInventory::new();
    for (kind, handles) in leftovers {
        for handle in handles {
            inventory.record(kind, "leftover", None, handle);
        }
    }
    inventory
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuse_decision_parses_known_answers() {
        assert_eq!(
            match "same" {
                "same" => ReuseDecision::Same,
                "different" => ReuseDecision::Different,
                _ => ReuseDecision::Abort,
            },
            ReuseDecision::Same
        );
    }

    #[test]
    fn write_results_to_stdout_does_not_error() {
        let results = vec![run::TestResult {
            hostname: "cloudpunch-1-s1".into(),
            results: serde_json::json!({"ping": "ok"}),
        }];
        assert!(write_results(&results, None).is_ok());
    }

    #[test]
    fn reuse_iteration_suffixes_the_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let results = vec![run::TestResult {
            hostname: "cloudpunch-1-s1".into(),
            results: serde_json::json!({"ping": "ok"}),
        }];

        write_results_numbered(&results, Some(&path), 0).unwrap();
        assert!(path.exists());

        write_results_numbered(&results, Some(&path), 1).unwrap();
        assert!(dir.path().join("results-1.json").exists());
    }
}
