/// Staging Executor: drives the Resource Adapter through the fixed
/// dependency order, bounding instance creation to
/// `instance_threads` concurrent tasks and capturing the first fatal error
/// while letting in-flight work drain.
use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::adapter::{AdapterError, CloudAdapter, ResourceHandle};
use crate::config::{Config, NetworkMode};
use crate::error::{CpError, CpResult};
use crate::inventory::{ResourceInventory, ResourceKind};
use crate::topology::{self, InstanceDescriptor, Role};

pub struct Executor {
    adapter: Arc<dyn CloudAdapter>,
    inventory: Arc<ResourceInventory>,
}

impl Executor {
    pub fn new(adapter: Arc<dyn CloudAdapter>, inventory: Arc<ResourceInventory>) -> Self {
        Self { adapter, inventory }
    }

    /// Stage the master (router, network, subnet, instance, floating IP) for
    /// one environment. The master always gets the literal three-segment
    /// name and is excluded from the indexed plan and from recovery.
    pub async fn stage_master(&self, cp_id: &str, env_label: &str) -> CpResult<ResourceHandle> {
        let name = topology::master_name(cp_id);

        let secgroup = self.create(ResourceKind::SecGroup, env_label, &name, None).await?;
        let keypair = self.create(ResourceKind::Keypair, env_label, &name, None).await?;
        let router = self
            .create(ResourceKind::Router, env_label, &name, Some(Role::Master))
            .await?;
        let network = self
            .create(ResourceKind::Network, env_label, &name, Some(Role::Master))
            .await?;
        let subnet = self.create(ResourceKind::Subnet, env_label, &name, None).await?;
        self.adapter
            .attach_subnet(&router, &subnet)
            .await
            .map_err(CpError::from)?;

        let instance = self.create(ResourceKind::Instance, env_label, &name, None).await?;
        let floater = self.create(ResourceKind::Floater, env_label, &name, None).await?;
        self.adapter
            .add_float(&instance, &floater)
            .await
            .map_err(CpError::from)?;

        let _ = (secgroup, keypair);
        Ok(instance)
    }

    /// Stage the network scaffolding (routers/networks/subnets, or just
    /// subnets on the master network for single-network) for every distinct
    /// router/network index in the plan.
    pub async fn stage_networks(
        &self,
        cp_id: &str,
        env_label: &str,
        mode: &NetworkMode,
        descriptors: &[InstanceDescriptor],
    ) -> CpResult<()> {
        if matches!(mode, NetworkMode::SingleNetwork) {
            return Ok(());
        }

        let mut seen_routers: HashSet<(Role, u32)> = HashSet::new();
        let mut seen_networks: HashSet<(Role, u32, u32)> = HashSet::new();

        for desc in descriptors {
            if matches!(mode, NetworkMode::Full) && seen_routers.insert((desc.role, desc.router_index)) {
                let name = format!("cloudpunch-{cp_id}-{}-r{}", desc.role.letter(), desc.router_index);
                self.create(ResourceKind::Router, env_label, &name, Some(desc.role)).await?;
            }

            if seen_networks.insert((desc.role, desc.router_index, desc.network_index)) {
                let name = match mode {
                    NetworkMode::Full => format!(
                        "cloudpunch-{cp_id}-{}-r{}-n{}",
                        desc.role.letter(),
                        desc.router_index,
                        desc.network_index
                    ),
                    NetworkMode::SingleRouter => format!(
                        "cloudpunch-{cp_id}-{}-master-n{}",
                        desc.role.letter(),
                        desc.network_index
                    ),
                    NetworkMode::SingleNetwork => unreachable!(),
                };
                let network = self
                    .create(ResourceKind::Network, env_label, &name, Some(desc.role))
                    .await?;
                let subnet = self.create(ResourceKind::Subnet, env_label, &name, None).await?;
                let router_name = match mode {
                    NetworkMode::Full => {
                        format!("cloudpunch-{cp_id}-{}-r{}", desc.role.letter(), desc.router_index)
                    }
                    NetworkMode::SingleRouter => topology::master_name(cp_id),
                    NetworkMode::SingleNetwork => unreachable!(),
                };
                let router = ResourceHandle::new(router_name.clone(), router_name);
                self.adapter
                    .attach_subnet(&router, &network)
                    .await
                    .map_err(CpError::from)?;
            }
        }

        Ok(())
    }

    /// Create every worker instance in the plan, bounded to `instance_threads`
    /// concurrent creations. The first fatal error is captured after all
    /// in-flight tasks complete; everything successfully created is already
    /// in the inventory by then.
    pub async fn stage_instances(
        &self,
        cp_id: &str,
        env_label: &str,
        mode: &NetworkMode,
        descriptors: Vec<InstanceDescriptor>,
        instance_threads: usize,
    ) -> CpResult<()> {
        let semaphore = Arc::new(Semaphore::new(instance_threads.max(1)));
        let mut tasks = JoinSet::new();

        for desc in descriptors {
            let adapter = Arc::clone(&self.adapter);
            let inventory = Arc::clone(&self.inventory);
            let semaphore = Arc::clone(&semaphore);
            let cp_id = cp_id.to_string();
            let env_label = env_label.to_string();
            let mode = mode.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let name = topology::format_name(&cp_id, &mode, &desc);
                let result = adapter
                    .create(ResourceKind::Instance, &name, serde_json::json!({"role": desc.role}))
                    .await;
                match result {
                    Ok(handle) => {
                        inventory.record(ResourceKind::Instance, &env_label, Some(desc.role), handle.clone());
                        if matches!(mode, NetworkMode::Full) {
                            if let Ok(floater) = adapter
                                .create(ResourceKind::Floater, &format!("{name}-float"), serde_json::json!({}))
                                .await
                            {
                                inventory.record(ResourceKind::Floater, &env_label, Some(desc.role), floater.clone());
                                let _ = adapter.add_float(&handle, &floater).await;
                            }
                        }
                        Ok(())
                    }
                    Err(e) => Err(CpError::from(e)),
                }
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(join_err) => {
                    if first_error.is_none() {
                        first_error = Some(CpError::ResourceCreation(join_err.to_string()));
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn create(
        &self,
        kind: ResourceKind,
        env_label: &str,
        name: &str,
        role: Option<Role>,
    ) -> CpResult<ResourceHandle> {
        let handle = self
            .adapter
            .create(kind, name, serde_json::json!({}))
            .await
            .map_err(CpError::from)?;
        self.inventory.record(kind, env_label, role, handle.clone());
        Ok(handle)
    }

    /// Recovery: given the hostnames that actually registered,
    /// compute the missing descriptors from the full plan, tear down their
    /// stale instance handles (the master is structurally excluded), and
    /// re-stage just those.
    pub async fn recover_missing(
        &self,
        cp_id: &str,
        env_label: &str,
        mode: &NetworkMode,
        full_plan: &[InstanceDescriptor],
        registered_hostnames: &HashSet<String>,
        instance_threads: usize,
    ) -> CpResult<Vec<InstanceDescriptor>> {
        let mut missing = Vec::new();
        for desc in full_plan {
            let name = topology::format_name(cp_id, mode, desc);
            if topology::is_master_name(cp_id, &name) {
                continue;
            }
            if !registered_hostnames.contains(&name) {
                missing.push(desc.clone());
            }
        }

        for desc in &missing {
            let name = topology::format_name(cp_id, mode, desc);
            let instances = self.inventory.for_kind_and_env(ResourceKind::Instance, env_label);
            if let Some(entry) = instances.into_iter().find(|e| e.handle.name == name) {
                let deleted = crate::adapter::delete_with_retry(
                    self.adapter.as_ref(),
                    ResourceKind::Instance,
                    &entry.handle,
                    3,
                )
                .await;
                if deleted {
                    self.inventory.remove(ResourceKind::Instance, &entry.handle);
                }
            }
        }

        self.stage_instances(cp_id, env_label, mode, missing.clone(), instance_threads)
            .await?;
        Ok(missing)
    }
}

/// Used only by the Driver's recovery-threshold check: `registered / total * 100`.
pub fn registered_percent(registered: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (registered as f64 / total as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::MockAdapter;
    use crate::config::Config;

    #[tokio::test]
    async fn stages_all_instances_with_bounded_concurrency() {
        let mut config = Config::default();
        config.network_mode = NetworkMode::SingleNetwork;
        config.instances_per_network = 5;
        config.test = vec!["ping".into()];

        let adapter = Arc::new(MockAdapter::new());
        let inventory = Arc::new(ResourceInventory::new());
        let executor = Executor::new(adapter.clone(), inventory.clone());

        let plan = topology::plan(&config);
        executor
            .stage_instances("1", "env1", &config.network_mode, plan, 2)
            .await
            .unwrap();

        assert_eq!(inventory.for_kind(ResourceKind::Instance).len(), 5);
    }

    #[tokio::test]
    async fn first_fatal_error_is_surfaced_and_successes_stay_in_inventory() {
        let mut config = Config::default();
        config.network_mode = NetworkMode::SingleNetwork;
        config.instances_per_network = 3;
        config.test = vec!["ping".into()];

        let adapter = Arc::new(MockAdapter::new());
        adapter
            .fail_on_create
            .lock()
            .unwrap()
            .push("cloudpunch-1-s2".to_string());
        let inventory = Arc::new(ResourceInventory::new());
        let executor = Executor::new(adapter.clone(), inventory.clone());

        let plan = topology::plan(&config);
        let result = executor
            .stage_instances("1", "env1", &config.network_mode, plan, 3)
            .await;

        assert!(result.is_err());
        // The two instances that did not fail are still recorded.
        assert_eq!(inventory.for_kind(ResourceKind::Instance).len(), 2);
    }

    #[test]
    fn registered_percent_computes_fraction() {
        assert_eq!(registered_percent(8, 10), 80.0);
        assert_eq!(registered_percent(0, 0), 100.0);
    }
}
