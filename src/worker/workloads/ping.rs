use async_trait::async_trait;

use super::{run_subprocess_contract, Workload, WorkloadOutcome};

/// Latency probe, delegated to the system `ping` binary.
pub struct Ping;

#[async_trait]
impl Workload for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }

    async fn run(&self, cfg: &serde_json::Value) -> WorkloadOutcome {
        run_subprocess_contract("ping", &[], cfg).await
    }
}
