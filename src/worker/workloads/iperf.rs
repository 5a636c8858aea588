use async_trait::async_trait;

use super::{run_subprocess_contract, Workload, WorkloadOutcome};

/// Network throughput benchmark, delegated to `iperf3`. Server-mode
/// daemonization and client targeting (`match_ip` vs. a configured
/// `iperf.target`) are config fields the subprocess reads from stdin, not
/// logic this wrapper interprets.
pub struct Iperf;

#[async_trait]
impl Workload for Iperf {
    fn name(&self) -> &'static str {
        "iperf"
    }

    async fn run(&self, cfg: &serde_json::Value) -> WorkloadOutcome {
        run_subprocess_contract("iperf3", &["--json"], cfg).await
    }
}
