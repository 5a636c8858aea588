use async_trait::async_trait;

use super::{run_subprocess_contract, Workload, WorkloadOutcome};

/// Disk I/O benchmark, delegated to the real `fio` binary
/// ("the actual fio/iperf invocation and parsing is out of scope").
pub struct Fio;

#[async_trait]
impl Workload for Fio {
    fn name(&self) -> &'static str {
        "fio"
    }

    async fn run(&self, cfg: &serde_json::Value) -> WorkloadOutcome {
        run_subprocess_contract("fio", &["--output-format=json"], cfg).await
    }
}
