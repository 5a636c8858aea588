use async_trait::async_trait;

use super::{run_subprocess_contract, Workload, WorkloadOutcome};

/// HTTP load test, delegated to `jmeter` in non-GUI mode.
pub struct Jmeter;

#[async_trait]
impl Workload for Jmeter {
    fn name(&self) -> &'static str {
        "jmeter"
    }

    async fn run(&self, cfg: &serde_json::Value) -> WorkloadOutcome {
        run_subprocess_contract("jmeter", &["-n"], cfg).await
    }
}
