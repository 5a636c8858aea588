use async_trait::async_trait;

use super::{run_subprocess_contract, Workload, WorkloadOutcome};

/// CPU/memory load generator, delegated to `stress-ng`.
pub struct Stress;

#[async_trait]
impl Workload for Stress {
    fn name(&self) -> &'static str {
        "stress"
    }

    async fn run(&self, cfg: &serde_json::Value) -> WorkloadOutcome {
        run_subprocess_contract("stress-ng", &["--metrics-brief"], cfg).await
    }
}
