/// Built-in workload registry: each entry is a thin subprocess wrapper
/// around a real load-generation tool, keyed by the name a run
/// configuration's `test` list references. This replaces the
/// `importlib.import_module` dispatch a worker used to import test modules
/// by name.
pub mod fio;
pub mod iperf;
pub mod jmeter;
pub mod ping;
pub mod stress;

use std::collections::HashMap;

use async_trait::async_trait;

/// What a workload run produced: either a JSON results blob posted back to
/// the Control Plane verbatim, or an error string captured the way a Python
/// exception became `final_results` in the original worker.
#[derive(Debug, Clone)]
pub enum WorkloadOutcome {
    Results(serde_json::Value),
    Error(String),
}

impl WorkloadOutcome {
    pub fn into_json(self) -> serde_json::Value {
        match self {
            WorkloadOutcome::Results(v) => v,
            WorkloadOutcome::Error(msg) => serde_json::Value::String(msg),
        }
    }
}

#[async_trait]
pub trait Workload: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, cfg: &serde_json::Value) -> WorkloadOutcome;
}

/// Build the registry of built-in workloads. Ad-hoc workloads shipped via
/// `config.test_files` are not registered here; the agent invokes their
/// saved script directly through the same subprocess contract.
pub fn builtin_registry() -> HashMap<&'static str, Box<dyn Workload>> {
    let mut registry: HashMap<&'static str, Box<dyn Workload>> = HashMap::new();
    registry.insert("fio", Box::new(fio::Fio));
    registry.insert("iperf", Box::new(iperf::Iperf));
    registry.insert("stress", Box::new(stress::Stress));
    registry.insert("ping", Box::new(ping::Ping));
    registry.insert("jmeter", Box::new(jmeter::Jmeter));
    registry
}

/// Run a subprocess with the stdin JSON config / stdout JSON result
/// contract every workload (built-in or ad-hoc) follows. If the named
/// binary cannot be spawned, the workload's failure is reported rather than
/// the agent crashing, mirroring the try/except around a Python test
/// thread's `run`.
pub async fn run_subprocess_contract(program: &str, args: &[&str], cfg: &serde_json::Value) -> WorkloadOutcome {
    use std::process::Stdio;
    use tokio::io::AsyncWriteExt;
    use tokio::process::Command;

    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return WorkloadOutcome::Error(format!("{program}: {e}")),
    };

    if let Some(mut stdin) = child.stdin.take() {
        let payload = cfg.to_string();
        if let Err(e) = stdin.write_all(payload.as_bytes()).await {
            return WorkloadOutcome::Error(format!("{program}: failed writing config: {e}"));
        }
    }

    let output = match child.wait_with_output().await {
        Ok(output) => output,
        Err(e) => return WorkloadOutcome::Error(format!("{program}: {e}")),
    };

    if !output.status.success() {
        return WorkloadOutcome::Error(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    match serde_json::from_slice::<serde_json::Value>(&output.stdout) {
        Ok(value) => WorkloadOutcome::Results(value),
        Err(_) => WorkloadOutcome::Results(serde_json::Value::String(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_reports_error_not_panic() {
        let outcome = run_subprocess_contract("cloudpunch-definitely-not-a-real-binary", &[], &serde_json::json!({})).await;
        assert!(matches!(outcome, WorkloadOutcome::Error(_)));
    }

    #[test]
    fn builtin_registry_has_five_workloads() {
        let registry = builtin_registry();
        for name in ["fio", "iperf", "stress", "ping", "jmeter"] {
            assert!(registry.contains_key(name), "missing {name}");
        }
    }
}
