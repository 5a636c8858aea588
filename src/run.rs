/// The data model shared between the Driver and the Control Plane: the
/// registration record a worker posts, the test result it reports, and the
/// run identifier that ties a staged environment to its cleanup file.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::topology::Role;

/// Generate a run id the way the original tool does: a random 7-digit
/// integer, rendered as `cloudpunch-<id>`.
pub fn generate_run_id() -> String {
    let mut rng = rand::thread_rng();
    let id: u32 = rng.gen_range(1_000_000..10_000_000);
    id.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Master,
    Server,
    Client,
}

impl From<Role> for WorkerRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Master => WorkerRole::Master,
            Role::Server => WorkerRole::Server,
            Role::Client => WorkerRole::Client,
        }
    }
}

/// `{hostname, internal_ip, external_ip, role}` posted by each worker on
/// registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub hostname: String,
    pub internal_ip: String,
    pub external_ip: Option<String>,
    pub role: WorkerRole,
}

/// `{hostname, results: {test_name -> summary|overtime}}` posted by each
/// worker at the end of a test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub hostname: String,
    pub results: serde_json::Value,
}

/// The number of workers expected to report results, and
/// the Design Notes' resolution of the reporter-count open question: report
/// the exact number of eligible reporters rather than an integer-divided
/// approximation.
pub fn expected_reporters(total_workers: usize, server_client_mode: bool, servers_give_results: bool) -> usize {
    if server_client_mode && !servers_give_results {
        total_workers / 2
    } else {
        total_workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_seven_digits() {
        let id = generate_run_id();
        assert_eq!(id.len(), 7);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn expected_reporters_counts_exact_clients() {
        assert_eq!(expected_reporters(10, true, false), 5);
        assert_eq!(expected_reporters(10, true, true), 10);
        assert_eq!(expected_reporters(10, false, true), 10);
    }
}
