/// Worker Agent: the long-running process a staged instance runs, polling
/// the Control Plane for its marching orders and executing the configured
/// workloads.
pub mod agent;
pub mod workloads;

pub use agent::Agent;
pub use workloads::{Workload, WorkloadOutcome};
