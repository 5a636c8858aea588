// ===================================================================================================
// CloudPunch - Distributed Performance Testing Orchestrator
// ===================================================================================================
//
// CloudPunch stages ephemeral IaaS environments to drive distributed
// performance tests (network throughput, disk I/O, CPU stress, HTTP load,
// ICMP latency) at scale and collects per-worker results.
//
// ## ARCHITECTURE OVERVIEW
//
// ### 1. Resource Adapter (adapter/)
// Uniform CRUD plus kind-specific mutations over cloud resources, behind a
// `CloudAdapter` trait so provider-native types never leak into the
// orchestration core. The only concrete implementation shipped here is an
// in-memory `MockAdapter` — binding to a real provider SDK is out of scope.
//
// ### 2. Topology Planner (topology.rs)
// Turns a run configuration into a named, ordered list of instance
// descriptors, plus the CIDR, flavor-weight, and availability-zone
// assignment rules. The hostname format is the single source of truth for
// instance ordering, consumed identically by the Planner and the Control
// Plane.
//
// ### 3. Resource Inventory (inventory.rs) and Staging Executor (staging.rs)
// The inventory is the append-only ledger of everything created; the
// Staging Executor drives the Resource Adapter through the fixed
// dependency order, bounding instance creation to a configurable
// concurrency limit.
//
// ### 4. Cleanup Engine (cleanup_engine.rs)
// Reverse-dependency-order teardown with idempotent per-resource retries
// and a persisted cleanup file for anything that could not be deleted.
//
// ### 5. Control Plane (control/)
// The rendezvous HTTP API workers and the Driver poll during staging,
// running, and teardown of a single test: registration, configuration
// distribution, pairing, the start gate, and the results sink.
//
// ### 6. Driver (driver.rs) and Worker Agent (worker/)
// The Driver sequences staging, the registration barrier, configuration
// publication, pairing, result collection, and cleanup. The Worker Agent
// is the long-running loop each staged instance runs: register, wait for
// go, fetch configuration, execute the configured workloads, report
// results.
//
// ### 7. Post-Processor (post.rs)
// A thin collaborator that renders a collected results file; the summary
// statistics and graphing a full post-processor would add are out of
// scope.

pub mod adapter;
pub mod cleanup_engine;
pub mod cli;
pub mod config;
pub mod control;
pub mod credentials;
pub mod driver;
pub mod environment;
pub mod error;
pub mod events;
pub mod inventory;
pub mod logging;
pub mod post;
pub mod run;
pub mod staging;
pub mod topology;
pub mod ui;
pub mod worker;

pub use error::{CpError, CpResult, EnhancedError};
