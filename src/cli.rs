/// Command Line Interface Module
///
/// Defines the command-line surface for the CloudPunch orchestrator using
/// Clap. Each subcommand maps onto one of the five top-level entry points:
/// staging and running a test (`run`), tearing a run's resources down
/// (`cleanup`), re-rendering a prior run's results (`post`), and running the
/// two long-lived daemons (`master`, `worker`).
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "cloudpunch")]
pub struct Cli {
    /// Logging verbosity (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "loglevel", default_value = "info", global = true)]
    pub loglevel: String,
    /// Duplicate log output into this file
    #[arg(short = 'L', long = "logfile", global = true)]
    pub logfile: Option<PathBuf>,
    /// Disable TLS certificate verification on outbound HTTP requests
    #[arg(long, global = true)]
    pub insecure: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Stage an environment, run a test, collect results, and clean up
    Run {
        /// Run configuration YAML file
        #[arg(value_name = "CONFIG_FILE")]
        config_file: PathBuf,
        /// Environment YAML file(s); pass twice to enable split mode
        #[arg(long = "env", value_name = "ENVIRONMENT_FILE", required = true)]
        environment_files: Vec<PathBuf>,
        /// Name for this run (defaults to a generated id)
        #[arg(long)]
        name: Option<String>,
        /// Path to write results to instead of the default location
        #[arg(long)]
        results_file: Option<PathBuf>,
        /// Skip interactive prompts; assume the safest non-destructive answer
        #[arg(long)]
        non_interactive: bool,
        /// Do not tear down resources on successful completion
        #[arg(long)]
        skip_cleanup: bool,
        /// Keep an existing run's environment and only execute the test
        #[arg(long)]
        reuse: Option<PathBuf>,
    },
    /// Tear down resources left by a previous run
    Cleanup {
        /// Name of the run to clean up
        #[arg(value_name = "NAME")]
        name: String,
        /// Environment label to clean up (as recorded in the cleanup file)
        #[arg(long)]
        env: Option<String>,
        /// Load resource ids from this cleanup file instead of the default path
        #[arg(long)]
        cleanup_file: Option<PathBuf>,
        /// Enumerate provider resources by name prefix instead of reading a file
        #[arg(long)]
        search: bool,
    },
    /// Re-render a previously collected results file
    Post {
        /// Results file produced by a prior `run`
        #[arg(value_name = "RESULTS_FILE")]
        results_file: PathBuf,
        /// Output format
        #[arg(long, default_value = "table")]
        format: String,
        /// Write rendered output to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the control plane (rendezvous API) for a staged environment
    Master {
        /// Address to bind the control plane HTTP server on
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        /// Number of servers expected to register (server/client mode)
        #[arg(long, default_value_t = 0)]
        expected_servers: usize,
        /// Number of clients expected to register
        #[arg(long, default_value_t = 0)]
        expected_clients: usize,
    },
    /// Run the worker agent against a control plane
    Worker {
        /// Base URL of the control plane, e.g. http://10.0.0.5:8080
        #[arg(value_name = "CONTROL_URL")]
        control_url: String,
        /// Hostname this worker reports during registration (defaults to the OS hostname)
        #[arg(long)]
        hostname: Option<String>,
        /// Working directory for ad-hoc workload files
        #[arg(long, default_value = "/tmp/cloudpunch")]
        workdir: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_subcommand_parses() {
        let cli = Cli::parse_from([
            "cloudpunch",
            "run",
            "run.yaml",
            "--env",
            "env.yaml",
            "--name",
            "smoke-test",
        ]);
        match cli.command {
            Commands::Run { name, environment_files, .. } => {
                assert_eq!(name.as_deref(), Some("smoke-test"));
                assert_eq!(environment_files.len(), 1);
            }
            _ => panic!("expected Run subcommand"),
        }
    }
}
