// ===================================================================================================
// CloudPunch - Distributed Performance Testing Orchestrator
// ===================================================================================================
//
// CloudPunch stages ephemeral IaaS environments to drive distributed
// performance tests at scale and collects per-worker results. This binary
// wires the five top-level commands (`run`, `cleanup`, `post`, `master`,
// `worker`) onto the orchestration core in `lib.rs`.

mod adapter;
mod cleanup_engine;
mod cli;
mod config;
mod control;
mod credentials;
mod driver;
mod environment;
mod error;
mod events;
mod inventory;
mod logging;
mod post;
mod run;
mod staging;
mod topology;
mod ui;
mod worker;

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use clap::Parser;

use adapter::mock::MockAdapter;
use adapter::CloudAdapter;
use cleanup_engine::{CleanupEngine, CleanupFile};
use cli::{Cli, Commands};
use config::{Config, NetworkMode};
use control::{ControlState, ServerState};
use driver::{ControlClient, RecoveryDecision, ReuseDecision};
use environment::Environment;
use error::{display_enhanced_error, CpError, CpResult, EnhancedError};

/// The control plane's fixed loopback address for an in-process `run`. A
/// real deployment cloud-inits `cloudpunch master` onto the staged master
/// instance instead; see DESIGN.md for why this binary stands it up locally.
const LOCAL_CONTROL_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging_safe(&cli.loglevel, cli.logfile.as_deref());

    let result = match cli.command.clone() {
        Commands::Run { .. } => run_command(&cli).await,
        Commands::Cleanup { .. } => cleanup_command(&cli).await,
        Commands::Post { .. } => post_command(&cli).await,
        Commands::Master { .. } => master_command(&cli).await,
        Commands::Worker { .. } => worker_command(&cli).await,
    };

    if let Err(err) = result {
        display_enhanced_error(&EnhancedError::new(err));
        std::process::exit(1);
    }
}

async fn run_command(cli: &Cli) -> CpResult<()> {
    let Commands::Run {
        config_file,
        environment_files,
        name,
        results_file,
        non_interactive,
        skip_cleanup,
        reuse,
    } = cli.command.clone()
    else {
        unreachable!()
    };

    let config = Config::load_or_default(Some(config_file))?;
    let environments: Vec<Environment> = environment_files
        .iter()
        .map(|path| Environment::load(path))
        .collect::<CpResult<Vec<_>>>()?;
    if environments.is_empty() {
        return Err(CpError::Configuration("at least one --env file is required".into()));
    }
    let split_mode = environments.len() > 1;
    if split_mode && environments.len() != 2 {
        return Err(CpError::Configuration("split mode takes exactly two --env files".into()));
    }
    config.validate_for_environments(environments.len())?;

    let run_name = match &reuse {
        Some(path) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(run::generate_run_id),
        None => name.unwrap_or_else(run::generate_run_id),
    };
    ui::print_section(&format!("cloudpunch run {run_name}"));

    let adapter: Arc<dyn CloudAdapter> = Arc::new(MockAdapter::new());

    let env1 = driver::stage_environment(Arc::clone(&adapter), &run_name, "env1", &config).await?;
    let env2 = if split_mode {
        Some(driver::stage_environment(Arc::clone(&adapter), &run_name, "env2", &config).await?)
    } else {
        None
    };
    // `server_client_mode` alone (no split) already plans both roles into
    // env1's own descriptor list, so the worker total must come from the
    // staged plans rather than a `split_mode` multiplier.
    let total_workers = env1.plan.len() + env2.as_ref().map_or(0, |e| e.plan.len());

    // MockAdapter's staged instances are in-memory handles, not reachable
    // machines capable of running `cloudpunch master` themselves, so the
    // control plane is stood up in-process on loopback for the duration of
    // this run rather than expected to already be listening remotely.
    let control_state = ControlState::new(run_name.clone(), config.network_mode.clone());
    let server_state = ServerState {
        control: control_state,
        loadbalancers: config.loadbalancers.clone(),
        pairing_enabled: split_mode,
    };
    let addr: SocketAddr = LOCAL_CONTROL_ADDR.parse().expect("valid loopback address");
    tokio::spawn(async move {
        if let Err(e) = control::serve(addr, server_state).await {
            tracing::error!("control plane exited: {e}");
        }
    });

    let control = ControlClient::new(format!("http://{LOCAL_CONTROL_ADDR}"), config.retry_count, cli.insecure)?;
    let outcome = drive_run(
        &run_name,
        &env1,
        &control,
        &config,
        total_workers,
        non_interactive,
        results_file.as_deref(),
    )
    .await;

    if !skip_cleanup {
        driver::cleanup_environment(
            Arc::clone(&adapter),
            &env1.inventory,
            &run_name,
            "env1",
            config.retry_count,
            HashMap::new(),
        )
        .await?;
        if let Some(env2) = &env2 {
            driver::cleanup_environment(
                Arc::clone(&adapter),
                &env2.inventory,
                &run_name,
                "env2",
                config.retry_count,
                HashMap::new(),
            )
            .await?;
        }
    }

    outcome
}

async fn drive_run(
    run_name: &str,
    env1: &driver::StagedEnvironment,
    control: &ControlClient,
    config: &Config,
    total_workers: usize,
    non_interactive: bool,
    results_file: Option<&std::path::Path>,
) -> CpResult<()> {
    control.wait_for_health().await?;

    loop {
        let decision = driver::registration_barrier(control, config, total_workers).await?;
        match decision {
            RecoveryDecision::Abort => {
                return Err(CpError::RegistrationTimeout(
                    "operator aborted after a partially registered fleet".into(),
                ));
            }
            RecoveryDecision::Rebuild => {
                ui::print_warning("rebuilding missing instances and re-entering the registration barrier");
                driver::rebuild_missing(env1, control, config).await?;
                continue;
            }
            RecoveryDecision::Ignore | RecoveryDecision::KeepWaiting => break,
        }
    }

    let sink = events::sink_for(&config.datadog);
    let mut config_json = serde_json::to_value(config)?;
    control.publish_config(&config_json).await?;

    // `test_number` starts at 0 for the first run; reuse-mode iterations
    // that keep the same config bump it, which in turn suffixes the
    // results filename from the second run onward (see `write_results_numbered`).
    let mut test_number = 0u32;
    loop {
        if !non_interactive {
            ui::prompt_line("press enter to start the test");
        }
        control.seal_match().await?;
        sink.emit(events::test_start_event(run_name, &config.test));

        let results = driver::collect_results(control, config, total_workers).await?;
        sink.emit(events::test_end_event(run_name, results.len()));
        driver::write_results_numbered(&results, results_file, test_number)?;

        if non_interactive {
            return Ok(());
        }

        match driver::prompt_reuse_decision() {
            ReuseDecision::Same => {
                control.reset_status().await?;
                control.publish_config(&config_json).await?;
                test_number += 1;
            }
            ReuseDecision::Different => {
                let path = ui::prompt_line("path to the new run configuration");
                let new_config = Config::load_or_default(Some(std::path::PathBuf::from(path)))?;
                config_json = serde_json::to_value(&new_config)?;
                control.reset_status().await?;
                control.publish_config(&config_json).await?;
                test_number += 1;
            }
            ReuseDecision::Abort => return Ok(()),
        }
    }
}

async fn cleanup_command(cli: &Cli) -> CpResult<()> {
    let Commands::Cleanup { name, env, cleanup_file, search } = cli.command.clone() else {
        unreachable!()
    };
    let adapter: Arc<dyn CloudAdapter> = Arc::new(MockAdapter::new());
    let engine = CleanupEngine::new(adapter);

    if search {
        let found = engine.search().await?;
        ui::print_info(&format!("found leftover resources of {} kinds matching cloudpunch-", found.len()));
        return Ok(());
    }

    let env_label = env.unwrap_or_else(|| "env1".to_string());
    let path = cleanup_file.unwrap_or_else(|| CleanupFile::path_for(&name, &env_label));
    let file = CleanupFile::load(&path)?;
    let remaining = engine.run_from_file(&file, 3).await;
    remaining.write_if_nonempty(&path)?;
    ui::print_success(&format!("cleanup of {name}/{env_label} complete"));
    Ok(())
}

async fn post_command(cli: &Cli) -> CpResult<()> {
    let Commands::Post { results_file, format, output } = cli.command.clone() else {
        unreachable!()
    };
    let results = post::load_results(&results_file)?;
    post::emit(&results, post::OutputFormat::parse(&format), output.as_deref())
}

async fn master_command(cli: &Cli) -> CpResult<()> {
    let Commands::Master { bind, expected_servers, expected_clients } = cli.command.clone() else {
        unreachable!()
    };
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| CpError::Configuration(format!("invalid --bind address: {e}")))?;
    tracing::info!("expecting {expected_servers} servers and {expected_clients} clients to register");

    let control = ControlState::new(run::generate_run_id(), NetworkMode::Full);
    let state = ServerState {
        control,
        loadbalancers: config::LoadBalancers::default(),
        pairing_enabled: true,
    };
    control::serve(addr, state).await
}

async fn worker_command(cli: &Cli) -> CpResult<()> {
    let Commands::Worker { control_url, hostname, workdir } = cli.command.clone() else {
        unreachable!()
    };
    let hostname = hostname.unwrap_or_else(|| {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "cloudpunch-worker".to_string())
    });
    let internal_ip = local_ip_best_effort();
    let role = role_from_hostname(&hostname);

    let agent = worker::Agent::new(control_url, hostname, internal_ip, None, role, workdir);
    agent.run().await;
}

/// Best-effort local IPv4 address, the way a worker without real cloud
/// metadata still needs something to register with.
fn local_ip_best_effort() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Recover a worker's role from its own hostname: the trailing segment is
/// `master`, or a role letter followed by its instance index.
fn role_from_hostname(hostname: &str) -> String {
    match hostname.rsplit('-').next() {
        Some("master") => "master",
        Some(segment) if segment.starts_with('s') => "server",
        Some(segment) if segment.starts_with('c') => "client",
        _ => "server",
    }
    .to_string()
}
