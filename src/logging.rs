use std::path::Path;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize the global tracing subscriber.
///
/// `level` is one of the standard tracing level names (`trace`, `debug`, `info`,
/// `warn`, `error`); an unrecognized value falls back to `info`. When `logfile`
/// is set, output is duplicated into that file via a non-blocking writer rather
/// than replacing stderr output.
pub fn init_logging(level: &str, logfile: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let directive = format!("cloudpunch={level}");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive));

    if let Some(path) = logfile {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .compact()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .compact()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;
    }

    tracing::info!("cloudpunch logging initialized at level {level}");
    Ok(())
}

/// Initialize logging, falling back to eprintln-only behavior on setup failure.
pub fn init_logging_safe(level: &str, logfile: Option<&Path>) {
    if let Err(e) = init_logging(level, logfile) {
        eprintln!("warning: failed to initialize logging ({e}), continuing without tracing output");
    }
}
