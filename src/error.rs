use std::error::Error as StdError;
use std::fmt;

/// The error taxonomy for CloudPunch's orchestration core.
///
/// Each variant corresponds to one of the failure categories a run can end in;
/// the Driver matches on these to decide exit codes and whether cleanup still
/// fires (it always does).
#[derive(Debug, Clone)]
pub enum CpError {
    Configuration(String),
    ResourceCreation(String),
    ResourceDeletion(String),
    ControlPlaneUnavailable(String),
    RegistrationTimeout(String),
    Workload(String),
    UserStop(String),
    Interrupt(String),
    Adapter(String),
    Io(String),
    Serialization(String),
    Network(String),
}

impl fmt::Display for CpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            CpError::ResourceCreation(msg) => write!(f, "resource creation error: {msg}"),
            CpError::ResourceDeletion(msg) => write!(f, "resource deletion error: {msg}"),
            CpError::ControlPlaneUnavailable(msg) => write!(f, "control plane unavailable: {msg}"),
            CpError::RegistrationTimeout(msg) => write!(f, "registration timeout: {msg}"),
            CpError::Workload(msg) => write!(f, "workload error: {msg}"),
            CpError::UserStop(msg) => write!(f, "stopped by user: {msg}"),
            CpError::Interrupt(msg) => write!(f, "interrupted: {msg}"),
            CpError::Adapter(msg) => write!(f, "adapter error: {msg}"),
            CpError::Io(msg) => write!(f, "io error: {msg}"),
            CpError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            CpError::Network(msg) => write!(f, "network error: {msg}"),
        }
    }
}

impl StdError for CpError {}

/// Adds operator-facing context and suggestions to a `CpError`, the way a CLI
/// wants to present a failure without losing the underlying cause.
#[derive(Debug, Clone)]
pub struct EnhancedError {
    pub error: CpError,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl EnhancedError {
    pub fn new(error: CpError) -> Self {
        Self {
            error,
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(ctx) = &self.context {
            write!(f, "\n  context: {ctx}")?;
        }
        for suggestion in &self.suggestions {
            write!(f, "\n  suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

impl StdError for EnhancedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        None
    }
}

impl From<std::io::Error> for CpError {
    fn from(err: std::io::Error) -> Self {
        CpError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for CpError {
    fn from(err: serde_yaml::Error) -> Self {
        CpError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CpError {
    fn from(err: serde_json::Error) -> Self {
        CpError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for CpError {
    fn from(err: reqwest::Error) -> Self {
        CpError::Network(err.to_string())
    }
}

impl From<anyhow::Error> for CpError {
    fn from(err: anyhow::Error) -> Self {
        CpError::Configuration(err.to_string())
    }
}

pub type CpResult<T> = Result<T, CpError>;

/// Render an error the way the CLI reports fatal failures: the chained
/// `EnhancedError` display plus a blank line for terminal readability.
pub fn display_enhanced_error(err: &EnhancedError) {
    eprintln!("error: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context_and_suggestions() {
        let err = EnhancedError::new(CpError::Configuration("bad yaml".into()))
            .with_context("while loading run.yaml")
            .with_suggestion("check indentation");
        let rendered = err.to_string();
        assert!(rendered.contains("configuration error: bad yaml"));
        assert!(rendered.contains("while loading run.yaml"));
        assert!(rendered.contains("check indentation"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let cp_err: CpError = io_err.into();
        assert!(matches!(cp_err, CpError::Io(_)));
    }
}
