use std::fmt;

/// The five outcomes a provider call can have: distinguishing
/// *transient* from *permanent* is what lets the Staging Executor and
/// Cleanup Engine decide whether to retry.
#[derive(Debug, Clone)]
pub enum AdapterError {
    NotFound(String),
    Forbidden(String),
    Conflict(String),
    Transient(String),
    Permanent(String),
}

impl AdapterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::NotFound(_))
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::NotFound(msg) => write!(f, "not found: {msg}"),
            AdapterError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            AdapterError::Conflict(msg) => write!(f, "conflict: {msg}"),
            AdapterError::Transient(msg) => write!(f, "transient: {msg}"),
            AdapterError::Permanent(msg) => write!(f, "permanent: {msg}"),
        }
    }
}

impl std::error::Error for AdapterError {}

impl From<AdapterError> for crate::error::CpError {
    fn from(err: AdapterError) -> Self {
        crate::error::CpError::Adapter(err.to_string())
    }
}
