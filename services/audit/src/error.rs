//! services/audit/src/error.rs
//!
//! Defines the primary error type for the audit service and its binaries.

use crate::config::ConfigError;
use site_audit_core::OrchestratorError;

/// The primary error type for the `audit` service.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A scan or point edit that the orchestrator refused or could not finish.
    #[error("Scan Error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Represents an error from the underlying HTTP client library.
    #[error("HTTP Client Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_audit_core::PortError;

    #[test]
    fn test_port_failures_arrive_through_the_orchestrator() {
        let err: AuditError =
            OrchestratorError::from(PortError::NotFound("Entry 4 not found".to_string())).into();
        assert!(matches!(
            err,
            AuditError::Orchestrator(OrchestratorError::Port(PortError::NotFound(_)))
        ));
        assert!(err.to_string().contains("Entry 4 not found"));
    }
}
