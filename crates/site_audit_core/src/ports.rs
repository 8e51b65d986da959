//! crates/site_audit_core/src/ports.rs
//!
//! Defines the service contracts (traits) the orchestrator depends on.
//! The scan service, the results view, user confirmation and the clock are
//! all injected, so the orchestrator never touches a socket, a terminal or a
//! real timer directly.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::domain::{
    BatchProgress, EntryId, FixSummary, ResultsPage, ResultsQuery, ScanId,
};

/// Shown when a failure carries no server-supplied message.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred. Please try again.";

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    /// The service answered with `success: false`.
    #[error("Rejected by the scan service: {}", .0.as_deref().unwrap_or("no message"))]
    Rejected(Option<String>),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Item not found: {0}")]
    NotFound(String),
}

impl PortError {
    /// The text to put in front of the user: the server's own message when
    /// there is one, the generic fallback otherwise.
    pub fn user_message(&self) -> String {
        match self {
            PortError::Rejected(Some(message)) | PortError::NotFound(message)
                if !message.trim().is_empty() =>
            {
                message.clone()
            }
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Scan Service Port
//=========================================================================================

/// The remote side that owns scan sessions and findings.
#[async_trait]
pub trait ScanService: Send + Sync {
    /// Allocates a new scan session.
    async fn start_scan(&self) -> PortResult<ScanId>;

    /// Advances the session's cursor by exactly one batch.
    async fn process_batch(&self, scan_id: &ScanId) -> PortResult<BatchProgress>;

    async fn get_results(&self, query: &ResultsQuery) -> PortResult<ResultsPage>;

    async fn update_suggestion(&self, id: EntryId, new_value: &str) -> PortResult<()>;

    async fn delete_entry(&self, id: EntryId) -> PortResult<()>;

    /// Applies the stored suggestions. Entries that cannot be fixed are
    /// counted as failed, not reported as an error.
    async fn apply_fixes(&self, ids: &[EntryId]) -> PortResult<FixSummary>;
}

//=========================================================================================
// Results View Port
//=========================================================================================

/// User-facing messages raised by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    ScanAlreadyRunning,
    NothingSelected,
    ScanComplete,
    ScanCancelled,
    SuggestionSaved,
    EntryDeleted,
    FixesApplied(FixSummary),
    Error(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ScanAlreadyRunning => f.write_str("A scan is already in progress."),
            Notice::NothingSelected => f.write_str("Please select at least one item."),
            Notice::ScanComplete => f.write_str("Scan complete!"),
            Notice::ScanCancelled => f.write_str("Scan stopped."),
            Notice::SuggestionSaved => f.write_str("Suggestion saved."),
            Notice::EntryDeleted => f.write_str("Entry deleted."),
            Notice::FixesApplied(summary) => write!(
                f,
                "Fixed {} item(s), {} failed.",
                summary.fixed, summary.failed
            ),
            Notice::Error(message) => f.write_str(message),
        }
    }
}

/// Renders whatever the orchestrator hands it. Owns no scanning logic.
pub trait ResultsView: Send + Sync {
    fn show_progress(&self, progress: &BatchProgress, percent: u8);

    fn hide_progress(&self);

    fn set_start_enabled(&self, enabled: bool);

    fn render_results(&self, page: &ResultsPage);

    /// Updates a single row in place after a successful edit.
    fn update_row(&self, id: EntryId, suggestion: &str);

    fn remove_row(&self, id: EntryId);

    fn notify(&self, notice: &Notice);
}

//=========================================================================================
// Confirmation and Clock Ports
//=========================================================================================

/// Actions that need an explicit yes from the user before any request is sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    StartScan,
    DeleteEntry(EntryId),
    ApplyFixes { count: usize },
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confirmation::StartScan => f.write_str(
                "This will scan your whole site and may take a while. Continue?",
            ),
            Confirmation::DeleteEntry(id) => write!(f, "Delete entry #{}?", id),
            Confirmation::ApplyFixes { count } => {
                write!(f, "Apply fixes to {} selected item(s)?", count)
            }
        }
    }
}

#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: &Confirmation) -> bool;
}

/// Injectable delay so pacing can be observed and skipped in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// The production `Sleeper`, backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_server_text() {
        let err = PortError::Rejected(Some("not found".to_string()));
        assert_eq!(err.user_message(), "not found");
    }

    #[test]
    fn user_message_falls_back_to_generic() {
        assert_eq!(PortError::Rejected(None).user_message(), GENERIC_ERROR_MESSAGE);
        assert_eq!(
            PortError::Rejected(Some("   ".to_string())).user_message(),
            GENERIC_ERROR_MESSAGE
        );
        assert_eq!(
            PortError::Transport("connection refused".to_string()).user_message(),
            GENERIC_ERROR_MESSAGE
        );
        assert_eq!(
            PortError::Timeout(Duration::from_secs(60)).user_message(),
            GENERIC_ERROR_MESSAGE
        );
    }

    #[test]
    fn fix_summary_notice_reads_naturally() {
        let notice = Notice::FixesApplied(FixSummary { fixed: 3, failed: 1 });
        assert_eq!(notice.to_string(), "Fixed 3 item(s), 1 failed.");
    }
}
