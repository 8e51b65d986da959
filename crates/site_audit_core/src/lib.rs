pub mod domain;
pub mod orchestrator;
pub mod ports;

pub use domain::{
    progress_percent, BatchProgress, ClientViewState, EntryId, FixStatus, FixSummary, Origin,
    ResultFilter, ResultRecord, ResultsPage, ResultsQuery, ScanId, ScanTarget, DEFAULT_PER_PAGE,
};
pub use orchestrator::{
    OrchestratorError, OrchestratorSettings, ScanOrchestrator, ScanOutcome, ScanPhase,
};
pub use ports::{
    Confirmation, Confirmer, Notice, PortError, PortResult, ResultsView, ScanService, Sleeper,
    TokioSleeper, GENERIC_ERROR_MESSAGE,
};
