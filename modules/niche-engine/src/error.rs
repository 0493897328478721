use thiserror::Error;

/// Errors surfaced to whoever drives a run. Row-level problems are never
/// errors here; they end up as a row outcome instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Spreadsheet access is not authorized; complete the authorization flow first")]
    NotAuthorized,

    #[error("Leads tab '{0}' has no header row")]
    InvalidLeadsTab(String),

    #[error("Invalid row range {start_row}..={end_row}: rows start at 2 and end_row must be >= start_row")]
    InvalidRange { start_row: u32, end_row: u32 },

    #[error("No active run")]
    NoActiveRun,

    #[error("Run {requested} is not the active run ({active})")]
    RunMismatch { active: String, requested: String },

    #[error("Run setup failed: {0:#}")]
    Setup(anyhow::Error),

    #[error("Step did not complete: {0}")]
    StepInterrupted(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
