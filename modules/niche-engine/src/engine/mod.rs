//! Row-by-row run controller.
//!
//! A run walks a fixed range of settings-tab rows, one `step` at a time, so
//! a caller that cannot hold a single long request open can still drive it
//! to completion. Only one run is active per engine. Starting a new run
//! supersedes the old one.
//!
//! Steps are serialized by the run state lock. Cancellation goes through a
//! separate control block so `cancel` never waits behind a step that is
//! polling a job. Each step runs on its own task, so a caller that gives up
//! on a step does not leave a started job behind: the row still gets its
//! outcome and the next step picks up after it.

mod row;
mod state;
mod status;

pub use row::{parse_max_results, split_sub_niches, ALREADY_COMPLETED_MESSAGE};
pub use status::CANCELLED_MESSAGE;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use sheets_client::{find_header, SheetsError};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::settings::EngineSettings;
use crate::traits::{JobProvider, Spreadsheet};
use crate::types::{CancelAck, ProgressSummary, RunSpec, FIRST_DATA_ROW};
use state::{lock, PreparedRun, RunControl, RunState, TrackedColumns};

pub struct RunEngine {
    core: Arc<EngineCore>,
}

/// Shared by the engine handle and the tasks that run its steps.
pub(crate) struct EngineCore {
    jobs: Arc<dyn JobProvider>,
    sheets: Arc<dyn Spreadsheet>,
    settings: EngineSettings,
    state: tokio::sync::Mutex<Option<RunState>>,
    control: Mutex<Option<Arc<RunControl>>>,
    last_summary: Mutex<Option<ProgressSummary>>,
}

impl RunEngine {
    pub fn new(
        jobs: Arc<dyn JobProvider>,
        sheets: Arc<dyn Spreadsheet>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            core: Arc::new(EngineCore {
                jobs,
                sheets,
                settings,
                state: tokio::sync::Mutex::new(None),
                control: Mutex::new(None),
                last_summary: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.core.settings
    }

    /// Begin a new run over `spec`, replacing any active one. The active run
    /// is only touched once the new one has been prepared.
    pub async fn start(&self, spec: RunSpec) -> EngineResult<ProgressSummary> {
        self.core.start(spec).await
    }

    /// Advance the active run by one row, or by one drain batch once it has
    /// been cancelled. The run is discarded as soon as every row has an
    /// outcome; the returned summary then has `done = true`.
    ///
    /// The work runs on a spawned task. Dropping the returned future does not
    /// stop it.
    pub async fn step(&self, run_id: Option<&str>) -> EngineResult<ProgressSummary> {
        let core = self.core.clone();
        let run_id = run_id.map(str::to_string);
        tokio::spawn(async move { core.step(run_id.as_deref()).await })
            .await
            .map_err(|e| {
                error!(error = %e, "Step task did not complete");
                EngineError::StepInterrupted(e.to_string())
            })?
    }

    /// Flag the active run as cancelled and ask the provider to abort its
    /// in-flight job. Safe to call repeatedly or with no active run.
    pub async fn cancel(&self) -> CancelAck {
        self.core.cancel().await
    }

    /// Latest summary of the active run, or of the last finished one.
    /// Does not wait for an in-progress step.
    pub fn status(&self) -> Option<ProgressSummary> {
        lock(&self.core.last_summary).clone()
    }

    pub fn active_run_id(&self) -> Option<String> {
        self.core.current_control().map(|c| c.run_id().to_string())
    }
}

impl EngineCore {
    async fn start(&self, spec: RunSpec) -> EngineResult<ProgressSummary> {
        spec.validate()?;
        if !self.sheets.has_credentials() {
            return Err(EngineError::NotAuthorized);
        }

        let prepared = self.prepare(&spec).await?;

        // Stop the stale run so its in-flight step gives up the lock.
        if let Some(previous) = self.current_control() {
            info!(run_id = previous.run_id(), "Superseding active run");
            self.request_cancel(&previous).await;
        }

        let run_id = Uuid::new_v4().to_string();
        let control = Arc::new(RunControl::new(run_id.clone()));
        let run = RunState::new(spec, control.clone(), prepared);
        let summary = run.summary();

        let mut guard = self.state.lock().await;
        *guard = Some(run);
        *lock(&self.control) = Some(control);
        *lock(&self.last_summary) = Some(summary.clone());

        info!(
            run_id = run_id.as_str(),
            settings_sheet = summary.settings_sheet_name.as_str(),
            start_row = summary.start_row,
            end_row = summary.end_row,
            "Run started"
        );
        Ok(summary)
    }

    async fn step(&self, run_id: Option<&str>) -> EngineResult<ProgressSummary> {
        let mut guard = self.state.lock().await;
        let run = guard.as_mut().ok_or(EngineError::NoActiveRun)?;

        if let Some(requested) = run_id.filter(|id| !id.is_empty()) {
            if requested != run.run_id {
                return Err(EngineError::RunMismatch {
                    active: run.run_id.clone(),
                    requested: requested.to_string(),
                });
            }
        }

        if run.control.is_cancelled() && !run.is_exhausted() {
            self.drain_cancelled(run).await;
        } else if let Some(row) = run.current_row() {
            let outcome = self.process_row(run, row).await;
            run.record(row, outcome);
        }

        if !run.is_exhausted() {
            let summary = run.summary();
            *lock(&self.last_summary) = Some(summary.clone());
            return Ok(summary);
        }

        run.finish();
        let summary = run.summary();
        *guard = None;
        *lock(&self.control) = None;
        *lock(&self.last_summary) = Some(summary.clone());

        info!(
            run_id = summary.run_id.as_str(),
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            total_leads = summary.total_leads,
            "Run finished"
        );
        Ok(summary)
    }

    async fn cancel(&self) -> CancelAck {
        let Some(control) = self.current_control() else {
            info!("Cancel requested with no active run");
            return CancelAck {
                acknowledged: true,
                run_id: None,
                aborted_job_id: None,
            };
        };

        let aborted_job_id = self.request_cancel(&control).await;
        info!(
            run_id = control.run_id(),
            aborted_job_id = aborted_job_id.as_deref(),
            "Run cancelled"
        );
        CancelAck {
            acknowledged: true,
            run_id: Some(control.run_id().to_string()),
            aborted_job_id,
        }
    }

    fn current_control(&self) -> Option<Arc<RunControl>> {
        lock(&self.control).clone()
    }

    async fn request_cancel(&self, control: &RunControl) -> Option<String> {
        control.request_cancel();
        let job = control.in_flight()?;
        if let Err(e) = self.jobs.abort_job(&job.credential, &job.job_id).await {
            warn!(job_id = job.job_id.as_str(), error = %e, "Abort request failed");
        }
        Some(job.job_id)
    }

    /// Resolve tracked columns, snapshot headers and load the dedup set.
    async fn prepare(&self, spec: &RunSpec) -> EngineResult<PreparedRun> {
        let id = spec.spreadsheet_id.as_str();
        let settings_sheet = spec.settings_sheet_name.as_str();

        let mut resolved = [0u32; 6];
        for (slot, header) in resolved.iter_mut().zip(spec.headers.tracked()) {
            *slot = self
                .sheets
                .ensure_header_column(id, settings_sheet, header)
                .await
                .map_err(setup_error)?;
        }
        let settings_headers = self
            .sheets
            .read_row(id, settings_sheet, 1)
            .await
            .map_err(setup_error)?;

        let (leads_headers, seen_keys) = match spec.leads_sheet() {
            None => (Vec::new(), HashSet::new()),
            Some(leads_sheet) => {
                let headers = self
                    .sheets
                    .read_row(id, leads_sheet, 1)
                    .await
                    .map_err(setup_error)?;
                if headers.iter().all(|h| h.trim().is_empty()) {
                    return Err(EngineError::InvalidLeadsTab(leads_sheet.to_string()));
                }
                let keys = match find_header(&headers, &self.settings.sheet.unique_id_header) {
                    Some(column) => self
                        .sheets
                        .read_column(id, leads_sheet, column, FIRST_DATA_ROW)
                        .await
                        .map_err(setup_error)?
                        .into_iter()
                        .map(|key| key.trim().to_string())
                        .filter(|key| !key.is_empty())
                        .collect(),
                    None => HashSet::new(),
                };
                info!(leads_sheet, known_keys = keys.len(), "Loaded dedup keys");
                (headers, keys)
            }
        };

        Ok(PreparedRun {
            columns: TrackedColumns::from_resolved(resolved),
            settings_headers,
            leads_headers,
            seen_keys,
        })
    }
}

fn setup_error(err: anyhow::Error) -> EngineError {
    match err.downcast_ref::<SheetsError>() {
        Some(e) if e.needs_authorization() => EngineError::NotAuthorized,
        _ => EngineError::Setup(err),
    }
}
