use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::types::{ProgressSummary, RowOutcome, RowReport, RunSpec};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolved 1-based settings-tab columns for everything the engine writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrackedColumns {
    pub dataset_url: u32,
    pub scraped: u32,
    pub status: u32,
    pub comments: u32,
    pub scrape_status: u32,
    pub push_status: u32,
}

impl TrackedColumns {
    /// Same order as `ColumnHeaders::tracked`.
    pub fn from_resolved(columns: [u32; 6]) -> Self {
        let [dataset_url, scraped, status, comments, scrape_status, push_status] = columns;
        Self {
            dataset_url,
            scraped,
            status,
            comments,
            scrape_status,
            push_status,
        }
    }
}

/// Job currently being polled, kept so a cancel can abort it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InFlightJob {
    pub job_id: String,
    pub credential: String,
}

/// Cancellation flag and in-flight job of one run. Shared between the
/// stepping task and whoever calls `cancel`, so it lives outside the run
/// state lock.
#[derive(Debug)]
pub(crate) struct RunControl {
    run_id: String,
    cancelled: AtomicBool,
    in_flight: Mutex<Option<InFlightJob>>,
}

impl RunControl {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            cancelled: AtomicBool::new(false),
            in_flight: Mutex::new(None),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn set_in_flight(&self, job: InFlightJob) {
        *lock(&self.in_flight) = Some(job);
    }

    pub fn clear_in_flight(&self) {
        *lock(&self.in_flight) = None;
    }

    pub fn in_flight(&self) -> Option<InFlightJob> {
        lock(&self.in_flight).clone()
    }
}

/// Everything `start` resolves from the spreadsheet before a run begins.
pub(crate) struct PreparedRun {
    pub columns: TrackedColumns,
    pub settings_headers: Vec<String>,
    pub leads_headers: Vec<String>,
    pub seen_keys: HashSet<String>,
}

/// Mutable state of the active run.
pub(crate) struct RunState {
    pub run_id: String,
    pub spec: RunSpec,
    pub control: Arc<RunControl>,
    pub columns: TrackedColumns,
    pub settings_headers: Vec<String>,
    pub leads_headers: Vec<String>,
    /// Natural keys already on the leads tab or appended during this run.
    /// Only ever grows.
    pub seen_keys: HashSet<String>,
    rows: Vec<u32>,
    cursor: usize,
    log: Vec<RowReport>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(spec: RunSpec, control: Arc<RunControl>, prepared: PreparedRun) -> Self {
        let rows = spec.row_numbers();
        Self {
            run_id: control.run_id().to_string(),
            spec,
            control,
            columns: prepared.columns,
            settings_headers: prepared.settings_headers,
            leads_headers: prepared.leads_headers,
            seen_keys: prepared.seen_keys,
            log: Vec::with_capacity(rows.len()),
            rows,
            cursor: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Row under the cursor, `None` once every row has an outcome.
    pub fn current_row(&self) -> Option<u32> {
        self.rows.get(self.cursor).copied()
    }

    pub fn remaining(&self) -> usize {
        self.rows.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.rows.len()
    }

    /// Log the outcome of the row under the cursor and move past it.
    pub fn record(&mut self, row: u32, outcome: RowOutcome) {
        debug_assert_eq!(self.current_row(), Some(row));
        self.log.push(RowReport { row, outcome });
        self.cursor += 1;
    }

    pub fn finish(&mut self) {
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            run_id: self.run_id.clone(),
            settings_sheet_name: self.spec.settings_sheet_name.clone(),
            leads_sheet_name: self.spec.leads_sheet().map(str::to_string),
            start_row: self.spec.start_row,
            end_row: self.spec.end_row,
            processed: self.log.len(),
            skipped: self.log.iter().filter(|r| r.outcome.is_skipped()).count(),
            failed: self.log.iter().filter(|r| r.outcome.is_failed()).count(),
            total_leads: self.log.iter().map(|r| r.outcome.leads()).sum(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            per_row: self.log.clone(),
            done: self.finished_at.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnHeaders;

    fn state(start_row: u32, end_row: u32) -> RunState {
        let spec = RunSpec {
            spreadsheet_id: "doc".into(),
            settings_sheet_name: "Settings".into(),
            leads_sheet_name: None,
            start_row,
            end_row,
            headers: ColumnHeaders::default(),
        };
        let prepared = PreparedRun {
            columns: TrackedColumns::from_resolved([1, 2, 3, 4, 5, 6]),
            settings_headers: Vec::new(),
            leads_headers: Vec::new(),
            seen_keys: HashSet::new(),
        };
        RunState::new(spec, Arc::new(RunControl::new("run-1".into())), prepared)
    }

    #[test]
    fn cursor_walks_forward_and_summary_counts() {
        let mut s = state(2, 4);
        assert_eq!(s.current_row(), Some(2));
        s.record(2, RowOutcome::skipped("already completed"));
        s.record(
            3,
            RowOutcome::Succeeded {
                message: "5 leads scraped".into(),
                dataset_url: "u".into(),
                leads: 5,
            },
        );
        assert_eq!(s.remaining(), 1);
        s.record(4, RowOutcome::failed("boom"));
        assert!(s.is_exhausted());
        assert_eq!(s.current_row(), None);

        let summary = s.summary();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_leads, 5);
        assert!(!summary.done);

        s.finish();
        assert!(s.summary().done);
    }

    #[test]
    fn cancel_flag_and_in_flight_job() {
        let control = RunControl::new("r".into());
        assert!(!control.is_cancelled());
        control.set_in_flight(InFlightJob {
            job_id: "job".into(),
            credential: "tok".into(),
        });
        control.request_cancel();
        control.request_cancel();
        assert!(control.is_cancelled());
        assert_eq!(control.in_flight().map(|j| j.job_id), Some("job".to_string()));
        control.clear_in_flight();
        assert!(control.in_flight().is_none());
    }
}
