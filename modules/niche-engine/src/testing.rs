// Test doubles for the run engine.
//
// Two mocks matching the two trait boundaries:
// - MemorySpreadsheet (Spreadsheet): in-memory tabs with a write log
// - MockJobProvider (JobProvider): scripted job status sequences
//
// Plus `place()` for building provider records.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail, Result};
use apify_client::RunStatus;
use async_trait::async_trait;
use serde_json::json;
use sheets_client::{find_header, next_free_column, SheetsError};

use crate::traits::{ExternalRecord, JobInput, JobProvider, JobSnapshot, Spreadsheet};

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Minimal Google Maps place record.
pub fn place(place_id: &str, title: &str) -> ExternalRecord {
    json!({
        "placeId": place_id,
        "title": title,
        "phone": "+1 (555) 010-0000",
        "categories": ["Plumber", "Contractor"],
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// MemorySpreadsheet
// ---------------------------------------------------------------------------

/// One `write_cell` call as observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub sheet: String,
    pub row: u32,
    pub column: u32,
    pub value: String,
}

#[derive(Default)]
struct MemorySpreadsheetInner {
    tabs: HashMap<String, Vec<Vec<String>>>,
    writes: Vec<CellWrite>,
    appends: Vec<(String, Vec<Vec<String>>)>,
    failing_rows: Vec<u32>,
}

/// Single in-memory spreadsheet. Spreadsheet ids are ignored.
/// Builder pattern: `.with_tab()`, `.unauthorized()`, `.deny_access()`,
/// `.fail_writes_on_row()`.
pub struct MemorySpreadsheet {
    authorized: bool,
    denied: bool,
    inner: Mutex<MemorySpreadsheetInner>,
}

impl Default for MemorySpreadsheet {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySpreadsheet {
    pub fn new() -> Self {
        Self {
            authorized: true,
            denied: false,
            inner: Mutex::new(MemorySpreadsheetInner::default()),
        }
    }

    /// Add a tab. The first row is the header row.
    pub fn with_tab(self, name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        guard(&self.inner).tabs.insert(name.to_string(), rows);
        self
    }

    /// No credentials at all.
    pub fn unauthorized(mut self) -> Self {
        self.authorized = false;
        self
    }

    /// Credentials present but every call is rejected by the remote.
    pub fn deny_access(mut self) -> Self {
        self.denied = true;
        self
    }

    pub fn fail_writes_on_row(self, row: u32) -> Self {
        guard(&self.inner).failing_rows.push(row);
        self
    }

    /// Cell value by 1-based row and column, `""` when absent.
    pub fn cell(&self, tab: &str, row: u32, column: u32) -> String {
        let inner = guard(&self.inner);
        inner
            .tabs
            .get(tab)
            .and_then(|rows| rows.get(row as usize - 1))
            .and_then(|cells| cells.get(column as usize - 1))
            .cloned()
            .unwrap_or_default()
    }

    pub fn cell_by_header(&self, tab: &str, row: u32, header: &str) -> String {
        match find_header(&self.headers(tab), header) {
            Some(column) => self.cell(tab, row, column),
            None => String::new(),
        }
    }

    pub fn headers(&self, tab: &str) -> Vec<String> {
        let inner = guard(&self.inner);
        inner
            .tabs
            .get(tab)
            .and_then(|rows| rows.first())
            .cloned()
            .unwrap_or_default()
    }

    pub fn rows(&self, tab: &str) -> Vec<Vec<String>> {
        guard(&self.inner).tabs.get(tab).cloned().unwrap_or_default()
    }

    /// Every row appended to `tab`, across all batches.
    pub fn appended(&self, tab: &str) -> Vec<Vec<String>> {
        guard(&self.inner)
            .appends
            .iter()
            .filter(|(name, _)| name == tab)
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }

    pub fn append_batches(&self) -> usize {
        guard(&self.inner).appends.len()
    }

    pub fn writes(&self) -> Vec<CellWrite> {
        guard(&self.inner).writes.clone()
    }

    fn check_access(&self) -> Result<()> {
        if !self.authorized {
            return Err(SheetsError::NoAccessToken.into());
        }
        if self.denied {
            return Err(SheetsError::Unauthorized {
                status: 403,
                message: "The caller does not have permission".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn tab_mut<'a>(
    inner: &'a mut MemorySpreadsheetInner,
    tab: &str,
) -> Result<&'a mut Vec<Vec<String>>> {
    inner
        .tabs
        .get_mut(tab)
        .ok_or_else(|| anyhow!("MemorySpreadsheet: no tab named {tab}"))
}

fn set_cell(rows: &mut Vec<Vec<String>>, row: u32, column: u32, value: &str) {
    let (r, c) = (row as usize - 1, column as usize - 1);
    if rows.len() <= r {
        rows.resize(r + 1, Vec::new());
    }
    let cells = &mut rows[r];
    if cells.len() <= c {
        cells.resize(c + 1, String::new());
    }
    cells[c] = value.to_string();
}

#[async_trait]
impl Spreadsheet for MemorySpreadsheet {
    fn has_credentials(&self) -> bool {
        self.authorized
    }

    async fn read_row(&self, _spreadsheet_id: &str, sheet: &str, row: u32) -> Result<Vec<String>> {
        self.check_access()?;
        let mut inner = guard(&self.inner);
        let rows = tab_mut(&mut inner, sheet)?;
        Ok(rows.get(row as usize - 1).cloned().unwrap_or_default())
    }

    async fn read_range(
        &self,
        _spreadsheet_id: &str,
        sheet: &str,
        start_row: u32,
        end_row: u32,
    ) -> Result<Vec<Vec<String>>> {
        self.check_access()?;
        let mut inner = guard(&self.inner);
        let rows = tab_mut(&mut inner, sheet)?;
        Ok((start_row..=end_row)
            .map(|row| rows.get(row as usize - 1).cloned().unwrap_or_default())
            .collect())
    }

    async fn read_column(
        &self,
        _spreadsheet_id: &str,
        sheet: &str,
        column: u32,
        from_row: u32,
    ) -> Result<Vec<String>> {
        self.check_access()?;
        let mut inner = guard(&self.inner);
        let rows = tab_mut(&mut inner, sheet)?;
        Ok(rows
            .iter()
            .skip(from_row as usize - 1)
            .map(|cells| cells.get(column as usize - 1).cloned().unwrap_or_default())
            .collect())
    }

    async fn write_cell(
        &self,
        _spreadsheet_id: &str,
        sheet: &str,
        row: u32,
        column: u32,
        value: &str,
    ) -> Result<()> {
        self.check_access()?;
        let mut inner = guard(&self.inner);
        if inner.failing_rows.contains(&row) {
            bail!("MemorySpreadsheet: write to row {row} rejected");
        }
        inner.writes.push(CellWrite {
            sheet: sheet.to_string(),
            row,
            column,
            value: value.to_string(),
        });
        let rows = tab_mut(&mut inner, sheet)?;
        set_cell(rows, row, column, value);
        Ok(())
    }

    async fn append_rows(
        &self,
        _spreadsheet_id: &str,
        sheet: &str,
        new_rows: &[Vec<String>],
    ) -> Result<()> {
        self.check_access()?;
        let mut inner = guard(&self.inner);
        tab_mut(&mut inner, sheet)?.extend(new_rows.iter().cloned());
        inner.appends.push((sheet.to_string(), new_rows.to_vec()));
        Ok(())
    }

    async fn ensure_header_column(
        &self,
        _spreadsheet_id: &str,
        sheet: &str,
        header: &str,
    ) -> Result<u32> {
        self.check_access()?;
        let mut inner = guard(&self.inner);
        let rows = tab_mut(&mut inner, sheet)?;
        let headers = rows.first().cloned().unwrap_or_default();
        if let Some(column) = find_header(&headers, header) {
            return Ok(column);
        }
        let column = next_free_column(&headers);
        set_cell(rows, 1, column, header);
        Ok(column)
    }
}

// ---------------------------------------------------------------------------
// MockJobProvider
// ---------------------------------------------------------------------------

/// Status sequence for one job. Polls walk the sequence and then keep
/// returning its last entry.
#[derive(Debug, Clone)]
pub struct JobScript {
    statuses: Vec<RunStatus>,
    result_set_id: Option<String>,
}

impl JobScript {
    pub fn new(statuses: Vec<RunStatus>, result_set_id: Option<&str>) -> Self {
        Self {
            statuses,
            result_set_id: result_set_id.map(str::to_string),
        }
    }

    /// One `Running` poll, then `Succeeded`.
    pub fn succeeds(result_set_id: &str) -> Self {
        Self::new(
            vec![RunStatus::Running, RunStatus::Succeeded],
            Some(result_set_id),
        )
    }

    pub fn fails() -> Self {
        Self::new(vec![RunStatus::Running, RunStatus::Failed], None)
    }

    /// Keeps running until aborted.
    pub fn never_finishes(result_set_id: &str) -> Self {
        Self::new(vec![RunStatus::Running], Some(result_set_id))
    }
}

struct ScriptedJob {
    script: JobScript,
    polls: usize,
    aborted: bool,
}

#[derive(Default)]
struct MockJobProviderInner {
    scripts: VecDeque<JobScript>,
    jobs: HashMap<String, ScriptedJob>,
    results: HashMap<String, Vec<ExternalRecord>>,
    started: Vec<(String, JobInput)>,
    aborted: Vec<String>,
    polls: usize,
    start_error: Option<String>,
}

/// Scripted job provider. Each `start_job` consumes the next queued
/// `JobScript`; starting with an empty queue is an error.
/// Builder pattern: `.on_start()`, `.on_results()`, `.fail_starts()`.
#[derive(Default)]
pub struct MockJobProvider {
    inner: Mutex<MockJobProviderInner>,
}

impl MockJobProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(self, script: JobScript) -> Self {
        guard(&self.inner).scripts.push_back(script);
        self
    }

    pub fn on_results(self, result_set_id: &str, records: Vec<ExternalRecord>) -> Self {
        guard(&self.inner)
            .results
            .insert(result_set_id.to_string(), records);
        self
    }

    /// Every `start_job` call fails with `message`.
    pub fn fail_starts(self, message: &str) -> Self {
        guard(&self.inner).start_error = Some(message.to_string());
        self
    }

    /// `(credential, input)` of every started job, in order.
    pub fn started(&self) -> Vec<(String, JobInput)> {
        guard(&self.inner).started.clone()
    }

    pub fn start_count(&self) -> usize {
        guard(&self.inner).started.len()
    }

    pub fn poll_count(&self) -> usize {
        guard(&self.inner).polls
    }

    pub fn aborted(&self) -> Vec<String> {
        guard(&self.inner).aborted.clone()
    }
}

#[async_trait]
impl JobProvider for MockJobProvider {
    async fn start_job(&self, credential: &str, input: &JobInput) -> Result<String> {
        let mut inner = guard(&self.inner);
        if let Some(message) = &inner.start_error {
            bail!("MockJobProvider: {message}");
        }
        let Some(script) = inner.scripts.pop_front() else {
            bail!("MockJobProvider: no job scripted for {:?}", input.search_terms);
        };
        inner
            .started
            .push((credential.to_string(), input.clone()));
        let job_id = format!("job-{}", inner.started.len());
        inner.jobs.insert(
            job_id.clone(),
            ScriptedJob {
                script,
                polls: 0,
                aborted: false,
            },
        );
        Ok(job_id)
    }

    async fn poll_job(&self, _credential: &str, job_id: &str) -> Result<JobSnapshot> {
        let mut inner = guard(&self.inner);
        inner.polls += 1;
        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| anyhow!("MockJobProvider: unknown job {job_id}"))?;

        let status = if job.aborted {
            RunStatus::Aborted
        } else {
            let idx = job.polls.min(job.script.statuses.len().saturating_sub(1));
            job.script
                .statuses
                .get(idx)
                .copied()
                .unwrap_or(RunStatus::Running)
        };
        job.polls += 1;

        Ok(JobSnapshot {
            status,
            result_set_id: job.script.result_set_id.clone(),
        })
    }

    async fn fetch_results(
        &self,
        _credential: &str,
        result_set_id: &str,
    ) -> Result<Vec<ExternalRecord>> {
        guard(&self.inner)
            .results
            .get(result_set_id)
            .cloned()
            .ok_or_else(|| anyhow!("MockJobProvider: no results registered for {result_set_id}"))
    }

    async fn abort_job(&self, _credential: &str, job_id: &str) -> Result<()> {
        let mut inner = guard(&self.inner);
        inner.aborted.push(job_id.to_string());
        if let Some(job) = inner.jobs.get_mut(job_id) {
            job.aborted = true;
        }
        Ok(())
    }

    fn result_url(&self, credential: &str, result_set_id: &str) -> String {
        format!("https://datasets.test/{result_set_id}/items?token={credential}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sheet_range_pads_missing_rows() {
        let sheet = MemorySpreadsheet::new().with_tab(
            "Settings",
            &[&["Location", "Sub-Niches"], &["Austin", "plumbers"]],
        );
        let rows = sheet.read_range("doc", "Settings", 2, 3).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Austin".to_string(), "plumbers".to_string()]);
        assert!(rows[1].is_empty());
    }

    #[tokio::test]
    async fn memory_sheet_header_column_is_idempotent() {
        let sheet = MemorySpreadsheet::new().with_tab("Settings", &[&["Location"]]);
        let first = sheet.ensure_header_column("doc", "Settings", "Scraped").await.unwrap();
        let again = sheet.ensure_header_column("doc", "Settings", "Scraped").await.unwrap();
        assert_eq!(first, 2);
        assert_eq!(again, 2);
        assert_eq!(
            sheet.ensure_header_column("doc", "Settings", "Location").await.unwrap(),
            1
        );
    }
}
