use std::collections::HashSet;

use anyhow::{anyhow, bail, Result};
use apify_client::RunStatus;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::state::{InFlightJob, RunControl, RunState};
use super::status::{self, StatusCells, CANCELLED_MESSAGE};
use super::EngineCore;
use crate::file_config::SheetConfig;
use crate::normalize;
use crate::settings::DRAIN_BATCH_SIZE;
use crate::traits::{ExternalRecord, JobInput, JobSnapshot};
use crate::types::RowOutcome;

pub const ALREADY_COMPLETED_MESSAGE: &str = "Already completed";

/// A settings row projected onto the settings header row.
struct RowFields<'a> {
    headers: &'a [String],
    values: &'a [String],
}

impl<'a> RowFields<'a> {
    fn new(headers: &'a [String], values: &'a [String]) -> Self {
        Self { headers, values }
    }

    /// Trimmed cell under `header` (case-insensitive), `""` if absent.
    fn get(&self, header: &str) -> &'a str {
        let wanted = header.trim();
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
            .and_then(|idx| self.values.get(idx))
            .map(|v| v.trim())
            .unwrap_or("")
    }
}

/// Split a free-text sub-niche cell on commas and newlines.
pub fn split_sub_niches(raw: &str) -> Vec<String> {
    raw.split([',', '\n', '\r'])
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// Positive whole number, or `None`. Accepts "50" and "50.0".
pub fn parse_max_results(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return (n > 0).then_some(n);
    }
    let n = raw.parse::<f64>().ok()?;
    (n >= 1.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX)).then_some(n as u32)
}

/// Job credential and input for one row, or the header names of every
/// missing precondition.
fn resolve_job<'a>(
    fields: &RowFields<'_>,
    token_header: &'a str,
    default_token: Option<&str>,
    sheet: &'a SheetConfig,
) -> std::result::Result<(String, JobInput), Vec<&'a str>> {
    let mut missing = Vec::new();

    let token = Some(fields.get(token_header))
        .filter(|t| !t.is_empty())
        .or(default_token.map(str::trim).filter(|t| !t.is_empty()));
    if token.is_none() {
        missing.push(token_header);
    }

    let location = fields.get(&sheet.location_header);
    if location.is_empty() {
        missing.push(sheet.location_header.as_str());
    }

    let search_terms = split_sub_niches(fields.get(&sheet.sub_niches_header));
    if search_terms.is_empty() {
        missing.push(sheet.sub_niches_header.as_str());
    }

    match token {
        Some(token) if missing.is_empty() => Ok((
            token.to_string(),
            JobInput {
                location: location.to_string(),
                search_terms,
                max_results: parse_max_results(fields.get(&sheet.max_results_header)),
            },
        )),
        _ => Err(missing),
    }
}

impl EngineCore {
    /// Full per-row protocol. Never fails; problems become the row outcome.
    pub(super) async fn process_row(&self, state: &mut RunState, row: u32) -> RowOutcome {
        let started = Utc::now();

        let values = match self
            .sheets
            .read_row(&state.spec.spreadsheet_id, &state.spec.settings_sheet_name, row)
            .await
        {
            Ok(values) => values,
            Err(e) => return self.fail_row(state, row, started, e).await,
        };
        let fields = RowFields::new(&state.settings_headers, &values);

        if fields.get(&state.spec.headers.scraped).eq_ignore_ascii_case("y") {
            info!(row, "Row already scraped, skipping");
            return RowOutcome::skipped(ALREADY_COMPLETED_MESSAGE);
        }

        let resolved = resolve_job(
            &fields,
            &state.spec.headers.api_token,
            self.settings.default_token.as_deref(),
            &self.settings.sheet,
        );
        let (token, input) = match resolved {
            Ok(job) => job,
            Err(missing) => {
                let reason = format!("Missing {}", missing.join(", "));
                return self.skip_row(state, row, started, reason).await;
            }
        };

        match self.run_job(state, row, started, &token, &input).await {
            Ok(outcome) => outcome,
            Err(e) => self.fail_row(state, row, started, e).await,
        }
    }

    /// Write off up to `DRAIN_BATCH_SIZE` pending rows of a cancelled run.
    pub(super) async fn drain_cancelled(&self, state: &mut RunState) {
        let now = Utc::now();
        let cells = StatusCells::cancelled(now, now, &self.settings.sheet.timestamp_format);

        let mut drained = 0;
        while drained < DRAIN_BATCH_SIZE {
            let Some(row) = state.current_row() else {
                break;
            };
            if let Err(e) = self.write_status(state, row, &cells).await {
                warn!(row, error = %e, "Failed to write cancellation status");
            }
            state.record(row, RowOutcome::skipped(CANCELLED_MESSAGE));
            drained += 1;
        }

        info!(
            run_id = state.run_id.as_str(),
            drained,
            remaining = state.remaining(),
            "Drained cancelled rows"
        );
    }

    async fn run_job(
        &self,
        state: &mut RunState,
        row: u32,
        started: DateTime<Utc>,
        token: &str,
        input: &JobInput,
    ) -> Result<RowOutcome> {
        let format = &self.settings.sheet.timestamp_format;
        self.sheets
            .write_cell(
                &state.spec.spreadsheet_id,
                &state.spec.settings_sheet_name,
                row,
                state.columns.scrape_status,
                &status::running(Utc::now(), format),
            )
            .await?;

        if state.control.is_cancelled() {
            return self.cancel_row(state, row, started).await;
        }

        let job_id = self.jobs.start_job(token, input).await?;
        info!(row, job_id = job_id.as_str(), location = input.location.as_str(), "Started job");
        state.control.set_in_flight(InFlightJob {
            job_id: job_id.clone(),
            credential: token.to_string(),
        });

        let waited = self.wait_for_job(&state.control, token, &job_id).await;
        state.control.clear_in_flight();

        let Some(snapshot) = waited? else {
            // Cancelled while the job was still running. A concurrent cancel
            // may have raced the in-flight record, so abort here too.
            if let Err(e) = self.jobs.abort_job(token, &job_id).await {
                warn!(job_id = job_id.as_str(), error = %e, "Failed to abort job");
            }
            return self.cancel_row(state, row, started).await;
        };

        if state.control.is_cancelled() || snapshot.status == RunStatus::Aborted {
            return self.cancel_row(state, row, started).await;
        }
        if snapshot.status != RunStatus::Succeeded {
            bail!("Job {job_id} finished with status {}", snapshot.status);
        }

        let result_set_id = snapshot
            .result_set_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("Job {job_id} succeeded without a result set id"))?;
        let records = self.jobs.fetch_results(token, &result_set_id).await?;
        let leads = self.append_new_leads(state, &records).await?;

        let dataset_url = self.jobs.result_url(token, &result_set_id);
        let cells = StatusCells::completed(&dataset_url, leads, started, Utc::now(), format);
        self.write_status(state, row, &cells).await?;

        info!(row, job_id = job_id.as_str(), leads, "Row completed");
        Ok(RowOutcome::Succeeded {
            message: format!("{leads} leads scraped"),
            dataset_url,
            leads,
        })
    }

    /// Poll until the job is terminal. `None` means the run was cancelled
    /// first.
    async fn wait_for_job(
        &self,
        control: &RunControl,
        token: &str,
        job_id: &str,
    ) -> Result<Option<JobSnapshot>> {
        let interval = self.settings.effective_poll_interval();
        loop {
            let snapshot = self.jobs.poll_job(token, job_id).await?;
            if snapshot.status.is_terminal() {
                return Ok(Some(snapshot));
            }
            if control.is_cancelled() {
                return Ok(None);
            }
            debug!(job_id, status = %snapshot.status, "Job still running");
            tokio::time::sleep(interval).await;
        }
    }

    /// Append records whose natural key is new to the leads tab. Returns the
    /// number of rows appended, or the number fetched when there is no leads
    /// tab. Keys only join the seen set after the append succeeds.
    async fn append_new_leads(
        &self,
        state: &mut RunState,
        records: &[ExternalRecord],
    ) -> Result<usize> {
        let Some(leads_sheet) = state.spec.leads_sheet() else {
            return Ok(records.len());
        };

        let mut fresh_keys = HashSet::new();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            if let Some(key) = normalize::natural_key(record) {
                if state.seen_keys.contains(&key) || !fresh_keys.insert(key) {
                    continue;
                }
            }
            rows.push(normalize::row_for_headers(
                record,
                &state.leads_headers,
                &self.settings.sheet.unique_id_header,
            ));
        }

        if !rows.is_empty() {
            self.sheets
                .append_rows(&state.spec.spreadsheet_id, leads_sheet, &rows)
                .await?;
        }

        info!(
            fetched = records.len(),
            appended = rows.len(),
            duplicates = records.len() - rows.len(),
            "Appended leads"
        );
        state.seen_keys.extend(fresh_keys);
        Ok(rows.len())
    }

    async fn skip_row(
        &self,
        state: &RunState,
        row: u32,
        started: DateTime<Utc>,
        reason: String,
    ) -> RowOutcome {
        info!(row, reason = reason.as_str(), "Skipping row");
        let cells = StatusCells::skipped(
            &reason,
            started,
            Utc::now(),
            &self.settings.sheet.timestamp_format,
        );
        match self.write_status(state, row, &cells).await {
            Ok(()) => RowOutcome::skipped(reason),
            Err(e) => self.fail_row(state, row, started, e).await,
        }
    }

    async fn cancel_row(
        &self,
        state: &RunState,
        row: u32,
        started: DateTime<Utc>,
    ) -> Result<RowOutcome> {
        info!(row, "Row cancelled");
        let cells = StatusCells::cancelled(started, Utc::now(), &self.settings.sheet.timestamp_format);
        self.write_status(state, row, &cells).await?;
        Ok(RowOutcome::skipped(CANCELLED_MESSAGE))
    }

    /// Record a row failure. Status writes here are best effort.
    async fn fail_row(
        &self,
        state: &RunState,
        row: u32,
        started: DateTime<Utc>,
        error: anyhow::Error,
    ) -> RowOutcome {
        let message = format!("{error:#}");
        warn!(row, error = message.as_str(), "Row failed");
        let cells = StatusCells::failed(
            &message,
            started,
            Utc::now(),
            &self.settings.sheet.timestamp_format,
        );
        if let Err(e) = self.write_status(state, row, &cells).await {
            warn!(row, error = %e, "Failed to write failure status");
        }
        RowOutcome::failed(message)
    }

    async fn write_status(&self, state: &RunState, row: u32, cells: &StatusCells) -> Result<()> {
        for (column, value) in cells.cells(&state.columns) {
            self.sheets
                .write_cell(
                    &state.spec.spreadsheet_id,
                    &state.spec.settings_sheet_name,
                    row,
                    column,
                    value,
                )
                .await?;
        }
        Ok(())
    }
}
