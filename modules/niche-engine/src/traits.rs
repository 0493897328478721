// Trait seams between the run engine and the outside world.
//
// JobProvider: the asynchronous scraping job API (start, poll, fetch, abort).
// Spreadsheet: the handful of row/column primitives the engine needs.
//
// Production impls wrap ApifyClient and SheetsClient; tests use the
// in-memory doubles in `crate::testing`.

use anyhow::Result;
use apify_client::{ApifyClient, GoogleMapsScraperInput, RunStatus};
use async_trait::async_trait;
use sheets_client::SheetsClient;

use crate::file_config::ProviderConfig;

/// One scraped entity as returned by the provider.
pub type ExternalRecord = apify_client::DatasetItem;

/// Search parameters for one job, built from one settings row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInput {
    pub location: String,
    pub search_terms: Vec<String>,
    pub max_results: Option<u32>,
}

/// Result of a single status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: RunStatus,
    pub result_set_id: Option<String>,
}

// ---------------------------------------------------------------------------
// JobProvider
// ---------------------------------------------------------------------------

#[async_trait]
pub trait JobProvider: Send + Sync {
    /// Start a job and return its id.
    async fn start_job(&self, credential: &str, input: &JobInput) -> Result<String>;

    /// One status check. Does not loop.
    async fn poll_job(&self, credential: &str, job_id: &str) -> Result<JobSnapshot>;

    /// Every record of a finished job's result set.
    async fn fetch_results(&self, credential: &str, result_set_id: &str)
        -> Result<Vec<ExternalRecord>>;

    /// Best-effort abort of a running job.
    async fn abort_job(&self, credential: &str, job_id: &str) -> Result<()>;

    /// Shareable link to a result set.
    fn result_url(&self, credential: &str, result_set_id: &str) -> String;
}

/// Runs the Google Maps scraper actor on Apify.
pub struct ApifyJobProvider {
    client: ApifyClient,
    actor_id: String,
    language: String,
    wait_for_finish_secs: u32,
    page_size: usize,
}

impl ApifyJobProvider {
    pub fn new(client: ApifyClient, config: &ProviderConfig) -> Self {
        Self {
            client,
            actor_id: config.actor_id.clone(),
            language: config.language.clone(),
            wait_for_finish_secs: config.wait_for_finish_secs,
            page_size: config.page_size,
        }
    }
}

#[async_trait]
impl JobProvider for ApifyJobProvider {
    async fn start_job(&self, credential: &str, input: &JobInput) -> Result<String> {
        let actor_input = GoogleMapsScraperInput {
            search_strings: input.search_terms.clone(),
            location_query: input.location.clone(),
            max_places_per_search: input.max_results,
            language: self.language.clone(),
        };
        let run = self
            .client
            .start_actor_run(credential, &self.actor_id, &actor_input)
            .await?;
        Ok(run.id)
    }

    async fn poll_job(&self, credential: &str, job_id: &str) -> Result<JobSnapshot> {
        let run = self
            .client
            .get_run(credential, job_id, self.wait_for_finish_secs)
            .await?;
        Ok(JobSnapshot {
            status: run.status,
            result_set_id: run.default_dataset_id,
        })
    }

    async fn fetch_results(
        &self,
        credential: &str,
        result_set_id: &str,
    ) -> Result<Vec<ExternalRecord>> {
        Ok(self
            .client
            .get_dataset_items(credential, result_set_id, self.page_size)
            .await?)
    }

    async fn abort_job(&self, credential: &str, job_id: &str) -> Result<()> {
        match self.client.abort_run(credential, job_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_stale_abort() => {
                tracing::debug!(job_id, error = %e, "Job already finished, nothing to abort");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn result_url(&self, credential: &str, result_set_id: &str) -> String {
        self.client.dataset_items_url(credential, result_set_id)
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

/// Row/column access to one spreadsheet document. Rows and columns are 1-based.
#[async_trait]
pub trait Spreadsheet: Send + Sync {
    /// Whether credentials are present at all. A `false` here means the
    /// caller has to complete authorization before a run can start.
    fn has_credentials(&self) -> bool;

    async fn read_row(&self, spreadsheet_id: &str, sheet: &str, row: u32) -> Result<Vec<String>>;

    async fn read_range(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        start_row: u32,
        end_row: u32,
    ) -> Result<Vec<Vec<String>>>;

    /// Values of one column from `from_row` to the last populated row.
    async fn read_column(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        column: u32,
        from_row: u32,
    ) -> Result<Vec<String>>;

    async fn write_cell(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        row: u32,
        column: u32,
        value: &str,
    ) -> Result<()>;

    async fn append_rows(&self, spreadsheet_id: &str, sheet: &str, rows: &[Vec<String>])
        -> Result<()>;

    /// Column of `header` in row 1, created at the next free column if absent.
    async fn ensure_header_column(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        header: &str,
    ) -> Result<u32>;
}

#[async_trait]
impl Spreadsheet for SheetsClient {
    fn has_credentials(&self) -> bool {
        self.has_access_token()
    }

    async fn read_row(&self, spreadsheet_id: &str, sheet: &str, row: u32) -> Result<Vec<String>> {
        Ok(SheetsClient::read_row(self, spreadsheet_id, sheet, row).await?)
    }

    async fn read_range(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        start_row: u32,
        end_row: u32,
    ) -> Result<Vec<Vec<String>>> {
        Ok(SheetsClient::read_range(self, spreadsheet_id, sheet, start_row, end_row).await?)
    }

    async fn read_column(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        column: u32,
        from_row: u32,
    ) -> Result<Vec<String>> {
        Ok(SheetsClient::read_column(self, spreadsheet_id, sheet, column, from_row).await?)
    }

    async fn write_cell(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        row: u32,
        column: u32,
        value: &str,
    ) -> Result<()> {
        Ok(SheetsClient::write_cell(self, spreadsheet_id, sheet, row, column, value).await?)
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        rows: &[Vec<String>],
    ) -> Result<()> {
        Ok(SheetsClient::append_rows(self, spreadsheet_id, sheet, rows).await?)
    }

    async fn ensure_header_column(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        header: &str,
    ) -> Result<u32> {
        Ok(SheetsClient::ensure_header_column(self, spreadsheet_id, sheet, header).await?)
    }
}
