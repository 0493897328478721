pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{DatasetItem, GoogleMapsScraperInput, RunData, RunStatus};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for compass/crawler-google-places.
pub const GOOGLE_MAPS_SCRAPER: &str = "compass~crawler-google-places";

/// Upper bound Apify accepts for `waitForFinish`.
const MAX_WAIT_FOR_FINISH_SECS: u32 = 60;

/// Thin client over the Apify actor-run API.
///
/// Tokens are passed per call: one client serves every credential a batch
/// job uses.
#[derive(Clone)]
pub struct ApifyClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for ApifyClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApifyClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Start an actor run. Returns immediately with run metadata.
    pub async fn start_actor_run<I: Serialize + ?Sized>(
        &self,
        token: &str,
        actor_id: &str,
        input: &I,
    ) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(input)
            .send()
            .await?;

        let api_resp: ApiResponse<RunData> = read_json(resp).await?;
        if api_resp.data.id.is_empty() {
            return Err(ApifyError::MissingField("run id"));
        }
        tracing::info!(actor_id, run_id = %api_resp.data.id, "Apify run started");
        Ok(api_resp.data)
    }

    /// Single status check. `wait_for_finish_secs` lets Apify hold the request
    /// open until the run finishes or the wait elapses (capped at 60s).
    pub async fn get_run(
        &self,
        token: &str,
        run_id: &str,
        wait_for_finish_secs: u32,
    ) -> Result<RunData> {
        let wait = wait_for_finish_secs.min(MAX_WAIT_FOR_FINISH_SECS);
        let url = format!(
            "{}/actor-runs/{}?waitForFinish={}",
            self.base_url, run_id, wait
        );
        let resp = self.client.get(&url).bearer_auth(token).send().await?;

        let api_resp: ApiResponse<RunData> = read_json(resp).await?;
        tracing::debug!(run_id, status = %api_resp.data.status, "Apify run status");
        Ok(api_resp.data)
    }

    /// Ask Apify to abort a run. Aborting a finished run is reported by Apify
    /// as an API error, which callers may ignore.
    pub async fn abort_run(&self, token: &str, run_id: &str) -> Result<RunData> {
        let url = format!("{}/actor-runs/{}/abort", self.base_url, run_id);
        let resp = self.client.post(&url).bearer_auth(token).send().await?;

        let api_resp: ApiResponse<RunData> = read_json(resp).await?;
        tracing::info!(run_id, status = %api_resp.data.status, "Apify run abort requested");
        Ok(api_resp.data)
    }

    /// Fetch every item of a dataset, following offset pagination until a
    /// short page comes back.
    pub async fn get_dataset_items<T: DeserializeOwned>(
        &self,
        token: &str,
        dataset_id: &str,
        page_size: usize,
    ) -> Result<Vec<T>> {
        let page_size = page_size.max(1);
        let mut items: Vec<T> = Vec::new();
        let mut offset = 0usize;

        loop {
            let url = format!(
                "{}/datasets/{}/items?format=json&clean=true&offset={}&limit={}",
                self.base_url, dataset_id, offset, page_size
            );
            let resp = self.client.get(&url).bearer_auth(token).send().await?;
            let page: Vec<T> = read_json(resp).await?;
            let fetched = page.len();
            items.extend(page);

            tracing::debug!(dataset_id, offset, fetched, "Fetched dataset page");
            if fetched < page_size {
                break;
            }
            offset += fetched;
        }

        tracing::info!(dataset_id, count = items.len(), "Fetched dataset items");
        Ok(items)
    }

    /// Shareable download link for a dataset. The token is embedded so the
    /// link works without further authentication.
    pub fn dataset_items_url(&self, token: &str, dataset_id: &str) -> String {
        format!(
            "{}/datasets/{}/items?format=json&clean=true&token={}",
            self.base_url, dataset_id, token
        )
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApifyError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_url_carries_token() {
        let client = ApifyClient::with_base_url("https://api.example.test/v2/");
        assert_eq!(
            client.dataset_items_url("tok", "ds1"),
            "https://api.example.test/v2/datasets/ds1/items?format=json&clean=true&token=tok"
        );
    }
}
