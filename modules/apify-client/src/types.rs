use serde::{Deserialize, Serialize};

/// One item from an Apify dataset. The shape depends on the actor, so it is
/// kept as a raw JSON object.
pub type DatasetItem = serde_json::Map<String, serde_json::Value>;

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Input for the compass/crawler-google-places actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleMapsScraperInput {
    #[serde(rename = "searchStringsArray")]
    pub search_strings: Vec<String>,
    #[serde(rename = "locationQuery")]
    pub location_query: String,
    #[serde(
        rename = "maxCrawledPlacesPerSearch",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_places_per_search: Option<u32>,
    pub language: String,
}

/// Lifecycle status of an actor run, as reported by Apify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum RunStatus {
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "TIMING-OUT")]
    TimingOut,
    #[serde(rename = "TIMED-OUT")]
    TimedOut,
    #[serde(rename = "ABORTING")]
    Aborting,
    #[serde(rename = "ABORTED")]
    Aborted,
}

impl RunStatus {
    /// Terminal statuses never change again; everything else is still in flight.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Aborted | RunStatus::TimedOut
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Ready => "READY",
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
            RunStatus::TimingOut => "TIMING-OUT",
            RunStatus::TimedOut => "TIMED-OUT",
            RunStatus::Aborting => "ABORTING",
            RunStatus::Aborted => "ABORTED",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: RunStatus,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_data_parses_hyphenated_status() {
        let json = r#"{"data":{"id":"r1","status":"TIMED-OUT","defaultDatasetId":"d1","startedAt":"2024-05-01T10:00:00Z","finishedAt":null}}"#;
        let resp: ApiResponse<RunData> = serde_json::from_str(json).unwrap();
        assert_eq!(resp.data.status, RunStatus::TimedOut);
        assert_eq!(resp.data.default_dataset_id.as_deref(), Some("d1"));
    }

    #[test]
    fn only_finished_statuses_are_terminal() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Aborted.is_terminal());
        assert!(RunStatus::TimedOut.is_terminal());
        assert!(!RunStatus::Aborting.is_terminal());
        assert!(!RunStatus::TimingOut.is_terminal());
        assert!(!RunStatus::Ready.is_terminal());
    }

    #[test]
    fn scraper_input_omits_missing_limit() {
        let input = GoogleMapsScraperInput {
            search_strings: vec!["plumber".into()],
            location_query: "Austin, TX".into(),
            max_places_per_search: None,
            language: "en".into(),
        };
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["searchStringsArray"][0], "plumber");
        assert_eq!(value["locationQuery"], "Austin, TX");
        assert!(value.get("maxCrawledPlacesPerSearch").is_none());
    }
}
