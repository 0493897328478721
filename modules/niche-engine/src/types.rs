use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// First data row; row 1 holds the headers.
pub const FIRST_DATA_ROW: u32 = 2;

/// Immutable description of one run over a settings tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSpec {
    pub spreadsheet_id: String,
    pub settings_sheet_name: String,
    #[serde(default)]
    pub leads_sheet_name: Option<String>,
    pub start_row: u32,
    pub end_row: u32,
    #[serde(default)]
    pub headers: ColumnHeaders,
}

impl RunSpec {
    pub fn validate(&self) -> EngineResult<()> {
        if self.start_row < FIRST_DATA_ROW || self.end_row < self.start_row {
            return Err(EngineError::InvalidRange {
                start_row: self.start_row,
                end_row: self.end_row,
            });
        }
        Ok(())
    }

    /// Leads tab name, treating a blank name as absent.
    pub fn leads_sheet(&self) -> Option<&str> {
        self.leads_sheet_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn row_numbers(&self) -> Vec<u32> {
        (self.start_row..=self.end_row).collect()
    }
}

/// Settings-tab header names the engine reads from or writes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnHeaders {
    pub dataset_url: String,
    pub api_token: String,
    pub scraped: String,
    pub status: String,
    pub comments: String,
    pub scrape_status: String,
    pub push_status: String,
}

impl Default for ColumnHeaders {
    fn default() -> Self {
        Self {
            dataset_url: "Dataset URL".to_string(),
            api_token: "Apify Token".to_string(),
            scraped: "Scraped".to_string(),
            status: "Status".to_string(),
            comments: "Comments".to_string(),
            scrape_status: "Scrape Status".to_string(),
            push_status: "Push Status".to_string(),
        }
    }
}

impl ColumnHeaders {
    /// The six columns created on the settings tab when missing, in creation order.
    pub fn tracked(&self) -> [&str; 6] {
        [
            self.dataset_url.as_str(),
            self.scraped.as_str(),
            self.status.as_str(),
            self.comments.as_str(),
            self.scrape_status.as_str(),
            self.push_status.as_str(),
        ]
    }
}

/// How one row ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "status",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum RowOutcome {
    Skipped {
        message: String,
    },
    Succeeded {
        message: String,
        dataset_url: String,
        leads: usize,
    },
    Failed {
        message: String,
    },
}

impl RowOutcome {
    pub fn skipped(message: impl Into<String>) -> Self {
        RowOutcome::Skipped {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        RowOutcome::Failed {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RowOutcome::Skipped { message }
            | RowOutcome::Succeeded { message, .. }
            | RowOutcome::Failed { message } => message,
        }
    }

    pub fn leads(&self) -> usize {
        match self {
            RowOutcome::Succeeded { leads, .. } => *leads,
            _ => 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RowOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RowOutcome::Failed { .. })
    }
}

/// A row number paired with its outcome, as reported in `perRow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowReport {
    pub row: u32,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

/// Progress of a run as returned by `start`, `step` and `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub run_id: String,
    pub settings_sheet_name: String,
    pub leads_sheet_name: Option<String>,
    pub start_row: u32,
    pub end_row: u32,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_leads: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub per_row: Vec<RowReport>,
    pub done: bool,
}

/// Acknowledgement for a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAck {
    pub acknowledged: bool,
    pub run_id: Option<String>,
    /// Provider job an abort was requested for, if one was in flight.
    pub aborted_job_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(start_row: u32, end_row: u32) -> RunSpec {
        RunSpec {
            spreadsheet_id: "sheet".into(),
            settings_sheet_name: "Settings".into(),
            leads_sheet_name: Some("  ".into()),
            start_row,
            end_row,
            headers: ColumnHeaders::default(),
        }
    }

    #[test]
    fn range_must_skip_header_and_be_ordered() {
        assert!(spec(2, 2).validate().is_ok());
        assert!(matches!(
            spec(1, 4).validate(),
            Err(EngineError::InvalidRange { start_row: 1, end_row: 4 })
        ));
        assert!(spec(5, 4).validate().is_err());
        assert_eq!(spec(3, 6).row_numbers(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn blank_leads_tab_is_absent() {
        assert_eq!(spec(2, 3).leads_sheet(), None);
    }

    #[test]
    fn spec_json_uses_default_headers() {
        let spec: RunSpec = serde_json::from_str(
            r#"{"spreadsheetId":"abc","settingsSheetName":"Niches","startRow":2,"endRow":5,
                "headers":{"apiToken":"Token"}}"#,
        )
        .unwrap();
        assert_eq!(spec.headers.api_token, "Token");
        assert_eq!(spec.headers.scraped, "Scraped");
        assert!(spec.leads_sheet_name.is_none());
    }

    #[test]
    fn row_report_serializes_flat() {
        let report = RowReport {
            row: 3,
            outcome: RowOutcome::Succeeded {
                message: "ok".into(),
                dataset_url: "https://x".into(),
                leads: 4,
            },
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "row": 3, "status": "succeeded", "message": "ok",
                "datasetUrl": "https://x", "leads": 4
            })
        );
    }
}
