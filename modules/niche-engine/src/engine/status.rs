//! Status-cell contents written back to the settings tab.
//!
//! Timestamps stay `DateTime<Utc>` inside the engine and are formatted here,
//! right before they are written.

use chrono::{DateTime, Utc};

use super::state::TrackedColumns;

pub const CANCELLED_MESSAGE: &str = "Cancelled by user";

pub(crate) fn stamp(at: DateTime<Utc>, format: &str) -> String {
    at.format(format).to_string()
}

pub(crate) fn running(at: DateTime<Utc>, format: &str) -> String {
    format!("RUNNING on {}", stamp(at, format))
}

/// Final values for the status columns of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StatusCells {
    pub dataset_url: Option<String>,
    pub scrape_status: String,
    pub comments: String,
    pub status: String,
    pub push_status: String,
    pub scraped: String,
}

impl StatusCells {
    pub fn completed(
        dataset_url: &str,
        leads: usize,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
        format: &str,
    ) -> Self {
        Self {
            dataset_url: Some(dataset_url.to_string()),
            scrape_status: format!("COMPLETED on {}", stamp(finished, format)),
            comments: String::new(),
            status: "Completed".to_string(),
            push_status: push_line(leads, started, finished, format),
            scraped: "Y".to_string(),
        }
    }

    pub fn skipped(
        reason: &str,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
        format: &str,
    ) -> Self {
        Self::unfinished(
            reason.to_string(),
            format!("SKIPPED — {reason}"),
            started,
            finished,
            format,
        )
    }

    pub fn cancelled(started: DateTime<Utc>, finished: DateTime<Utc>, format: &str) -> Self {
        Self::unfinished(
            format!("{CANCELLED_MESSAGE}."),
            "CANCELLED".to_string(),
            started,
            finished,
            format,
        )
    }

    pub fn failed(
        error: &str,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
        format: &str,
    ) -> Self {
        Self::unfinished(error.to_string(), error.to_string(), started, finished, format)
    }

    fn unfinished(
        comments: String,
        push_suffix: String,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
        format: &str,
    ) -> Self {
        Self {
            dataset_url: None,
            scrape_status: format!("FAILED on {}", stamp(finished, format)),
            comments,
            status: "Failed".to_string(),
            push_status: format!("{} — {push_suffix}", push_line(0, started, finished, format)),
            scraped: "N".to_string(),
        }
    }

    /// `(column, value)` pairs in write order. `Scraped` goes last so a row
    /// is never marked done before its other cells are written.
    pub fn cells<'a>(&'a self, columns: &TrackedColumns) -> Vec<(u32, &'a str)> {
        let mut cells = Vec::with_capacity(6);
        if let Some(url) = &self.dataset_url {
            cells.push((columns.dataset_url, url.as_str()));
        }
        cells.extend([
            (columns.scrape_status, self.scrape_status.as_str()),
            (columns.comments, self.comments.as_str()),
            (columns.status, self.status.as_str()),
            (columns.push_status, self.push_status.as_str()),
            (columns.scraped, self.scraped.as_str()),
        ]);
        cells
    }
}

fn push_line(leads: usize, started: DateTime<Utc>, finished: DateTime<Utc>, format: &str) -> String {
    format!(
        "{leads} leads scraped — Started: {}, Finished: {}",
        stamp(started, format),
        stamp(finished, format)
    )
}
