pub mod a1;
pub mod error;

pub use error::{Result, SheetsError};

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Response body of `GET .../values/{range}`. `values` is omitted by the API
/// when the range is empty.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct ValueRangeBody<'a> {
    range: &'a str,
    #[serde(rename = "majorDimension")]
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

/// Google Sheets client over the v4 values API.
///
/// Holds an OAuth bearer token that can be swapped at runtime once the
/// caller completes authorization.
pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    access_token: RwLock<Option<String>>,
}

impl SheetsClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self::with_base_url(BASE_URL, access_token)
    }

    pub fn with_base_url(base_url: &str, access_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: RwLock::new(access_token.filter(|t| !t.trim().is_empty())),
        }
    }

    /// Replace the bearer token used for every subsequent call.
    pub fn set_access_token(&self, token: String) {
        let mut guard = self
            .access_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(token).filter(|t| !t.trim().is_empty());
    }

    pub fn has_access_token(&self) -> bool {
        self.token().is_ok()
    }

    fn token(&self) -> Result<String> {
        let guard = self
            .access_token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone().ok_or(SheetsError::NoAccessToken)
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str, suffix: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| SheetsError::InvalidRange(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::InvalidRange(self.base_url.clone()))?
            .push(spreadsheet_id)
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    // -----------------------------------------------------------------------
    // Raw values API
    // -----------------------------------------------------------------------

    /// Read a range as rows of display strings.
    pub async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(spreadsheet_id, range, "")?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(self.token()?)
            .send()
            .await?;

        let body: ValueRange = read_json(resp).await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    /// Overwrite a range with raw (unparsed) values.
    pub async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<()> {
        let mut url = self.values_url(spreadsheet_id, range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let resp = self
            .client
            .put(url)
            .bearer_auth(self.token()?)
            .json(&ValueRangeBody {
                range,
                major_dimension: "ROWS",
                values,
            })
            .send()
            .await?;

        let _: serde_json::Value = read_json(resp).await?;
        Ok(())
    }

    /// Append rows after the last populated row of the table at `range`.
    pub async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<()> {
        let mut url = self.values_url(spreadsheet_id, range, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let resp = self
            .client
            .post(url)
            .bearer_auth(self.token()?)
            .json(&ValueRangeBody {
                range,
                major_dimension: "ROWS",
                values,
            })
            .send()
            .await?;

        let _: serde_json::Value = read_json(resp).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Row/column primitives
    // -----------------------------------------------------------------------

    /// One row's cells, left to right. Trailing empty cells are not returned.
    pub async fn read_row(&self, spreadsheet_id: &str, sheet: &str, row: u32) -> Result<Vec<String>> {
        let rows = self
            .get_values(spreadsheet_id, &a1::row_range(sheet, row))
            .await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    /// Rows `start_row..=end_row`. Always returns one entry per requested row.
    pub async fn read_range(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        start_row: u32,
        end_row: u32,
    ) -> Result<Vec<Vec<String>>> {
        if end_row < start_row {
            return Err(SheetsError::InvalidRange(format!("{start_row}:{end_row}")));
        }
        let mut rows = self
            .get_values(spreadsheet_id, &a1::rows_range(sheet, start_row, end_row))
            .await?;
        rows.resize((end_row - start_row + 1) as usize, Vec::new());
        Ok(rows)
    }

    /// Every value in `column` from `from_row` downwards.
    pub async fn read_column(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        column: u32,
        from_row: u32,
    ) -> Result<Vec<String>> {
        let rows = self
            .get_values(spreadsheet_id, &a1::column_from(sheet, column, from_row))
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect())
    }

    pub async fn write_cell(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        row: u32,
        column: u32,
        value: &str,
    ) -> Result<()> {
        self.update_values(
            spreadsheet_id,
            &a1::cell(sheet, row, column),
            &[vec![value.to_string()]],
        )
        .await
    }

    pub async fn append_rows(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        rows: &[Vec<String>],
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.append_values(spreadsheet_id, &format!("{}!A1", a1::quote_sheet(sheet)), rows)
            .await
    }

    /// Find `header` in row 1 (trimmed, case-insensitive) and return its
    /// 1-based column. Writes it to the first column after the last populated
    /// header when absent.
    pub async fn ensure_header_column(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        header: &str,
    ) -> Result<u32> {
        let headers = self.read_row(spreadsheet_id, sheet, 1).await?;
        if let Some(column) = find_header(&headers, header) {
            return Ok(column);
        }

        let column = next_free_column(&headers);
        self.write_cell(spreadsheet_id, sheet, 1, column, header)
            .await?;
        tracing::info!(sheet, header, column = %a1::column_letter(column), "Created header column");
        Ok(column)
    }
}

/// 1-based column of `header` in a header row (trimmed, case-insensitive).
pub fn find_header(headers: &[String], header: &str) -> Option<u32> {
    let wanted = header.trim();
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(wanted))
        .map(|i| i as u32 + 1)
}

/// First column to the right of the last non-blank header.
pub fn next_free_column(headers: &[String]) -> u32 {
    headers
        .iter()
        .rposition(|h| !h.trim().is_empty())
        .map(|i| i as u32 + 2)
        .unwrap_or(1)
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => (if b { "TRUE" } else { "FALSE" }).to_string(),
        other => other.to_string(),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SheetsError::Unauthorized {
                status: status.as_u16(),
                message,
            });
        }
        return Err(SheetsError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let body = resp.text().await?;
    if body.trim().is_empty() {
        return Ok(serde_json::from_str("null")?);
    }
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn header_lookup_ignores_case_and_padding() {
        let headers = row(&["Location", " Scraped ", "Status"]);
        assert_eq!(find_header(&headers, "scraped"), Some(2));
        assert_eq!(find_header(&headers, "STATUS"), Some(3));
        assert_eq!(find_header(&headers, "Comments"), None);
    }

    #[test]
    fn next_free_column_skips_trailing_blanks() {
        assert_eq!(next_free_column(&[]), 1);
        assert_eq!(next_free_column(&row(&["A", "", "C", "", " "])), 4);
    }

    #[test]
    fn values_url_percent_encodes_range() {
        let client = SheetsClient::with_base_url("https://sheets.example.test/v4/spreadsheets", None);
        let url = client
            .values_url("abc", &a1::cell("Niche Settings", 2, 1), ":append")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.test/v4/spreadsheets/abc/values/'Niche%20Settings'!A2:append"
        );
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let client = SheetsClient::new(Some("  ".into()));
        assert!(!client.has_access_token());
        client.set_access_token("ya29.token".into());
        assert!(client.has_access_token());
    }

    #[test]
    fn cells_render_as_display_strings() {
        assert_eq!(cell_to_string(serde_json::json!(12)), "12");
        assert_eq!(cell_to_string(serde_json::json!(true)), "TRUE");
        assert_eq!(cell_to_string(serde_json::Value::Null), "");
    }
}
