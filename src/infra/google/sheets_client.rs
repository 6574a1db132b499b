use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::google_api::GoogleApi;
use crate::core::pipeline::{CellValue, ReportSink, ServiceError};

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Google Sheets v4 client for `values.append`.
pub struct SheetsClient {
    api: GoogleApi,
}

impl SheetsClient {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }

    /// A whole-tab A1 range. The name is always quoted (inner `'` doubled)
    /// so tabs containing `!`, `'` or spaces still resolve.
    fn sheet_range(sheet_name: &str) -> String {
        format!("'{}'", sheet_name.replace('\'', "''"))
    }

    /// `.../spreadsheets/{id}/values/{range}:append`. A whole-tab range
    /// means "after the last row of data on that tab".
    fn append_url(spreadsheet_id: &str, sheet_name: &str) -> Result<Url, ServiceError> {
        let mut url =
            Url::parse(SHEETS_BASE_URL).map_err(|e| ServiceError::Malformed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Malformed("cannot build Sheets URL".to_string()))?
            .push(spreadsheet_id)
            .push("values")
            .push(&format!("{}:append", Self::sheet_range(sheet_name)));
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS")
            .append_pair("fields", "updates(updatedRange,updatedCells)");
        Ok(url)
    }

    fn updated_cells(response: AppendResponse) -> Result<u32, ServiceError> {
        let updates = response
            .updates
            .ok_or_else(|| ServiceError::Malformed("append response has no updates".to_string()))?;

        tracing::debug!(range = ?updates.updated_range, "Sheets append");
        Ok(updates.updated_cells.unwrap_or(0))
    }
}

#[async_trait]
impl ReportSink for SheetsClient {
    async fn append_row(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        row: &[CellValue],
    ) -> Result<u32, ServiceError> {
        let body = ValueRange {
            values: vec![row],
        };
        let request = self
            .api
            .client()
            .post(Self::append_url(spreadsheet_id, sheet_name)?)
            .json(&body);

        let response: AppendResponse = self
            .api
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        Self::updated_cells(response)
    }
}

#[derive(Debug, Serialize)]
struct ValueRange<'a> {
    values: Vec<&'a [CellValue]>,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    updates: Option<UpdateValuesResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesResponse {
    updated_range: Option<String>,
    updated_cells: Option<u32>,
}
