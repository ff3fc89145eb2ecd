//! Worksheet backed by the Google Sheets v4 REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::Credentials;
use crate::error::SheetError;
use crate::sheet::{Extent, Worksheet};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Option<Vec<Vec<Value>>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValuesBody<'a> {
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Clone)]
pub struct GoogleSheet {
    client: Client,
    credentials: Credentials,
    spreadsheet_id: String,
    title: String,
}

impl GoogleSheet {
    /// Opens a tab by title, or the first tab when no title is given.
    pub async fn open(
        spreadsheet_id: &str,
        worksheet: Option<&str>,
        credentials: Credentials,
    ) -> Result<Self, SheetError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("grade-sheet-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut sheet = Self {
            client,
            credentials,
            spreadsheet_id: spreadsheet_id.to_string(),
            title: worksheet.unwrap_or_default().to_string(),
        };
        if sheet.title.is_empty() {
            sheet.title = sheet.first_tab_title().await?;
        }
        tracing::info!(spreadsheet = %sheet.spreadsheet_id, tab = %sheet.title, "opened worksheet");
        Ok(sheet)
    }

    async fn first_tab_title(&self) -> Result<String, SheetError> {
        let mut url = self.spreadsheet_url()?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        let meta: SpreadsheetMeta = self.send(self.request(Method::GET, url).await?).await?;
        meta.sheets
            .into_iter()
            .next()
            .map(|s| s.properties.title)
            .ok_or_else(|| SheetError::Api {
                status: 404,
                message: format!("spreadsheet {} has no tabs", self.spreadsheet_id),
            })
    }

    fn spreadsheet_url(&self) -> Result<Url, SheetError> {
        let mut url = Url::parse(API_BASE).map_err(|e| SheetError::Api {
            status: 0,
            message: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|()| SheetError::Api {
                status: 0,
                message: "API base cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .push(&self.spreadsheet_id);
        Ok(url)
    }

    /// `…/values/{range}{suffix}`, with the range percent-encoded as one segment.
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, SheetError> {
        let mut url = self.spreadsheet_url()?;
        url.path_segments_mut()
            .map_err(|()| SheetError::Api {
                status: 0,
                message: "API base cannot carry a path".to_string(),
            })?
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    fn range(&self, cells: &str) -> String {
        a1_range(&self.title, cells)
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, SheetError> {
        let token = self.credentials.access_token(&self.client).await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SheetError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SheetError::Api {
                status: status.as_u16(),
                message: api_error_message(&message),
            });
        }
        Ok(response.json().await?)
    }

    async fn put_values(&self, range: &str, rows: &[Vec<String>]) -> Result<(), SheetError> {
        let mut url = self.values_url(range, "")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        let body = ValuesBody {
            major_dimension: "ROWS",
            values: rows,
        };
        let _: Value = self
            .send(self.request(Method::PUT, url).await?.json(&body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Worksheet for GoogleSheet {
    async fn read_all(&self) -> Result<Vec<Vec<String>>, SheetError> {
        let url = self.values_url(&self.range(""), "")?;
        let range: ValueRange = self.send(self.request(Method::GET, url).await?).await?;
        Ok(range_to_rows(range))
    }

    async fn write_header(&self, header: &[String]) -> Result<(), SheetError> {
        self.put_values(&self.range("1:1"), &[header.to_vec()]).await
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), SheetError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut url = self.values_url(&self.range("A1"), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = ValuesBody {
            major_dimension: "ROWS",
            values: rows,
        };
        let _: Value = self
            .send(self.request(Method::POST, url).await?.json(&body))
            .await?;
        tracing::debug!(rows = rows.len(), "appended rows");
        Ok(())
    }

    async fn replace_all(&self, rows: &[Vec<String>], previous: Extent) -> Result<(), SheetError> {
        // One write covering the old grid: no window where the tab is cleared.
        let payload = blank_padded(rows, previous);
        self.put_values(&self.range("A1"), &payload).await
    }
}

/// Quotes a tab title for A1 notation; empty `cells` means the whole tab.
pub fn a1_range(title: &str, cells: &str) -> String {
    let quoted = format!("'{}'", title.replace('\'', "''"));
    if cells.is_empty() {
        quoted
    } else {
        format!("{quoted}!{cells}")
    }
}

fn range_to_rows(range: ValueRange) -> Vec<Vec<String>> {
    range
        .values
        .unwrap_or_default()
        .into_iter()
        .map(|row| row.into_iter().map(cell_to_string).collect())
        .collect()
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pads `rows` with empty cells out to `previous` so stale cells are blanked.
pub fn blank_padded(rows: &[Vec<String>], previous: Extent) -> Vec<Vec<String>> {
    let width = Extent::of(rows).cols.max(previous.cols);
    let height = rows.len().max(previous.rows);
    (0..height)
        .map(|i| {
            let mut row = rows.get(i).cloned().unwrap_or_default();
            row.resize(width, String::new());
            row
        })
        .collect()
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
