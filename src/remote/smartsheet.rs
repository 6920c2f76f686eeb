use std::{fmt, time::Duration};

use itertools::Itertools;
use log::debug;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;

use super::{RemoteColumn, RemoteRow, RemoteSchema, RemoteTable, RowId};
use crate::error::RemoteError;

pub const DEFAULT_API_BASE: &str = "https://api.smartsheet.com/2.0";
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
pub const READ_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetResponse {
    name: String,
    #[serde(default)]
    total_row_count: usize,
    #[serde(default)]
    columns: Vec<RemoteColumn>,
    #[serde(default)]
    rows: Vec<RowResponse>,
}

#[derive(Debug, Deserialize)]
struct RowResponse {
    id: RowId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    error_code: Option<i64>,
}

/// Blocking Smartsheet REST client bound to one sheet.
pub struct SmartsheetClient {
    http: Client,
    token: String,
    sheet_id: String,
    base_url: String,
}

impl fmt::Debug for SmartsheetClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartsheetClient")
            .field("sheet_id", &self.sheet_id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SmartsheetClient {
    pub fn new(
        token: impl Into<String>,
        sheet_id: impl Into<String>,
        base_url: Option<&str>,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            sheet_id: sheet_id.into(),
            base_url: base_url
                .unwrap_or(DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub fn sheet_id(&self) -> &str {
        &self.sheet_id
    }

    fn sheet_url(&self) -> String {
        format!("{}/sheets/{}", self.base_url, self.sheet_id)
    }

    fn fetch_sheet(&self) -> Result<SheetResponse, RemoteError> {
        let url = self.sheet_url();
        debug!("GET {url}");
        let response = self.http.get(&url).bearer_auth(&self.token).send()?;
        Ok(check_status(response)?.json()?)
    }
}

impl RemoteTable for SmartsheetClient {
    fn schema(&self) -> Result<RemoteSchema, RemoteError> {
        let sheet = self.fetch_sheet()?;
        Ok(RemoteSchema {
            sheet_name: sheet.name,
            columns: sheet.columns,
            total_row_count: sheet.total_row_count,
        })
    }

    fn row_ids(&self) -> Result<Vec<RowId>, RemoteError> {
        Ok(self.fetch_sheet()?.rows.into_iter().map(|row| row.id).collect())
    }

    fn delete_rows(&self, ids: &[RowId]) -> Result<(), RemoteError> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = format!("{}/rows", self.sheet_url());
        debug!("DELETE {url} ({} ids)", ids.len());
        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("ids", ids.iter().join(",")),
                ("ignoreRowsNotFound", "true".to_string()),
            ])
            .send()?;
        check_status(response)?;
        Ok(())
    }

    fn add_rows(&self, rows: &[RemoteRow]) -> Result<(), RemoteError> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = format!("{}/rows", self.sheet_url());
        debug!("POST {url} ({} rows)", rows.len());
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(rows)
            .send()?;
        check_status(response)?;
        Ok(())
    }
}

fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(RemoteError::Service {
        status: status.as_u16(),
        message: service_message(&body, status.canonical_reason()),
    })
}

fn service_message(body: &str, reason: Option<&str>) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody {
            message,
            error_code: Some(code),
        }) => format!("{message} (error code {code})"),
        Ok(ApiErrorBody { message, .. }) => message,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => reason.unwrap_or("unknown error").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_messages_prefer_the_api_error_body() {
        assert_eq!(
            service_message(r#"{"errorCode":1006,"message":"Not Found"}"#, Some("Not Found")),
            "Not Found (error code 1006)"
        );
        assert_eq!(service_message("gateway down", None), "gateway down");
        assert_eq!(
            service_message("", Some("Too Many Requests")),
            "Too Many Requests"
        );
    }

    #[test]
    fn sheet_payload_parses_columns_and_rows() {
        let body = r#"{
            "id": 1, "name": "Stock", "totalRowCount": 2,
            "columns": [{"id": 11, "title": "ProductCode", "type": "TEXT_NUMBER"}],
            "rows": [{"id": 101, "rowNumber": 1}, {"id": 102, "rowNumber": 2}]
        }"#;
        let sheet: SheetResponse = serde_json::from_str(body).unwrap();
        assert_eq!(sheet.name, "Stock");
        assert_eq!(sheet.columns[0].title, "ProductCode");
        assert_eq!(sheet.rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![101, 102]);
    }

    #[test]
    fn base_url_is_normalized() {
        let client = SmartsheetClient::new("token", "42", Some("http://localhost:9/2.0/")).unwrap();
        assert_eq!(client.sheet_url(), "http://localhost:9/2.0/sheets/42");
        assert!(!format!("{client:?}").contains("token"));
    }
}
