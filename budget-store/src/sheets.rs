//! Google Sheets ledger store (feature `gsheets`).
//!
//! Authenticates with a service account key and talks to the Sheets v4 REST
//! API. Ledgers are worksheets of one spreadsheet, addressed by title.
//!
//! The HTTP client is async; a private current-thread runtime drives it so
//! the sync engine can keep calling the store synchronously.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use budget_core::{A1Range, CURRENCY_PATTERN, CellFormat, LedgerStore, ValueInput};
use reqwest::{Client, RequestBuilder, Url};
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use tracing::{debug, info};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

pub struct SheetsLedgerStore {
    runtime: Runtime,
    http: Client,
    token: String,
    spreadsheet_id: String,
    sheet_ids: HashMap<String, i64>,
}

impl SheetsLedgerStore {
    /// Authenticate and bind to one spreadsheet.
    pub fn connect(service_account_file: &Path, spreadsheet_id: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("starting tokio runtime")?;

        info!("Authenticating with Google Sheets API...");
        let token = runtime.block_on(service_account_token(service_account_file))?;
        info!("Authentication successful");

        Ok(Self {
            runtime,
            http: Client::new(),
            token,
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_ids: HashMap::new(),
        })
    }

    fn url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(SHEETS_API)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("Sheets API base URL cannot take path segments"))?;
            segments.push(&self.spreadsheet_id);
            for segment in tail {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    fn values_url(&self, ledger: &str, range: &str, suffix: &str) -> Result<Url> {
        let a1 = format!("{}{suffix}", sheet_range(ledger, range));
        self.url(&["values", &a1])
    }

    fn send(&self, request: RequestBuilder) -> Result<Value> {
        let request = request.bearer_auth(&self.token);
        self.runtime.block_on(async {
            let response = request.send().await.context("Sheets API request failed")?;
            let status = response.status();
            let body = response.text().await.context("reading Sheets API response")?;
            if !status.is_success() {
                bail!("Sheets API returned {status}: {}", api_error_message(&body));
            }
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&body).context("decoding Sheets API response")
        })
    }

    /// Numeric id of a worksheet, needed by formatting requests.
    fn sheet_id(&mut self, ledger: &str) -> Result<i64> {
        if let Some(id) = self.sheet_ids.get(ledger) {
            return Ok(*id);
        }

        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let meta = self.send(self.http.get(url))?;

        for sheet in meta["sheets"].as_array().into_iter().flatten() {
            let props = &sheet["properties"];
            if let (Some(title), Some(id)) = (props["title"].as_str(), props["sheetId"].as_i64()) {
                self.sheet_ids.insert(title.to_string(), id);
            }
        }

        self.sheet_ids
            .get(ledger)
            .copied()
            .with_context(|| format!("worksheet not found: {ledger}"))
    }
}

impl LedgerStore for SheetsLedgerStore {
    fn get_range(&mut self, ledger: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(ledger, range, "")?;
        let body = self
            .send(self.http.get(url))
            .with_context(|| format!("reading {}", sheet_range(ledger, range)))?;
        Ok(rows_from_values(&body["values"]))
    }

    fn clear_range(&mut self, ledger: &str, range: &str) -> Result<()> {
        let url = self.values_url(ledger, range, ":clear")?;
        self.send(self.http.post(url).json(&json!({})))
            .with_context(|| format!("clearing {}", sheet_range(ledger, range)))?;
        Ok(())
    }

    fn write_range(
        &mut self,
        ledger: &str,
        range: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<()> {
        let a1 = sheet_range(ledger, range);
        let mut url = self.values_url(ledger, range, "")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", input.as_str());

        let body = json!({
            "range": a1,
            "majorDimension": "ROWS",
            "values": rows,
        });
        self.send(self.http.put(url).json(&body))
            .with_context(|| format!("updating {a1}"))?;
        debug!("wrote {} rows to {a1}", rows.len());
        Ok(())
    }

    fn format_column(&mut self, ledger: &str, range: &str, format: CellFormat) -> Result<()> {
        let parsed = A1Range::parse(range)?;
        let sheet_id = self.sheet_id(ledger)?;

        let number_format = match format {
            CellFormat::Currency => json!({ "type": "CURRENCY", "pattern": CURRENCY_PATTERN }),
        };
        let body = json!({
            "requests": [{
                "repeatCell": {
                    "range": grid_range(sheet_id, &parsed),
                    "cell": { "userEnteredFormat": { "numberFormat": number_format } },
                    "fields": "userEnteredFormat.numberFormat",
                }
            }]
        });

        let batch_update = format!("{}:batchUpdate", self.spreadsheet_id);
        let mut url = Url::parse(SHEETS_API)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets API base URL cannot take path segments"))?
            .push(&batch_update);
        self.send(self.http.post(url).json(&body))
            .with_context(|| format!("formatting {}", sheet_range(ledger, range)))?;
        Ok(())
    }
}

async fn service_account_token(path: &Path) -> Result<String> {
    let key = yup_oauth2::read_service_account_key(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .context("building service account authenticator")?;
    let token = auth
        .token(SCOPES)
        .await
        .context("requesting access token")?;
    token
        .token()
        .map(str::to_string)
        .context("access token missing from token response")
}

/// `'Ledger Name'!A2:E`, quoting the title the way Sheets expects.
fn sheet_range(ledger: &str, range: &str) -> String {
    format!("'{}'!{range}", ledger.replace('\'', "''"))
}

/// GridRange uses zero-based, end-exclusive indices; an open end row is omitted.
fn grid_range(sheet_id: i64, range: &A1Range) -> Value {
    let mut grid = json!({
        "sheetId": sheet_id,
        "startRowIndex": range.start_row - 1,
        "startColumnIndex": range.start_col,
        "endColumnIndex": range.end_col + 1,
    });
    if let Some(end) = range.end_row {
        grid["endRowIndex"] = json!(end);
    }
    grid
}

fn rows_from_values(values: &Value) -> Vec<Vec<String>> {
    values
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(cell_text).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_range_quotes_titles() {
        assert_eq!(sheet_range("Expenses", "A2:E"), "'Expenses'!A2:E");
        assert_eq!(sheet_range("Bob's Income", "A2:E"), "'Bob''s Income'!A2:E");
    }

    #[test]
    fn test_grid_range_indices() {
        let closed = grid_range(7, &A1Range::parse("C2:C10").unwrap());
        assert_eq!(closed["startRowIndex"], 1);
        assert_eq!(closed["endRowIndex"], 10);
        assert_eq!(closed["startColumnIndex"], 2);
        assert_eq!(closed["endColumnIndex"], 3);

        let open = grid_range(7, &A1Range::parse("A2:E").unwrap());
        assert!(open.get("endRowIndex").is_none());
    }

    #[test]
    fn test_rows_from_values() {
        let body = json!({ "values": [["2024-01-05", "Coffee Shop", "$4.50"], ["2024-01-06", 12, null]] });
        let rows = rows_from_values(&body["values"]);
        assert_eq!(rows[0][2], "$4.50");
        assert_eq!(rows[1], vec!["2024-01-06", "12", ""]);
        assert!(rows_from_values(&Value::Null).is_empty());
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"code":400,"message":"Unable to parse range: 'Nope'!A2:E"}}"#;
        assert_eq!(api_error_message(body), "Unable to parse range: 'Nope'!A2:E");
        assert_eq!(api_error_message("oops"), "oops");
    }
}
