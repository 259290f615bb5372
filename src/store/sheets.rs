use std::time::Duration;

use axum::async_trait;
use reqwest::{Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{
    data_rows, header_row, locate, log_repair, plan_header_repair, GuestStore, HeaderRepair,
    RowId, StoreError, StoredRow,
};
use crate::config::SheetsConfig;
use crate::registration::model::GuestRecord;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Google Sheets v4 backend. Every call is a single request; nothing is retried,
/// since a retried append could land twice.
pub struct SheetsStore {
    client: reqwest::Client,
    api_base: Url,
    spreadsheet_id: String,
    sheet_name: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

impl SheetsStore {
    pub fn new(cfg: SheetsConfig) -> Result<Self, StoreError> {
        let api_base = Url::parse(&cfg.api_base)
            .map_err(|e| StoreError::Unavailable(format!("invalid SHEETS_API_BASE: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(StoreError::Unavailable("SHEETS_API_BASE must be an http(s) url".into()));
        }
        let require = |value: Option<String>, name: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| StoreError::Unavailable(format!("{name} is not set")))
        };
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base,
            spreadsheet_id: require(cfg.spreadsheet_id, "SHEET_ID")?,
            sheet_name: cfg.sheet_name,
            access_token: require(cfg.access_token, "SHEETS_ACCESS_TOKEN")?,
        })
    }

    /// A1 range covering the whole worksheet.
    fn sheet_range(&self) -> String {
        format!("'{}'", self.sheet_name.replace('\'', "''"))
    }

    fn url(&self, tail: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["v4", "spreadsheets"]).extend(tail);
        }
        url
    }

    fn values_url(&self, range: &str) -> Url {
        self.url(&[self.spreadsheet_id.as_str(), "values", range])
    }

    async fn read_values(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let resp = self
            .client
            .get(self.values_url(&self.sheet_range()))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let body: ValueRange = check(resp).await?.json().await?;
        Ok(body.values.into_iter().map(stringify_row).collect())
    }

    async fn sheet_id(&self) -> Result<i64, StoreError> {
        let resp = self
            .client
            .get(self.url(&[self.spreadsheet_id.as_str()]))
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let meta: SpreadsheetMeta = check(resp).await?.json().await?;
        meta.sheets
            .into_iter()
            .find(|s| s.properties.title == self.sheet_name)
            .map(|s| s.properties.sheet_id)
            .ok_or_else(|| StoreError::Remote(format!("worksheet {:?} not found", self.sheet_name)))
    }

    async fn batch_update(&self, request: Value) -> Result<(), StoreError> {
        let batch = format!("{}:batchUpdate", self.spreadsheet_id);
        let resp = self
            .client
            .post(self.url(&[batch.as_str()]))
            .bearer_auth(&self.access_token)
            .json(&json!({ "requests": [request] }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn write_header(&self) -> Result<(), StoreError> {
        let range = format!("{}!A1", self.sheet_range());
        let resp = self
            .client
            .put(self.values_url(&range))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": [header_row()] }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Deletes data rows `[start, end)`, counted from 0 = first row after the header.
    async fn delete_data_rows(&self, start: usize, end: usize) -> Result<(), StoreError> {
        let sheet_id = self.sheet_id().await?;
        self.batch_update(dimension_request("deleteDimension", sheet_id, start + 1, end + 1))
            .await
    }
}

fn dimension_request(kind: &str, sheet_id: i64, start: usize, end: usize) -> Value {
    json!({
        kind: {
            "range": {
                "sheetId": sheet_id,
                "dimension": "ROWS",
                "startIndex": start,
                "endIndex": end,
            }
        }
    })
}

fn stringify_row(row: Vec<Value>) -> Vec<String> {
    row.into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect()
}

async fn check(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(StoreError::Remote(format!("{status}: {snippet}")))
}

#[async_trait]
impl GuestStore for SheetsStore {
    fn backend(&self) -> &'static str {
        "sheets"
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        let rows = self.read_values().await?;
        let repair = plan_header_repair(rows.first().map(Vec::as_slice));
        match repair {
            HeaderRepair::Intact => {}
            HeaderRepair::Write | HeaderRepair::Replace => self.write_header().await?,
            HeaderRepair::Insert => {
                let sheet_id = self.sheet_id().await?;
                self.batch_update(dimension_request("insertDimension", sheet_id, 0, 1))
                    .await?;
                self.write_header().await?;
            }
        }
        log_repair(self.backend(), repair);
        Ok(())
    }

    async fn append(&self, record: &GuestRecord) -> Result<(), StoreError> {
        let range = format!("{}:append", self.sheet_range());
        let resp = self
            .client
            .post(self.values_url(&range))
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": [record.to_row()] }))
            .send()
            .await?;
        check(resp).await?;
        debug!(id = %record.submitted_at_label(), "row appended to spreadsheet");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<StoredRow>, StoreError> {
        Ok(data_rows(self.read_values().await?))
    }

    async fn delete(&self, id: &RowId) -> Result<(), StoreError> {
        let rows = self.read_values().await?;
        let index = locate(&rows, id).ok_or_else(|| StoreError::NotFound(id.0.clone()))?;
        self.delete_data_rows(index - 1, index).await?;
        info!(%id, "row deleted from spreadsheet");
        Ok(())
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        let rows = self.read_values().await?;
        let data = rows.len().saturating_sub(1);
        if data > 0 {
            self.delete_data_rows(0, data).await?;
        }
        info!(removed = data, "spreadsheet truncated to header");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        routing::get,
        Json, Router,
    };

    use super::*;
    use crate::registration::builder::{build_record, tests::valid_single};
    use crate::registration::validators::FieldRules;

    fn config() -> SheetsConfig {
        SheetsConfig {
            api_base: "https://sheets.example.test".into(),
            spreadsheet_id: Some("abc123".into()),
            sheet_name: "Kniha hostů".into(),
            access_token: Some("token".into()),
        }
    }

    #[test]
    fn builds_encoded_values_url() {
        let store = SheetsStore::new(config()).expect("store");
        let range = format!("{}:append", store.sheet_range());
        let url = store.values_url(&range);
        assert!(url
            .as_str()
            .starts_with("https://sheets.example.test/v4/spreadsheets/abc123/values/"));
        assert!(url.as_str().ends_with(":append"));
        assert!(!url.as_str().contains(' '));
    }

    #[test]
    fn quotes_sheet_names_in_ranges() {
        let mut cfg = config();
        cfg.sheet_name = "Guest's list".into();
        let store = SheetsStore::new(cfg).expect("store");
        assert_eq!(store.sheet_range(), "'Guest''s list'");
    }

    #[test]
    fn missing_credentials_are_reported() {
        let mut cfg = config();
        cfg.access_token = None;
        let err = SheetsStore::new(cfg).err().expect("must fail");
        assert!(err.to_string().contains("SHEETS_ACCESS_TOKEN"));
    }

    #[test]
    fn non_string_cells_are_stringified() {
        let row = stringify_row(vec![json!("1. 7. 2025"), json!(2), Value::Null]);
        assert_eq!(row, vec!["1. 7. 2025".to_string(), "2".to_string(), String::new()]);
    }

    #[test]
    fn delete_request_targets_row_span() {
        let req = dimension_request("deleteDimension", 7, 3, 4);
        assert_eq!(req["deleteDimension"]["range"]["sheetId"], 7);
        assert_eq!(req["deleteDimension"]["range"]["startIndex"], 3);
        assert_eq!(req["deleteDimension"]["range"]["endIndex"], 4);
    }

    const SHEET_ID: i64 = 7;

    /// In-process stand-in for the v4 endpoints this store calls.
    #[derive(Default)]
    struct FakeSheet {
        title: String,
        rows: Vec<Vec<String>>,
        calls: Vec<String>,
        batches: Vec<Value>,
        fail_append: Option<StatusCode>,
    }

    type Shared = Arc<Mutex<FakeSheet>>;

    fn first_row(body: &Value) -> Vec<String> {
        body["values"][0]
            .as_array()
            .map(|cells| stringify_row(cells.clone()))
            .unwrap_or_default()
    }

    async fn get_values(State(sheet): State<Shared>) -> Json<Value> {
        let mut sheet = sheet.lock().unwrap();
        sheet.calls.push("get values".into());
        if sheet.rows.is_empty() {
            return Json(json!({ "range": "A1:Z1000" }));
        }
        Json(json!({ "range": "A1:Z1000", "values": sheet.rows }))
    }

    async fn put_values(
        State(sheet): State<Shared>,
        Path((_, range)): Path<(String, String)>,
        Query(q): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let mut sheet = sheet.lock().unwrap();
        let option = q.get("valueInputOption").cloned().unwrap_or_default();
        sheet.calls.push(format!("update {range} {option}"));
        let row = first_row(&body);
        if sheet.rows.is_empty() {
            sheet.rows.push(row);
        } else {
            sheet.rows[0] = row;
        }
        Json(json!({}))
    }

    async fn append_values(
        State(sheet): State<Shared>,
        Path((_, range)): Path<(String, String)>,
        Query(q): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Result<Json<Value>, (StatusCode, String)> {
        let mut sheet = sheet.lock().unwrap();
        let insert = q.get("insertDataOption").cloned().unwrap_or_default();
        sheet.calls.push(format!("append {insert}"));
        assert!(range.ends_with(":append"), "{range}");
        if let Some(status) = sheet.fail_append {
            return Err((status, "backend error".into()));
        }
        sheet.rows.push(first_row(&body));
        Ok(Json(json!({})))
    }

    async fn metadata(State(sheet): State<Shared>) -> Json<Value> {
        let mut sheet = sheet.lock().unwrap();
        sheet.calls.push("metadata".into());
        Json(json!({
            "sheets": [
                { "properties": { "sheetId": 1, "title": "Archive" } },
                { "properties": { "sheetId": SHEET_ID, "title": sheet.title } },
            ]
        }))
    }

    async fn batch_update(
        State(sheet): State<Shared>,
        Path(target): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let mut sheet = sheet.lock().unwrap();
        assert!(target.ends_with(":batchUpdate"), "{target}");
        sheet.calls.push("batch".into());
        for request in body["requests"].as_array().cloned().unwrap_or_default() {
            let (kind, range) = match (&request["insertDimension"], &request["deleteDimension"]) {
                (Value::Object(_), _) => ("insert", &request["insertDimension"]["range"]),
                _ => ("delete", &request["deleteDimension"]["range"]),
            };
            assert_eq!(range["sheetId"], SHEET_ID);
            let start = range["startIndex"].as_u64().unwrap_or(0) as usize;
            let end = range["endIndex"].as_u64().unwrap_or(0) as usize;
            match kind {
                "insert" => {
                    for _ in start..end {
                        sheet.rows.insert(start, Vec::new());
                    }
                }
                _ => {
                    sheet.rows.drain(start..end);
                }
            }
            sheet.batches.push(request);
        }
        Json(json!({}))
    }

    async fn serve_fake(rows: Vec<Vec<String>>) -> (SheetsStore, Shared) {
        let sheet: Shared = Arc::new(Mutex::new(FakeSheet {
            title: "Kniha hostů".into(),
            rows,
            ..FakeSheet::default()
        }));
        let app = Router::new()
            .route(
                "/v4/spreadsheets/:id/values/:range",
                get(get_values).put(put_values).post(append_values),
            )
            .route("/v4/spreadsheets/:id", get(metadata).post(batch_update))
            .with_state(sheet.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let mut cfg = config();
        cfg.api_base = format!("http://{addr}");
        let mut store = SheetsStore::new(cfg).expect("store");
        store.client = reqwest::Client::builder()
            .no_proxy()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("client");
        (store, sheet)
    }

    fn record_at(second: u8) -> GuestRecord {
        let mut record = build_record(&valid_single(), FieldRules::default()).expect("valid");
        record.submitted_at = record.submitted_at.replace_second(second).expect("second");
        record
    }

    fn cells(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_sheet_gets_header_then_one_append_per_record() {
        let (store, sheet) = serve_fake(Vec::new()).await;
        store.initialize().await.expect("init");
        let record = record_at(1);
        store.append(&record).await.expect("append");

        let sheet = sheet.lock().unwrap();
        let appends: Vec<&String> = sheet
            .calls
            .iter()
            .filter(|c| c.starts_with("append"))
            .collect();
        assert_eq!(appends, vec!["append INSERT_ROWS"]);
        assert!(sheet.calls.iter().any(|c| c.ends_with("!A1 RAW")));
        assert_eq!(sheet.rows, vec![header_row(), record.to_row()]);
    }

    #[tokio::test]
    async fn rejected_append_is_a_remote_error_and_not_retried() {
        let (store, sheet) = serve_fake(vec![header_row()]).await;
        sheet.lock().unwrap().fail_append = Some(StatusCode::SERVICE_UNAVAILABLE);

        let err = store.append(&record_at(1)).await.unwrap_err();
        assert!(matches!(&err, StoreError::Remote(msg) if msg.contains("503")), "{err}");

        let sheet = sheet.lock().unwrap();
        assert_eq!(sheet.calls.iter().filter(|c| c.starts_with("append")).count(), 1);
        assert_eq!(sheet.rows, vec![header_row()]);
    }

    #[tokio::test]
    async fn legacy_data_row_gets_header_inserted_above_it() {
        let legacy = cells(&["2025-07-01", "2025-07-04", "1", "Jan Novák"]);
        let (store, sheet) = serve_fake(vec![legacy.clone()]).await;
        store.initialize().await.expect("init");

        let sheet = sheet.lock().unwrap();
        assert_eq!(sheet.rows, vec![header_row(), legacy]);
        assert_eq!(sheet.batches[0]["insertDimension"]["range"]["startIndex"], 0);
        assert_eq!(sheet.batches[0]["insertDimension"]["range"]["endIndex"], 1);
    }

    #[tokio::test]
    async fn outdated_header_is_overwritten_without_row_changes() {
        let data = cells(&["1. 7. 2025", "4. 7. 2025", "1"]);
        let (store, sheet) = serve_fake(vec![cells(&["Příjezd", "Odjezd"]), data.clone()]).await;
        store.initialize().await.expect("init");

        let sheet = sheet.lock().unwrap();
        assert!(sheet.batches.is_empty());
        assert_eq!(sheet.rows, vec![header_row(), data]);
    }

    #[tokio::test]
    async fn delete_targets_the_matching_sheet_row() {
        let rows: Vec<GuestRecord> = (1..=3).map(record_at).collect();
        let mut raw = vec![header_row()];
        raw.extend(rows.iter().map(GuestRecord::to_row));
        let (store, sheet) = serve_fake(raw).await;

        store
            .delete(&RowId(rows[1].submitted_at_label()))
            .await
            .expect("delete");

        let sheet = sheet.lock().unwrap();
        let range = &sheet.batches[0]["deleteDimension"]["range"];
        assert_eq!(range["startIndex"], 2);
        assert_eq!(range["endIndex"], 3);
        assert_eq!(sheet.rows, vec![header_row(), rows[0].to_row(), rows[2].to_row()]);
    }

    #[tokio::test]
    async fn delete_of_unknown_id_sends_no_batch() {
        let (store, sheet) = serve_fake(vec![header_row(), record_at(1).to_row()]).await;
        let err = store
            .delete(&RowId("1. 1. 2000 00:00:00".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(sheet.lock().unwrap().batches.is_empty());
    }

    #[tokio::test]
    async fn delete_all_keeps_the_header() {
        let raw = vec![header_row(), record_at(1).to_row(), record_at(2).to_row()];
        let (store, sheet) = serve_fake(raw).await;
        assert_eq!(store.delete_all().await.expect("purge"), 2);

        let sheet = sheet.lock().unwrap();
        let range = &sheet.batches[0]["deleteDimension"]["range"];
        assert_eq!(range["startIndex"], 1);
        assert_eq!(range["endIndex"], 3);
        assert_eq!(sheet.rows, vec![header_row()]);
    }
}
