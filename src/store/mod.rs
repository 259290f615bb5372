use std::sync::Arc;

use std::collections::HashMap;

use axum::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::StoreBackend;
use crate::registration::model::{GuestRecord, COLUMNS, SUBMITTED_AT_COLUMN};

lazy_static! {
    // Years, phone and document numbers, timestamps, emails.
    static ref DATA_CELL_RE: Regex = Regex::new(r"[0-9]{3,}|@").unwrap();
}

const GUESTS_COLUMN: usize = 2;

pub mod csv_file;
pub mod memory;
pub mod sheets;

pub use csv_file::CsvFileStore;
pub use memory::MemoryStore;
pub use sheets::SheetsStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet api error: {0}")]
    Remote(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("no row with id {0:?}")]
    NotFound(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Remote(e.to_string())
    }
}

/// Opaque row identifier: the submission timestamp cell of the row. Rows that
/// share a timestamp get `#2`, `#3`, ... appended in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub String);

impl RowId {
    /// Splits into the timestamp and its 1-based occurrence.
    fn parts(&self) -> (&str, usize) {
        if let Some((stamp, n)) = self.0.rsplit_once('#') {
            if let Ok(n) = n.parse::<usize>() {
                if n >= 2 {
                    return (stamp, n);
                }
            }
        }
        (self.0.as_str(), 1)
    }

    fn nth(stamp: &str, occurrence: usize) -> Self {
        if occurrence == 1 {
            RowId(stamp.to_string())
        } else {
            RowId(format!("{stamp}#{occurrence}"))
        }
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One data row as read back from a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRow {
    pub id: RowId,
    pub cells: Vec<String>,
}

impl StoredRow {
    /// Pads rows written under an older, narrower schema.
    pub fn from_cells(mut cells: Vec<String>) -> Self {
        if cells.len() < COLUMNS.len() {
            cells.resize(COLUMNS.len(), String::new());
        }
        Self {
            id: RowId(cells[SUBMITTED_AT_COLUMN].clone()),
            cells,
        }
    }

    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

}

fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

/// Turns raw sink rows (header first) into data rows, dropping blank lines.
pub(crate) fn data_rows(raw: Vec<Vec<String>>) -> Vec<StoredRow> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .skip(1)
        .filter(|cells| !is_blank(cells))
        .map(|cells| {
            let mut row = StoredRow::from_cells(cells);
            let count = seen.entry(row.id.0.clone()).or_insert(0);
            *count += 1;
            row.id = RowId::nth(&row.id.0, *count);
            row
        })
        .collect()
}

/// Index into `raw` (header included) of the row `id` names.
pub(crate) fn locate(raw: &[Vec<String>], id: &RowId) -> Option<usize> {
    let (stamp, occurrence) = id.parts();
    raw.iter()
        .enumerate()
        .skip(1)
        .filter(|(_, cells)| !is_blank(cells))
        .filter(|(_, cells)| cells.get(SUBMITTED_AT_COLUMN).map(String::as_str) == Some(stamp))
        .nth(occurrence - 1)
        .map(|(i, _)| i)
}

pub(crate) fn header_row() -> Vec<String> {
    COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// What `initialize` has to do to the first row of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRepair {
    Intact,
    /// Empty sink.
    Write,
    /// First row is a header from another schema.
    Replace,
    /// First row is data; header goes above it.
    Insert,
}

/// Only a row that positively looks like a header is replaced. Anything that
/// might be data, in whatever date format, keeps its place below a new header.
pub fn plan_header_repair(first_row: Option<&[String]>) -> HeaderRepair {
    let Some(first) = first_row else {
        return HeaderRepair::Write;
    };
    let trimmed: Vec<&str> = first.iter().map(|c| c.trim()).collect();
    if trimmed == COLUMNS {
        return HeaderRepair::Intact;
    }
    if looks_like_header(&trimmed) {
        HeaderRepair::Replace
    } else {
        HeaderRepair::Insert
    }
}

fn looks_like_header(cells: &[&str]) -> bool {
    let mut filled = cells.iter().filter(|c| !c.is_empty()).peekable();
    if filled.peek().is_none() {
        return false;
    }
    if filled.any(|c| DATA_CELL_RE.is_match(c)) {
        return false;
    }
    !matches!(cells.get(GUESTS_COLUMN), Some(&"1") | Some(&"2"))
}

pub(crate) fn log_repair(backend: &str, repair: HeaderRepair) {
    match repair {
        HeaderRepair::Intact => {}
        HeaderRepair::Write => info!(backend, "created guest store with header"),
        HeaderRepair::Replace => warn!(backend, "replaced outdated header row"),
        HeaderRepair::Insert => warn!(backend, "header row missing; inserted above existing rows"),
    }
}

/// Row-oriented, append-only sink for guest records.
#[async_trait]
pub trait GuestStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Ensures the sink exists and starts with the [`COLUMNS`] header.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Writes one row for `record`, or nothing at all.
    async fn append(&self, record: &GuestRecord) -> Result<(), StoreError>;

    /// Data rows in insertion order.
    async fn list_all(&self) -> Result<Vec<StoredRow>, StoreError>;

    async fn delete(&self, id: &RowId) -> Result<(), StoreError>;

    /// Truncates to header only. Returns the number of rows removed.
    async fn delete_all(&self) -> Result<usize, StoreError>;
}

/// Result of connecting to the configured backend at startup.
#[derive(Clone)]
pub enum StoreConnection {
    Connected(Arc<dyn GuestStore>),
    Unavailable(String),
}

impl StoreConnection {
    pub async fn connect(backend: &StoreBackend) -> Self {
        let store: Arc<dyn GuestStore> = match backend {
            StoreBackend::File { path } => Arc::new(CsvFileStore::new(path.clone())),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Sheets(cfg) => match SheetsStore::new(cfg.clone()) {
                Ok(s) => Arc::new(s),
                Err(e) => {
                    error!(error = %e, "spreadsheet backend misconfigured; persistence disabled");
                    return Self::Unavailable(e.to_string());
                }
            },
        };
        Self::initialize(store).await
    }

    pub async fn initialize(store: Arc<dyn GuestStore>) -> Self {
        match store.initialize().await {
            Ok(()) => {
                info!(backend = store.backend(), "guest store connected");
                Self::Connected(store)
            }
            Err(e) => {
                error!(
                    backend = store.backend(),
                    error = %e,
                    "guest store unavailable; persistence disabled"
                );
                Self::Unavailable(e.to_string())
            }
        }
    }

    pub fn handle(&self) -> Result<&Arc<dyn GuestStore>, StoreError> {
        match self {
            Self::Connected(store) => Ok(store),
            Self::Unavailable(reason) => Err(StoreError::Unavailable(reason.clone())),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_repair_plan() {
        assert_eq!(plan_header_repair(None), HeaderRepair::Write);
        assert_eq!(plan_header_repair(Some(&header_row())), HeaderRepair::Intact);
        assert_eq!(
            plan_header_repair(Some(&cells(&["Příjezd", "Odjezd", "Počet osob"]))),
            HeaderRepair::Replace
        );
        assert_eq!(
            plan_header_repair(Some(&cells(&["arrival", "departure", "guests", "guest1_name"]))),
            HeaderRepair::Replace
        );
        assert_eq!(
            plan_header_repair(Some(&cells(&["1. 7. 2025", "4. 7. 2025", "1"]))),
            HeaderRepair::Insert
        );
    }

    #[test]
    fn rows_that_might_be_data_are_never_replaced() {
        let legacy = [
            cells(&["2025-07-01", "2025-07-04", "1", "Jan Novák", "1985-06-15"]),
            cells(&["", "4. 7. 2025", "1", "Jan Novák"]),
            cells(&["07/01/2025", "07/04/2025"]),
            cells(&["", "", "2", "Jan Novák"]),
            cells(&["Jan Novák", "jan@seznam.cz"]),
            cells(&["", ""]),
        ];
        for row in legacy {
            assert_eq!(plan_header_repair(Some(&row)), HeaderRepair::Insert, "{row:?}");
        }
    }

    #[test]
    fn shared_timestamps_get_distinct_ids() {
        let stamp = "1. 7. 2025 10:00:00";
        let mut first = header_row();
        first[3] = "Jan".into();
        first[SUBMITTED_AT_COLUMN] = stamp.into();
        let mut second = first.clone();
        second[3] = "Eva".into();
        let raw = vec![header_row(), first, cells(&[""]), second];

        let rows = data_rows(raw.clone());
        assert_eq!(rows[0].id, RowId(stamp.into()));
        assert_eq!(rows[1].id, RowId(format!("{stamp}#2")));

        assert_eq!(locate(&raw, &rows[0].id), Some(1));
        assert_eq!(locate(&raw, &rows[1].id), Some(3));
        assert_eq!(locate(&raw, &RowId(format!("{stamp}#3"))), None);
    }

    #[test]
    fn short_rows_are_padded() {
        let row = StoredRow::from_cells(cells(&["1. 7. 2025", "4. 7. 2025"]));
        assert_eq!(row.cells.len(), COLUMNS.len());
        assert_eq!(row.id, RowId(String::new()));
    }

    #[test]
    fn data_rows_skip_header_and_blank_lines() {
        let raw = vec![header_row(), cells(&["", ""]), cells(&["1. 7. 2025"])];
        let rows = data_rows(raw);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cell(0), "1. 7. 2025");
    }

    #[tokio::test]
    async fn unavailable_connection_refuses_operations() {
        let conn = StoreConnection::Unavailable("no credentials".into());
        assert!(!conn.is_connected());
        assert!(matches!(conn.handle(), Err(StoreError::Unavailable(_))));
    }
}
