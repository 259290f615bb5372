use serde::Serialize;

use crate::registration::model::{OCCUPANT_WIDTH, SUBMITTED_AT_COLUMN};
use crate::store::csv_file::encode_rows;
use crate::store::{header_row, StoreError, StoredRow};

const FIRST_OCCUPANT_COLUMN: usize = 3;
const PHONE_COLUMN: usize = FIRST_OCCUPANT_COLUMN + 2 * OCCUPANT_WIDTH;
const EMAIL_COLUMN: usize = PHONE_COLUMN + 1;

#[derive(Debug, Serialize)]
pub struct GuestExport {
    pub name: String,
    pub birth_date: String,
    pub nationality: String,
    pub purpose: String,
    pub address: String,
    pub document: String,
}

#[derive(Debug, Serialize)]
pub struct ContactExport {
    pub phone: String,
    pub email: String,
}

/// One stay with its guests nested, for third-party reporting.
#[derive(Debug, Serialize)]
pub struct StayExport {
    pub id: String,
    pub arrival: String,
    pub departure: String,
    pub guests: Vec<GuestExport>,
    pub contact: ContactExport,
    pub submitted_at: String,
}

#[derive(Debug, Serialize)]
pub struct GuestbookExport {
    pub stays: Vec<StayExport>,
}

fn guest_at(row: &StoredRow, start: usize) -> Option<GuestExport> {
    let cell = |offset: usize| row.cell(start + offset).to_string();
    let guest = GuestExport {
        name: cell(0),
        birth_date: cell(1),
        nationality: cell(2),
        purpose: cell(3),
        address: cell(4),
        document: cell(5),
    };
    (!guest.name.is_empty()).then_some(guest)
}

pub fn stay_from_row(row: &StoredRow) -> StayExport {
    let guests = [
        FIRST_OCCUPANT_COLUMN,
        FIRST_OCCUPANT_COLUMN + OCCUPANT_WIDTH,
    ]
    .into_iter()
    .filter_map(|start| guest_at(row, start))
    .collect();

    StayExport {
        id: row.id.0.clone(),
        arrival: row.cell(0).to_string(),
        departure: row.cell(1).to_string(),
        guests,
        contact: ContactExport {
            phone: row.cell(PHONE_COLUMN).to_string(),
            email: row.cell(EMAIL_COLUMN).to_string(),
        },
        submitted_at: row.cell(SUBMITTED_AT_COLUMN).to_string(),
    }
}

pub fn hierarchical(rows: &[StoredRow]) -> GuestbookExport {
    GuestbookExport {
        stays: rows.iter().map(stay_from_row).collect(),
    }
}

/// Same delimiter and columns as the live flat file.
pub fn delimited(rows: &[StoredRow]) -> Result<Vec<u8>, StoreError> {
    let mut all = Vec::with_capacity(rows.len() + 1);
    all.push(header_row());
    all.extend(rows.iter().map(|r| r.cells.clone()));
    encode_rows(&all)
}
