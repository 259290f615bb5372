use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::{RowId, StoredRow};

/// Request body for admin login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub secret: String,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub columns: Vec<&'static str>,
    pub order: &'static str,
    pub rows: Vec<StoredRow>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: RowId,
}

#[derive(Debug, Serialize)]
pub struct Notice {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeTicketResponse {
    pub ticket: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub rows: usize,
}

#[derive(Debug, Deserialize)]
pub struct PurgeConfirmRequest {
    pub ticket: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub removed: usize,
}
