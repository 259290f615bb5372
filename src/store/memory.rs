use axum::async_trait;
use tokio::sync::Mutex;

use super::{
    data_rows, header_row, locate, plan_header_repair, GuestStore, HeaderRepair, RowId,
    StoreError, StoredRow,
};
use crate::registration::model::GuestRecord;

/// Process-local store for tests and demos. Lost on restart.
pub struct MemoryStore {
    rows: Mutex<Vec<Vec<String>>>,
}

impl MemoryStore {
    /// Starts out already holding the header row.
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(vec![header_row()]),
        }
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Raw rows exactly as given, header or not.
    pub(crate) fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GuestStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        match plan_header_repair(rows.first().map(Vec::as_slice)) {
            HeaderRepair::Intact => {}
            HeaderRepair::Write | HeaderRepair::Insert => rows.insert(0, header_row()),
            HeaderRepair::Replace => rows[0] = header_row(),
        }
        Ok(())
    }

    async fn append(&self, record: &GuestRecord) -> Result<(), StoreError> {
        self.rows.lock().await.push(record.to_row());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<StoredRow>, StoreError> {
        Ok(data_rows(self.rows.lock().await.clone()))
    }

    async fn delete(&self, id: &RowId) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        let index = locate(&rows, id).ok_or_else(|| StoreError::NotFound(id.0.clone()))?;
        rows.remove(index);
        Ok(())
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        let mut rows = self.rows.lock().await;
        let removed = rows.len().saturating_sub(1);
        rows.truncate(1);
        Ok(removed)
    }
}
