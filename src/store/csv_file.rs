use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use axum::async_trait;
use csv::{ReaderBuilder, WriterBuilder};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{
    data_rows, header_row, locate, log_repair, plan_header_repair, GuestStore, HeaderRepair,
    RowId, StoreError, StoredRow,
};
use crate::registration::model::GuestRecord;

pub const DELIMITER: u8 = b';';

/// Semicolon-delimited flat file. One process writes at a time.
pub struct CsvFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || f(&path))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl GuestStore for CsvFileStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        let repair = self
            .blocking(|path| {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    fs::create_dir_all(dir)?;
                }
                let mut rows = read_rows(path)?;
                let repair = plan_header_repair(rows.first().map(Vec::as_slice));
                match repair {
                    HeaderRepair::Intact => return Ok(repair),
                    HeaderRepair::Write => rows = vec![header_row()],
                    HeaderRepair::Replace => rows[0] = header_row(),
                    HeaderRepair::Insert => rows.insert(0, header_row()),
                }
                write_rows_atomic(path, &rows)?;
                Ok(repair)
            })
            .await?;
        log_repair(self.backend(), repair);
        Ok(())
    }

    async fn append(&self, record: &GuestRecord) -> Result<(), StoreError> {
        let bytes = encode_row(&record.to_row())?;
        self.blocking(move |path| append_bytes(path, &bytes)).await?;
        debug!(id = %record.submitted_at_label(), "row appended to file");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<StoredRow>, StoreError> {
        let raw = self.blocking(|path| read_rows(path)).await?;
        Ok(data_rows(raw))
    }

    async fn delete(&self, id: &RowId) -> Result<(), StoreError> {
        let target = id.clone();
        self.blocking(move |path| {
            let mut rows = read_rows(path)?;
            let index =
                locate(&rows, &target).ok_or_else(|| StoreError::NotFound(target.0.clone()))?;
            rows.remove(index);
            write_rows_atomic(path, &rows)
        })
        .await?;
        info!(%id, "row deleted from file");
        Ok(())
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        let removed = self
            .blocking(|path| {
                let count = data_rows(read_rows(path)?).len();
                write_rows_atomic(path, &[header_row()])?;
                Ok(count)
            })
            .await?;
        info!(removed, "file store truncated to header");
        Ok(removed)
    }
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

pub(crate) fn encode_rows<R: AsRef<[String]>>(rows: &[R]) -> Result<Vec<u8>, StoreError> {
    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row.as_ref())?;
    }
    writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))
}

fn encode_row(row: &[String]) -> Result<Vec<u8>, StoreError> {
    encode_rows(&[row])
}

/// Single write on an append-mode handle. On failure the file is cut back
/// to its previous length so no partial row survives.
fn append_bytes(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)?;
    let len = file.metadata()?.len();

    let mut payload = Vec::with_capacity(bytes.len() + 1);
    if len > 0 && !ends_with_newline(&mut file, len)? {
        payload.push(b'\n');
    }
    payload.extend_from_slice(bytes);

    if let Err(e) = file.write_all(&payload).and_then(|()| file.sync_data()) {
        if let Err(rollback) = file.set_len(len) {
            error!(
                path = %path.display(),
                error = %rollback,
                "could not cut back a failed append; the file may end in a partial row"
            );
        }
        return Err(e.into());
    }
    Ok(())
}

fn ends_with_newline(file: &mut File, len: u64) -> Result<bool, StoreError> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Rewrites the whole file through a sibling temp file and a rename.
fn write_rows_atomic<R: AsRef<[String]>>(path: &Path, rows: &[R]) -> Result<(), StoreError> {
    let bytes = encode_rows(rows)?;
    let tmp = path.with_extension("csv.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
