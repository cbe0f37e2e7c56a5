use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::BotError;
use crate::ledger::LedgerEntry;
use crate::models::OrderRecord;
use crate::Result;

const LEDGER_HEADER: [&str; 7] = ["time", "side", "qty", "price", "fees", "realized_pnl", "net"];
const ORDERS_HEADER: [&str; 6] = ["time", "order_id", "side", "qty", "price", "fees"];

/// Destination for the ledger and order record streams
pub trait RecordSink: Send {
    fn append_ledger(&mut self, entry: &LedgerEntry) -> Result<()>;

    fn append_order(&mut self, record: &OrderRecord) -> Result<()>;
}

/// Append-only CSV files, one per stream
pub struct CsvRecordStore {
    ledger_path: PathBuf,
    orders_path: PathBuf,
}

impl CsvRecordStore {
    /// Open the store, creating either file with its header if missing or empty
    pub fn open(ledger_path: impl AsRef<Path>, orders_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            ledger_path: ledger_path.as_ref().to_path_buf(),
            orders_path: orders_path.as_ref().to_path_buf(),
        };

        ensure_file(&store.ledger_path, &LEDGER_HEADER)?;
        ensure_file(&store.orders_path, &ORDERS_HEADER)?;

        tracing::info!(
            "Record files ready: ledger={} orders={}",
            store.ledger_path.display(),
            store.orders_path.display()
        );

        Ok(store)
    }

    pub fn load_ledger(&self) -> Result<Vec<LedgerEntry>> {
        read_ledger(&self.ledger_path)
    }

    pub fn load_orders(&self) -> Result<Vec<OrderRecord>> {
        let mut reader = csv::Reader::from_path(&self.orders_path)?;
        let records = reader
            .deserialize::<OrderRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl RecordSink for CsvRecordStore {
    fn append_ledger(&mut self, entry: &LedgerEntry) -> Result<()> {
        append_row(&self.ledger_path, entry)
    }

    fn append_order(&mut self, record: &OrderRecord) -> Result<()> {
        append_row(&self.orders_path, record)
    }
}

/// Read every entry of a ledger CSV file
pub fn read_ledger(path: impl AsRef<Path>) -> Result<Vec<LedgerEntry>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let entries = reader
        .deserialize::<LedgerEntry>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    tracing::debug!("Read {} ledger rows from {}", entries.len(), path.display());
    Ok(entries)
}

fn ensure_file(path: &Path, header: &[&str]) -> Result<()> {
    let is_empty = match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    };

    if is_empty {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        writer.write_record(header)?;
        writer.flush()?;
    }

    Ok(())
}

fn append_row<T: Serialize>(path: &Path, row: &T) -> Result<()> {
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| BotError::Persistence(format!("{}: {}", path.display(), e)))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

/// Keeps both streams in memory, for dry runs and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryRecords {
    pub ledger: Vec<LedgerEntry>,
    pub orders: Vec<OrderRecord>,
}

impl RecordSink for MemoryRecords {
    fn append_ledger(&mut self, entry: &LedgerEntry) -> Result<()> {
        self.ledger.push(entry.clone());
        Ok(())
    }

    fn append_order(&mut self, record: &OrderRecord) -> Result<()> {
        self.orders.push(record.clone());
        Ok(())
    }
}
