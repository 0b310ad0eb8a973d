use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::Result;
use crate::models::Transaction;

pub const DB_FILE: &str = "spendlens.db";
pub const TABLE_NAME: &str = "transactions_data";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions_data (
    id INTEGER PRIMARY KEY,
    date TEXT NOT NULL,
    description TEXT,
    amount REAL NOT NULL,
    category TEXT NOT NULL CHECK (category <> ''),
    is_anomaly INTEGER NOT NULL DEFAULT 0
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
    Ok(conn)
}

/// Open the database for queries. `None` until a dataset has been saved, so
/// reads never create the file.
pub fn open_existing(db_path: &Path) -> Result<Option<Connection>> {
    if !db_path.exists() {
        return Ok(None);
    }
    get_connection(db_path).map(Some)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn table_exists(conn: &Connection) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TABLE_NAME],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Replace the whole dataset with `transactions`. Drop, recreate and insert
/// run in one transaction, so readers see either the old rows or the new ones.
pub fn save(conn: &mut Connection, transactions: &[Transaction]) -> Result<usize> {
    let tx = conn.transaction()?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {TABLE_NAME};"))?;
    tx.execute_batch(SCHEMA)?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO transactions_data (date, description, amount, category, is_anomaly) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for t in transactions {
            stmt.execute(rusqlite::params![
                t.date.format("%Y-%m-%d").to_string(),
                t.description,
                t.amount,
                t.category,
                t.is_anomaly,
            ])?;
        }
    }
    tx.commit()?;
    info!(rows = transactions.len(), table = TABLE_NAME, "replaced dataset");
    Ok(transactions.len())
}

pub(crate) fn parse_stored_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Every persisted transaction in insertion order. A missing table reads as empty.
pub fn load_all(conn: &Connection) -> Result<Vec<Transaction>> {
    if !table_exists(conn)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT date, description, amount, category, is_anomaly FROM transactions_data ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let date: String = row.get(0)?;
            Ok(Transaction {
                date: parse_stored_date(0, &date)?,
                description: row.get(1)?,
                amount: row.get(2)?,
                category: row.get(3)?,
                is_anomaly: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct DatasetCounts {
    pub transactions: i64,
    pub anomalies: i64,
}

pub fn count_transactions(conn: &Connection) -> Result<DatasetCounts> {
    if !table_exists(conn)? {
        return Ok(DatasetCounts {
            transactions: 0,
            anomalies: 0,
        });
    }
    let (transactions, anomalies) = conn.query_row(
        "SELECT count(*), COALESCE(SUM(is_anomaly), 0) FROM transactions_data",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(DatasetCounts {
        transactions,
        anomalies,
    })
}
