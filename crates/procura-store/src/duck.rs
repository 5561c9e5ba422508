//! DuckDB tender store.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use duckdb::types::Value as SqlValue;
use duckdb::{params_from_iter, Connection, ToSql};
use serde::Serialize;
use tracing::{debug, info};

use crate::query::{Param, TenderQuery};
use crate::row::StoredTender;
use crate::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tenders (
    external_id          VARCHAR PRIMARY KEY,
    title                VARCHAR NOT NULL,
    status               VARCHAR NOT NULL,
    amount               DOUBLE  NOT NULL,
    currency             VARCHAR NOT NULL,
    start_date           VARCHAR,
    end_date             VARCHAR,
    release_date         VARCHAR,
    contract_count       BIGINT  NOT NULL,
    item_count           BIGINT  NOT NULL,
    milestone_count      BIGINT  NOT NULL,
    transaction_count    BIGINT  NOT NULL,
    purchase_order_count BIGINT  NOT NULL,
    award_value          DOUBLE  NOT NULL,
    complexity           BIGINT  NOT NULL,
    payload              VARCHAR NOT NULL
);";

const UPSERT: &str = "
INSERT INTO tenders VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (external_id) DO UPDATE SET
    title = EXCLUDED.title,
    status = EXCLUDED.status,
    amount = EXCLUDED.amount,
    currency = EXCLUDED.currency,
    start_date = EXCLUDED.start_date,
    end_date = EXCLUDED.end_date,
    release_date = EXCLUDED.release_date,
    contract_count = EXCLUDED.contract_count,
    item_count = EXCLUDED.item_count,
    milestone_count = EXCLUDED.milestone_count,
    transaction_count = EXCLUDED.transaction_count,
    purchase_order_count = EXCLUDED.purchase_order_count,
    award_value = EXCLUDED.award_value,
    complexity = EXCLUDED.complexity,
    payload = EXCLUDED.payload";

/// Columns returned by [`TenderStore::query`].
const LIST_COLUMNS: &str =
    "external_id, title, status, amount, currency, start_date, end_date, release_date, complexity";

/// Aggregate figures over every stored tender.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub tenders: u64,
    pub contracts: u64,
    pub items: u64,
    pub milestones: u64,
    pub transactions: u64,
    pub purchase_orders: u64,
    pub total_award_value: f64,
    /// Earliest of tender start and release date.
    pub min_date: Option<String>,
    /// Latest of tender end and release date.
    pub max_date: Option<String>,
}

/// Keyed collection of canonical tenders.
///
/// One row per external id; re-ingesting an id overwrites the row. Supports
/// both in-memory ([`open`](Self::open)) and file-backed
/// ([`open_persistent`](Self::open_persistent)) databases.
pub struct TenderStore {
    conn: Connection,
}

impl TenderStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened tender store");
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // ── Writes ──

    /// Upsert every row in one transaction. Any failure rolls the whole batch
    /// back and is returned.
    pub fn upsert_batch(&mut self, rows: &[StoredTender]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT)?;
            for row in rows {
                stmt.execute(&row_params(row)[..])?;
            }
        }
        tx.commit()?;
        debug!(rows = rows.len(), "committed upsert batch");
        Ok(rows.len())
    }

    /// Upsert a single row outside any batch.
    pub fn upsert(&self, row: &StoredTender) -> Result<(), StoreError> {
        self.conn.execute(UPSERT, &row_params(row)[..])?;
        Ok(())
    }

    // ── Reads ──

    /// Number of stored tenders.
    pub fn count(&self) -> Result<usize, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT count(*)::BIGINT AS cnt FROM tenders")?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    /// Fetch one stored document by external id.
    pub fn get_tender(&self, external_id: &str) -> Result<serde_json::Value, StoreError> {
        let payload: String = self
            .conn
            .query_row(
                "SELECT payload FROM tenders WHERE external_id = ?",
                [external_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                duckdb::Error::QueryReturnedNoRows => StoreError::NoResults,
                other => StoreError::DuckDb(other),
            })?;
        Ok(serde_json::from_str(&payload)?)
    }

    /// List tenders matching `query`, one page, as Arrow batches.
    pub fn query(&self, query: &TenderQuery) -> Result<Vec<RecordBatch>, StoreError> {
        let (filter, params) = query.where_clause();
        let sql = format!(
            "SELECT {LIST_COLUMNS} FROM tenders{filter}{}",
            query.order_clause()
        );
        let values = sql_values(params);
        let mut stmt = self.conn.prepare(&sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow(params_from_iter(values.iter()))?.collect();
        Ok(batches)
    }

    /// Number of tenders matching `query`'s filters, ignoring paging.
    pub fn count_matching(&self, query: &TenderQuery) -> Result<usize, StoreError> {
        let (filter, params) = query.where_clause();
        let sql = format!("SELECT count(*)::BIGINT FROM tenders{filter}");
        let values = sql_values(params);
        let n: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Tender count per status, most frequent first.
    pub fn status_counts(&self) -> Result<Vec<(String, u64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT status, count(*)::BIGINT FROM tenders GROUP BY status ORDER BY 2 DESC, 1",
        )?;
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(0)?;
            let n: i64 = row.get(1)?;
            Ok((status, n as u64))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let sql = "
            SELECT
                count(*)::BIGINT,
                coalesce(sum(contract_count), 0)::BIGINT,
                coalesce(sum(item_count), 0)::BIGINT,
                coalesce(sum(milestone_count), 0)::BIGINT,
                coalesce(sum(transaction_count), 0)::BIGINT,
                coalesce(sum(purchase_order_count), 0)::BIGINT,
                coalesce(sum(award_value), 0)::DOUBLE,
                min(coalesce(least(start_date, release_date), start_date, release_date)),
                max(coalesce(greatest(end_date, release_date), end_date, release_date))
            FROM tenders";
        let stats = self.conn.query_row(sql, [], |row| {
            Ok(StoreStats {
                tenders: row.get::<_, i64>(0)? as u64,
                contracts: row.get::<_, i64>(1)? as u64,
                items: row.get::<_, i64>(2)? as u64,
                milestones: row.get::<_, i64>(3)? as u64,
                transactions: row.get::<_, i64>(4)? as u64,
                purchase_orders: row.get::<_, i64>(5)? as u64,
                total_award_value: row.get(6)?,
                min_date: row.get(7)?,
                max_date: row.get(8)?,
            })
        })?;
        Ok(stats)
    }
}

fn row_params(row: &StoredTender) -> [&dyn ToSql; 16] {
    [
        &row.external_id,
        &row.title,
        &row.status,
        &row.amount,
        &row.currency,
        &row.start_date,
        &row.end_date,
        &row.release_date,
        &row.contract_count,
        &row.item_count,
        &row.milestone_count,
        &row.transaction_count,
        &row.purchase_order_count,
        &row.award_value,
        &row.complexity,
        &row.payload,
    ]
}

fn sql_values(params: Vec<Param>) -> Vec<SqlValue> {
    params
        .into_iter()
        .map(|p| match p {
            Param::Text(s) => SqlValue::Text(s),
            Param::Double(f) => SqlValue::Double(f),
        })
        .collect()
}
