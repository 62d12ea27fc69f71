//! PostgreSQL sink: schema bootstrap, COPY bulk streams, and the
//! three-phase parallel load.
//!
//! [`PgSink`] owns its tokio runtime and exposes a blocking facade, so the
//! load workers (plain OS threads from the pool) drive their own sessions
//! with `block_on`. Every operation opens its own connection; the sink has
//! no shared in-process state beyond the runtime handle.

mod error;
mod loader;

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor};
use tokio::runtime::Runtime;

use core_types::types::{IndicatorRow, Trade};

pub use error::{DbError, Result};
pub use loader::{partition, run_parallel_load, BulkStore, LoadError, LoadReport, LoadState};

const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS trades (
    trade_id  BIGINT            PRIMARY KEY,
    order_id  BIGINT            NOT NULL,
    timestamp BIGINT            NOT NULL,
    symbol    VARCHAR(10)       NOT NULL,
    price     DOUBLE PRECISION  NOT NULL CHECK (price > 0),
    volume    INTEGER           NOT NULL CHECK (volume > 0),
    side      CHAR(1)           NOT NULL CHECK (side IN ('B', 'S', 'N')),
    type      CHAR(1)           NOT NULL CHECK (type IN ('M', 'L', 'I')),
    is_pro    BOOLEAN           NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_trades_symbol_time ON trades (symbol, timestamp);
CREATE TABLE IF NOT EXISTS indicators (
    id          BIGSERIAL         PRIMARY KEY,
    symbol      VARCHAR(10)       NOT NULL,
    computed_at BIGINT            NOT NULL,
    sma         DOUBLE PRECISION  NOT NULL,
    rsi         DOUBLE PRECISION  NOT NULL CHECK (rsi >= 0 AND rsi <= 100),
    vwap        DOUBLE PRECISION  NOT NULL CHECK (vwap > 0),
    period      INTEGER           NOT NULL CHECK (period > 0)
);
CREATE INDEX IF NOT EXISTS idx_indicators_symbol_run ON indicators (symbol, computed_at);
"#;

const PREPARE_LOAD: &str = r#"
TRUNCATE trades;
ALTER TABLE trades DROP CONSTRAINT IF EXISTS trades_pkey;
DROP INDEX IF EXISTS idx_trades_symbol_time;
"#;

const FINALIZE_LOAD: &str = r#"
ALTER TABLE trades ADD PRIMARY KEY (trade_id);
CREATE INDEX idx_trades_symbol_time ON trades (symbol, timestamp);
"#;

const COPY_TRADES: &str = "COPY trades \
    (trade_id, order_id, timestamp, symbol, price, volume, side, type, is_pro) \
    FROM STDIN WITH (FORMAT text)";

/// Rows streamed per COPY data message.
const COPY_FLUSH_BYTES: usize = 48 * 1024;

#[derive(Clone)]
pub struct PgSink {
    url: String,
    runtime: Arc<Runtime>,
}

impl PgSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(DbError::Runtime)?;
        Ok(Self {
            url: url.into(),
            runtime: Arc::new(runtime),
        })
    }

    /// Create both tables and their indexes. Safe to run on every start.
    pub fn init_schema(&self) -> Result<()> {
        self.runtime.block_on(init_schema(&self.url))
    }
}

impl BulkStore for PgSink {
    fn prepare(&self) -> Result<()> {
        self.runtime.block_on(prepare(&self.url))
    }

    fn copy_span(&self, trades: &[Trade], worker: usize) -> Result<u64> {
        self.runtime.block_on(copy_span(&self.url, trades, worker))
    }

    fn finalize(&self) -> Result<()> {
        self.runtime.block_on(finalize(&self.url))
    }

    fn save_indicators(&self, rows: &[IndicatorRow]) -> Result<()> {
        self.runtime.block_on(save_indicators(&self.url, rows))
    }
}

async fn open(url: &str) -> Result<PgConnection> {
    PgConnection::connect(url).await.map_err(DbError::Connect)
}

async fn init_schema(url: &str) -> Result<()> {
    let mut conn = open(url).await?;
    conn.execute(sqlx::raw_sql(CREATE_SCHEMA))
        .await
        .map_err(DbError::Schema)?;
    info!("schema ready: tables trades, indicators");
    Ok(())
}

/// Phase P1. Truncate and strip every index so the COPY streams write
/// sequentially. DDL here takes the strongest table lock and must stay on
/// one serial connection.
async fn prepare(url: &str) -> Result<()> {
    let mut conn = open(url).await?;
    let mut tx = conn.begin().await.map_err(DbError::Schema)?;
    (&mut *tx)
        .execute(sqlx::raw_sql(PREPARE_LOAD))
        .await
        .map_err(DbError::Schema)?;
    tx.commit().await.map_err(DbError::Schema)?;
    info!("bulk load prepared: trades truncated, constraints dropped");
    Ok(())
}

/// Phase P2, one worker's share. Own connection, own transaction, one COPY
/// stream. The span stays borrowed; nothing here owns the trade buffer.
async fn copy_span(url: &str, trades: &[Trade], worker: usize) -> Result<u64> {
    let mut conn = open(url).await?;
    let mut tx = conn.begin().await.map_err(DbError::Bulk)?;

    let mut copy = tx.copy_in_raw(COPY_TRADES).await.map_err(DbError::Bulk)?;
    let mut buf = String::with_capacity(COPY_FLUSH_BYTES + 256);
    for trade in trades {
        encode_row(&mut buf, trade);
        if buf.len() >= COPY_FLUSH_BYTES {
            copy.send(std::mem::take(&mut buf).into_bytes())
                .await
                .map_err(DbError::Bulk)?;
        }
    }
    if !buf.is_empty() {
        copy.send(buf.into_bytes()).await.map_err(DbError::Bulk)?;
    }
    let rows = copy.finish().await.map_err(DbError::Bulk)?;

    tx.commit().await.map_err(DbError::Bulk)?;
    debug!("copy worker {worker} committed {rows} rows");
    Ok(rows)
}

/// Phase P3. One bulk sort-and-build per constraint, far cheaper than
/// per-row index maintenance during the copy.
async fn finalize(url: &str) -> Result<()> {
    let mut conn = open(url).await?;
    let mut tx = conn.begin().await.map_err(DbError::Constraint)?;
    (&mut *tx)
        .execute(sqlx::raw_sql(FINALIZE_LOAD))
        .await
        .map_err(DbError::Constraint)?;
    tx.commit().await.map_err(DbError::Constraint)?;
    info!("bulk load finalized: primary key and symbol/time index rebuilt");
    Ok(())
}

/// Append-only indicator persistence. Every row of one save shares a single
/// `computed_at` nanosecond stamp captured up front.
async fn save_indicators(url: &str, rows: &[IndicatorRow]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut conn = open(url).await?;
    let mut tx = conn.begin().await.map_err(DbError::Bulk)?;
    // Saturates past the year 2262.
    let computed_at = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    for row in rows {
        sqlx::query(
            "INSERT INTO indicators (symbol, computed_at, sma, rsi, vwap, period) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&row.symbol)
        .bind(computed_at)
        .bind(row.sma)
        .bind(row.rsi)
        .bind(row.vwap)
        .bind(row.period as i32)
        .execute(&mut *tx)
        .await
        .map_err(DbError::Bulk)?;
    }
    tx.commit().await.map_err(DbError::Bulk)?;
    info!(
        "saved {} indicator rows at computed_at={computed_at}",
        rows.len()
    );
    Ok(())
}

/// COPY text format: tab-separated, newline-terminated. Fields come from
/// validated trades (symbols are bare uppercase ASCII), so no escaping is
/// required. Volume travels as signed 32-bit, the table's wire type.
fn encode_row(buf: &mut String, t: &Trade) {
    let _ = writeln!(
        buf,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        t.trade_id,
        t.order_id,
        t.timestamp,
        t.symbol,
        t.price,
        t.volume as i32,
        t.side,
        t.kind,
        if t.is_pro { 't' } else { 'f' }
    );
}
