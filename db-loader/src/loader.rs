//! Three-phase parallel load orchestration: prepare, N-way copy, finalize.

use std::ops::Range;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{error, info};
use metrics::BenchmarkResult;
use thread_pool::ThreadPool;

use core_types::types::{IndicatorRow, Trade};

use crate::error::{DbError, Result};

/// Seam between the orchestration and the actual store, so phase ordering,
/// partition coverage, and failure capture are testable without a server.
pub trait BulkStore: Clone + Send + 'static {
    fn prepare(&self) -> Result<()>;
    fn copy_span(&self, trades: &[Trade], worker: usize) -> Result<u64>;
    fn finalize(&self) -> Result<()>;
    fn save_indicators(&self, rows: &[IndicatorRow]) -> Result<()>;
}

/// Load driver states. The failure states name the recovery story: a failed
/// prepare leaves the schema intact, a failed copy needs truncate + rerun,
/// a failed finalize leaves data loaded but unindexed (retriable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Prepared,
    Copying,
    Finalized,
    PrepFailed,
    CopyFailed,
    FinalizeFailed,
}

#[derive(Debug, thiserror::Error)]
#[error("parallel load failed ({state:?}): {source}")]
pub struct LoadError {
    pub state: LoadState,
    #[source]
    pub source: DbError,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub state: LoadState,
    pub rows_copied: u64,
    pub wall_ns: u64,
}

/// Split `total` items into `workers` contiguous, non-overlapping spans
/// covering `[0, total)` exactly; the first `total % workers` spans carry
/// one extra item.
pub fn partition(total: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let chunk = total / workers;
    let remainder = total % workers;
    let mut spans = Vec::with_capacity(workers);
    let mut offset = 0;
    for i in 0..workers {
        let len = chunk + usize::from(i < remainder);
        spans.push(offset..offset + len);
        offset += len;
    }
    spans
}

/// Run the full three-phase load. The trade buffer is shared read-only with
/// every copy worker and held alive for the whole load; the indicator save
/// runs on its own thread from the start of P1 and is awaited after P3.
pub fn run_parallel_load<S: BulkStore>(
    store: S,
    trades: Arc<Vec<Trade>>,
    indicators: Vec<IndicatorRow>,
    workers: usize,
    results: &mut Vec<BenchmarkResult>,
) -> std::result::Result<LoadReport, LoadError> {
    let workers = workers.max(1);
    info!(
        "parallel load: {} workers over {} trades",
        workers,
        trades.len()
    );

    let indicator_count = indicators.len();
    let indicator_store = store.clone();
    let indicator_task = thread::spawn(move || -> Result<u64> {
        let start = Instant::now();
        indicator_store.save_indicators(&indicators)?;
        Ok(start.elapsed().as_nanos() as u64)
    });

    // P1: serial DDL on the main thread.
    if let Err(source) = store.prepare() {
        drain_indicator_task(indicator_task, indicator_count, results);
        return Err(LoadError {
            state: LoadState::PrepFailed,
            source,
        });
    }

    // P2: one COPY stream per worker over its span.
    let wall_start = Instant::now();
    let spans = partition(trades.len(), workers);
    let pool = ThreadPool::new(workers);
    let mut handles = Vec::with_capacity(workers);
    for (worker, span) in spans.into_iter().enumerate() {
        let store = store.clone();
        let trades = Arc::clone(&trades);
        let handle = pool
            .submit(move || -> Result<(u64, u64)> {
                let start = Instant::now();
                let rows = store.copy_span(&trades[span], worker)?;
                Ok((rows, start.elapsed().as_nanos() as u64))
            })
            .expect("freshly created pool accepts tasks");
        handles.push(handle);
    }
    pool.wait_all();

    // wait_all() reports drain, not success; inspect every handle so no
    // worker failure is silently dropped.
    let mut rows_copied = 0u64;
    let mut first_failure: Option<DbError> = None;
    for (worker, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok((rows, ns))) => {
                rows_copied += rows;
                results.push(BenchmarkResult::new(
                    format!("copy worker {worker}"),
                    ns,
                    rows as usize,
                ));
            }
            Ok(Err(err)) => {
                error!("copy worker {worker} failed: {err}");
                first_failure.get_or_insert(err);
            }
            Err(_) => {
                error!("copy worker {worker} panicked");
                first_failure.get_or_insert(DbError::WorkerPanicked);
            }
        }
    }
    let wall_ns = wall_start.elapsed().as_nanos() as u64;

    if let Some(source) = first_failure {
        drain_indicator_task(indicator_task, indicator_count, results);
        return Err(LoadError {
            state: LoadState::CopyFailed,
            source,
        });
    }

    // P3: serial constraint rebuild.
    if let Err(source) = store.finalize() {
        drain_indicator_task(indicator_task, indicator_count, results);
        return Err(LoadError {
            state: LoadState::FinalizeFailed,
            source,
        });
    }

    if let Some(source) = drain_indicator_task(indicator_task, indicator_count, results) {
        return Err(LoadError {
            state: LoadState::Finalized,
            source,
        });
    }

    results.push(BenchmarkResult::new(
        "parallel db load",
        wall_ns,
        trades.len(),
    ));
    info!(
        "parallel load complete: {rows_copied} rows in {} ms",
        wall_ns / 1_000_000
    );
    Ok(LoadReport {
        state: LoadState::Finalized,
        rows_copied,
        wall_ns,
    })
}

/// Join the background indicator save, record its timing, and hand back its
/// failure (if any) for the caller to surface.
fn drain_indicator_task(
    task: thread::JoinHandle<Result<u64>>,
    indicator_count: usize,
    results: &mut Vec<BenchmarkResult>,
) -> Option<DbError> {
    match task.join() {
        Ok(Ok(ns)) => {
            results.push(BenchmarkResult::new("indicator save", ns, indicator_count));
            None
        }
        Ok(Err(err)) => {
            error!("indicator save failed: {err}");
            Some(err)
        }
        Err(_) => {
            error!("indicator save panicked");
            Some(DbError::WorkerPanicked)
        }
    }
}
