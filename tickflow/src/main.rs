//! Batch ETL driver: flatfile -> validate -> indicators -> store + columnar.

use std::path::Path;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{error, info};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use core_types::config::{ConfigError, PipelineConfig};
use db_loader::{DbError, LoadError, PgSink};
use flatfile_parser::ParserError;
use metrics::{BenchmarkResult, StageMeter};
use storage::StorageError;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        error!("pipeline failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config = PipelineConfig::load()?;
    info!(
        "pipeline start: input={} workers={} period={}",
        config.input_path, config.worker_count, config.indicator_period
    );
    let mut results: Vec<BenchmarkResult> = Vec::new();

    let trades = {
        let mut meter = StageMeter::start("parse", 0, &mut results);
        let trades = flatfile_parser::parse(&config.input_path)?;
        meter.set_count(trades.len());
        trades
    };

    let clean = {
        let mut meter = StageMeter::start("validate", trades.len(), &mut results);
        let clean = trade_validator::validate_batch(trades);
        meter.set_count(clean.len());
        clean
    };

    let indicators = {
        let _meter = StageMeter::start("indicators", clean.len(), &mut results);
        indicator_engine::compute_all(&clean, config.indicator_period)
    };

    let sink = PgSink::new(&config.connection_string)?;
    sink.init_schema()?;

    // Shared read-only by the columnar writer and every load worker.
    let trades = Arc::new(clean);

    let columnar_trades = Arc::clone(&trades);
    let parquet_dir = config.parquet_dir.clone();
    let columnar_task = thread::spawn(move || {
        let start = Instant::now();
        storage::write_trades(&columnar_trades, Path::new(&parquet_dir))
            .map(|artifact| (artifact, start.elapsed().as_nanos() as u64))
    });

    let report = db_loader::run_parallel_load(
        sink,
        Arc::clone(&trades),
        indicators,
        config.worker_count,
        &mut results,
    )?;

    match columnar_task.join() {
        Ok(Ok((artifact, ns))) => {
            results.push(BenchmarkResult::new("parquet write", ns, artifact.rows));
            info!(
                "columnar artifact at {} ({} bytes)",
                artifact.path.display(),
                artifact.bytes
            );
        }
        Ok(Err(err)) => return Err(err.into()),
        Err(_) => return Err(AppError::ColumnarWriterPanicked),
    }

    info!(
        "pipeline complete: {} rows loaded in {} ms",
        report.rows_copied,
        report.wall_ns / 1_000_000
    );
    metrics::report(&results);
    Ok(())
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(#[from] DbError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("columnar writer thread panicked")]
    ColumnarWriterPanicked,
}
