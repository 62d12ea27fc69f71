//! Columnar artifact writer: row-oriented trades to a Parquet file.
//!
//! One pass distributes each record's fields to per-column builders; the
//! low-cardinality text columns (symbol, side, type) are dictionary-encoded
//! so a handful of distinct values plus dense int8 indices is all that hits
//! the file. Snappy compression, whole dataset in a single row group.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringDictionaryBuilder,
    UInt32Builder, UInt64Builder,
};
use arrow::datatypes::Int8Type;
use arrow::record_batch::RecordBatch;
use chrono::Local;
use log::info;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use thiserror::Error;

use core_types::schema::trade_schema;
use core_types::types::Trade;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Where the artifact landed and how big it came out.
#[derive(Debug, Clone)]
pub struct WrittenArtifact {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

/// `trades_YYYYMMDD_HHMMSS.parquet` under `directory`, stamped from the
/// local wall clock (chrono's formatter is reentrant).
pub fn output_path(directory: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    directory.join(format!("trades_{stamp}.parquet"))
}

/// Write the full trade buffer as one Parquet file and return its location.
/// A file that fails before `close` is not a valid artifact.
pub fn write_trades(trades: &[Trade], directory: &Path) -> Result<WrittenArtifact, StorageError> {
    let batch = trades_to_record_batch(trades)?;
    let path = output_path(directory);
    let file = File::create(&path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(trades.len().max(1))
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    // close() flushes the footer; skipping it leaves a corrupt file.
    writer.close()?;

    let bytes = std::fs::metadata(&path)?.len();
    info!(
        "wrote {} trades to {} ({} bytes)",
        trades.len(),
        path.display(),
        bytes
    );
    Ok(WrittenArtifact {
        path,
        rows: trades.len(),
        bytes,
    })
}

fn trades_to_record_batch(trades: &[Trade]) -> Result<RecordBatch, StorageError> {
    let n = trades.len();
    let mut trade_id = UInt64Builder::with_capacity(n);
    let mut order_id = UInt64Builder::with_capacity(n);
    let mut timestamp = Int64Builder::with_capacity(n);
    let mut symbol = StringDictionaryBuilder::<Int8Type>::new();
    let mut price = Float64Builder::with_capacity(n);
    let mut volume = UInt32Builder::with_capacity(n);
    let mut side = StringDictionaryBuilder::<Int8Type>::new();
    let mut kind = StringDictionaryBuilder::<Int8Type>::new();
    let mut is_pro = BooleanBuilder::with_capacity(n);

    let mut char_buf = [0u8; 4];
    for t in trades {
        trade_id.append_value(t.trade_id);
        order_id.append_value(t.order_id);
        timestamp.append_value(t.timestamp);
        symbol.append(&t.symbol)?;
        price.append_value(t.price);
        volume.append_value(t.volume);
        side.append(t.side.encode_utf8(&mut char_buf))?;
        kind.append(t.kind.encode_utf8(&mut char_buf))?;
        is_pro.append_value(t.is_pro);
    }

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(trade_id.finish()),
        Arc::new(order_id.finish()),
        Arc::new(timestamp.finish()),
        Arc::new(symbol.finish()),
        Arc::new(price.finish()),
        Arc::new(volume.finish()),
        Arc::new(side.finish()),
        Arc::new(kind.finish()),
        Arc::new(is_pro.finish()),
    ];
    Ok(RecordBatch::try_new(trade_schema(), arrays)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, DictionaryArray, StringArray, UInt64Array};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    fn sample_trades() -> Vec<Trade> {
        let symbols = ["RELIANCE", "TCS", "RELIANCE", "INFY", "TCS"];
        symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| Trade {
                trade_id: i as u64 + 1,
                order_id: i as u64 + 100,
                timestamp: 1_698_208_500_000_000_000 + i as i64,
                symbol: symbol.to_string(),
                price: 100.0 + i as f64,
                volume: 10 * (i as u32 + 1),
                side: if i % 2 == 0 { 'B' } else { 'S' },
                kind: 'L',
                is_pro: i % 3 == 0,
            })
            .collect()
    }

    #[test]
    fn filename_follows_timestamp_pattern() {
        let path = output_path(Path::new("/tmp"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("trades_"));
        assert!(name.ends_with(".parquet"));
        // trades_YYYYMMDD_HHMMSS.parquet
        assert_eq!(name.len(), "trades_20240101_120000.parquet".len());
    }

    #[test]
    fn roundtrip_preserves_rows_and_schema() {
        let dir = TempDir::new().unwrap();
        let trades = sample_trades();
        let artifact = write_trades(&trades, dir.path()).unwrap();
        assert_eq!(artifact.rows, trades.len());
        assert!(artifact.bytes > 0);

        let file = File::open(&artifact.path).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        let metadata = builder.metadata().clone();
        assert_eq!(metadata.num_row_groups(), 1);
        assert_eq!(metadata.file_metadata().num_rows(), trades.len() as i64);

        let mut reader = builder.build().unwrap();
        let batch = reader.next().unwrap().unwrap();
        assert_eq!(batch.num_rows(), trades.len());
        assert_eq!(batch.num_columns(), 9);

        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt64Array>()
            .unwrap();
        assert_eq!(ids.values().to_vec(), vec![1, 2, 3, 4, 5]);

        let symbols = batch
            .column(3)
            .as_any()
            .downcast_ref::<DictionaryArray<Int8Type>>()
            .unwrap();
        // Three distinct symbols in the dictionary, five index entries.
        let values = symbols
            .values()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(symbols.len(), 5);
    }

    #[test]
    fn columns_are_snappy_compressed_in_one_row_group() {
        let dir = TempDir::new().unwrap();
        let artifact = write_trades(&sample_trades(), dir.path()).unwrap();
        let file = File::open(&artifact.path).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        let row_group = builder.metadata().row_group(0);
        for column in row_group.columns() {
            assert_eq!(column.compression(), Compression::SNAPPY);
        }
    }

    #[test]
    fn empty_input_still_writes_a_valid_file() {
        let dir = TempDir::new().unwrap();
        let artifact = write_trades(&[], dir.path()).unwrap();
        let file = File::open(&artifact.path).unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        assert_eq!(builder.metadata().file_metadata().num_rows(), 0);
    }

    #[test]
    fn unwritable_directory_is_an_io_error() {
        let err = write_trades(&sample_trades(), Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
