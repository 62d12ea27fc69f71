//! One-shot trade flatfile ingestion.
//!
//! The whole file is read in a single I/O into one buffer; lines and fields
//! are borrowed byte views into it. Per record, only the symbol allocates.
//! Malformed numeric fields parse to their zero value and are left for the
//! validator to reject; they are not a parser error.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;
use thiserror::Error;

use core_types::types::Trade;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("could not open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parse a trade flatfile. The first line is the header and is discarded;
/// every following non-empty line yields one [`Trade`] in file order.
///
/// Columns, fixed: `trade_id, order_id, timestamp, symbol, price, volume,
/// side, type, is_pro`.
pub fn parse(path: impl AsRef<Path>) -> Result<Vec<Trade>, ParserError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|source| ParserError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut content = Vec::new();
    if let Ok(meta) = file.metadata() {
        content.reserve_exact(meta.len() as usize + 1);
    }
    file.read_to_end(&mut content)
        .map_err(|source| ParserError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let trades = parse_buffer(&content);
    info!("parsed {} trades from {}", trades.len(), path.display());
    Ok(trades)
}

fn parse_buffer(content: &[u8]) -> Vec<Trade> {
    let mut lines = content.split(|&b| b == b'\n');
    // Header row.
    lines.next();

    let mut trades = Vec::new();
    for line in lines {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        trades.push(parse_line(line));
    }
    trades
}

fn parse_line(mut line: &[u8]) -> Trade {
    let cursor = &mut line;
    Trade {
        trade_id: parse_number(next_field(cursor)),
        order_id: parse_number(next_field(cursor)),
        timestamp: parse_number(next_field(cursor)),
        // The one allocation per record.
        symbol: std::str::from_utf8(next_field(cursor))
            .unwrap_or("")
            .to_string(),
        price: parse_number(next_field(cursor)),
        volume: parse_number(next_field(cursor)),
        side: first_byte(next_field(cursor), 'N'),
        kind: first_byte(next_field(cursor), 'M'),
        is_pro: next_field(cursor) == b"1",
    }
}

/// Slice up to the next comma and advance the cursor past it. With no comma
/// left, the remainder is the field and the cursor becomes empty.
fn next_field<'a>(cursor: &mut &'a [u8]) -> &'a [u8] {
    match cursor.iter().position(|&b| b == b',') {
        Some(comma) => {
            let field = &cursor[..comma];
            *cursor = &cursor[comma + 1..];
            field
        }
        None => std::mem::take(cursor),
    }
}

/// Locale-independent numeric decode; the zero value on failure.
fn parse_number<T: FromStr + Default>(field: &[u8]) -> T {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn first_byte(field: &[u8], default: char) -> char {
    field.first().map(|&b| b as char).unwrap_or(default)
}
