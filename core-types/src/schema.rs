//! Arrow schema for the columnar trade artifact.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema};

/// Low-cardinality text columns are dictionary-encoded: a tiny value table
/// plus dense int8 indices that compress to near-zero.
fn dictionary_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::Dictionary(Box::new(DataType::Int8), Box::new(DataType::Utf8)),
        false,
    )
}

pub fn trade_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("trade_id", DataType::UInt64, false),
        Field::new("order_id", DataType::UInt64, false),
        Field::new("timestamp", DataType::Int64, false),
        dictionary_field("symbol"),
        Field::new("price", DataType::Float64, false),
        Field::new("volume", DataType::UInt32, false),
        dictionary_field("side"),
        dictionary_field("type"),
        Field::new("is_pro", DataType::Boolean, false),
    ]))
}
