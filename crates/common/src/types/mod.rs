//! The coarse type system shared by column metadata, scalar expressions,
//! and column statistics bounds.
//!
//! This is intentionally thin: the optimizer never evaluates expressions, so
//! it only needs enough of a type system to classify columns (e.g. "is this
//! grouping column bytes-like?") and to carry literal bounds for statistics.

use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A coarse type family. Distinct numeric widths collapse to one family
/// because the planner's decisions (bytes-like check, scan-agg eligibility)
/// never depend on width, only on family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Unknown,
    Bool,
    Int64,
    Float64,
    Decimal,
    String,
    Bytes,
    Date,
    Timestamp,
    Interval,
    Json,
    Array(Box<DataType>),
    Struct(Vec<StructField>),
}

impl DataType {
    /// The grouping-column rule in §4.6 step 2 forbids bytes-like types.
    pub fn is_bytes_like(&self) -> bool {
        matches!(self, DataType::Bytes | DataType::Json)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub data_type: DataType,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Unknown => write!(f, "UNKNOWN"),
            DataType::Bool => write!(f, "BOOL"),
            DataType::Int64 => write!(f, "INT64"),
            DataType::Float64 => write!(f, "FLOAT64"),
            DataType::Decimal => write!(f, "DECIMAL"),
            DataType::String => write!(f, "STRING"),
            DataType::Bytes => write!(f, "BYTES"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Interval => write!(f, "INTERVAL"),
            DataType::Json => write!(f, "JSON"),
            DataType::Array(inner) => write!(f, "ARRAY<{inner}>"),
            DataType::Struct(fields) => {
                write!(f, "STRUCT<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", field.name, field.data_type)?;
                }
                write!(f, ">")
            }
        }
    }
}

/// A literal bound used by column statistics (`min_value`/`max_value`).
/// Not used for expression evaluation — there is none in this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(i64),
}

impl Value {
    pub fn float64(v: f64) -> Self {
        Value::Float64(OrderedFloat(v))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int64(i) => write!(f, "{i}"),
            Value::Float64(v) => write!(f, "{}", v.0),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "0x{}", b.iter().map(|x| format!("{x:02x}")).collect::<String>()),
            Value::Timestamp(t) => write!(f, "@{t}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_like_classification() {
        assert!(DataType::Bytes.is_bytes_like());
        assert!(DataType::Json.is_bytes_like());
        assert!(!DataType::Int64.is_bytes_like());
        assert!(!DataType::String.is_bytes_like());
    }

    #[test]
    fn display_round_trip_is_stable() {
        assert_eq!(DataType::Int64.to_string(), "INT64");
        assert_eq!(
            DataType::Array(Box::new(DataType::String)).to_string(),
            "ARRAY<STRING>"
        );
    }
}
