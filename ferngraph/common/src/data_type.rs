use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    Boolean,
    Int32,
    Int64,
    UInt64,
    Float64,
    String,
    /// `(offset, table)` pair identifying a node or relationship.
    InternalId,
}

impl LogicalType {
    /// Number of bytes a value of this type occupies in a staged row, excluding heap data.
    #[inline]
    pub fn fixed_size(&self) -> usize {
        match self {
            LogicalType::Boolean => 1,
            LogicalType::Int32 => 4,
            LogicalType::Int64 | LogicalType::UInt64 | LogicalType::Float64 => 8,
            LogicalType::String => size_of::<String>(),
            LogicalType::InternalId => 16,
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalType::Boolean => "BOOLEAN",
            LogicalType::Int32 => "INT32",
            LogicalType::Int64 => "INT64",
            LogicalType::UInt64 => "UINT64",
            LogicalType::Float64 => "FLOAT64",
            LogicalType::String => "STRING",
            LogicalType::InternalId => "INTERNAL_ID",
        };
        f.write_str(name)
    }
}
