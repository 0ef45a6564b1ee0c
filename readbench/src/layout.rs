use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use zarrs::array::{DataType, FillValue};

/// `(rows, cols)`
pub type Shape2 = (u64, u64);

/// The fixed-width unsigned element type of a dataset.
///
/// The sample content is `u8`; wider types hold the same values widened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    #[serde(rename = "u8")]
    UInt8,
    #[serde(rename = "u16")]
    UInt16,
    #[serde(rename = "u32")]
    UInt32,
    #[serde(rename = "u64")]
    UInt64,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            ElementType::UInt8 => 1,
            ElementType::UInt16 => 2,
            ElementType::UInt32 => 4,
            ElementType::UInt64 => 8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::UInt8 => "u8",
            ElementType::UInt16 => "u16",
            ElementType::UInt32 => "u32",
            ElementType::UInt64 => "u64",
        }
    }

    /// The `data_type` name in Zarr v3 array metadata.
    pub fn zarr_name(&self) -> &'static str {
        match self {
            ElementType::UInt8 => "uint8",
            ElementType::UInt16 => "uint16",
            ElementType::UInt32 => "uint32",
            ElementType::UInt64 => "uint64",
        }
    }

    pub(crate) fn data_type(&self) -> DataType {
        match self {
            ElementType::UInt8 => DataType::UInt8,
            ElementType::UInt16 => DataType::UInt16,
            ElementType::UInt32 => DataType::UInt32,
            ElementType::UInt64 => DataType::UInt64,
        }
    }

    pub(crate) fn fill_value(&self) -> FillValue {
        match self {
            ElementType::UInt8 => FillValue::from(0u8),
            ElementType::UInt16 => FillValue::from(0u16),
            ElementType::UInt32 => FillValue::from(0u32),
            ElementType::UInt64 => FillValue::from(0u64),
        }
    }

    pub(crate) fn from_data_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::UInt8 => Some(ElementType::UInt8),
            DataType::UInt16 => Some(ElementType::UInt16),
            DataType::UInt32 => Some(ElementType::UInt32),
            DataType::UInt64 => Some(ElementType::UInt64),
            _ => None,
        }
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "u8" | "uint8" => Ok(ElementType::UInt8),
            "u16" | "uint16" => Ok(ElementType::UInt16),
            "u32" | "uint32" => Ok(ElementType::UInt32),
            "u64" | "uint64" => Ok(ElementType::UInt64),
            other => Err(format!("unknown element type `{other}`, expected u8, u16, u32 or u64")),
        }
    }
}

/// How a dataset is split into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chunking {
    /// One chunk spanning the whole array.
    Disabled,
    /// A regular grid; edge chunks overhang the array if the shape is not
    /// divisible by the chunk shape.
    Regular { rows: u64, cols: u64 },
}

impl Chunking {
    pub fn chunk_shape(&self, shape: Shape2) -> Shape2 {
        match self {
            Chunking::Disabled => shape,
            Chunking::Regular { rows, cols } => (*rows, *cols),
        }
    }

    /// Number of chunks in the grid covering `shape`.
    pub fn chunk_count(&self, shape: Shape2) -> u64 {
        let (chunk_rows, chunk_cols) = self.chunk_shape(shape);
        if chunk_rows == 0 || chunk_cols == 0 {
            return 0;
        }
        shape.0.div_ceil(chunk_rows) * shape.1.div_ceil(chunk_cols)
    }
}

/// Parse `ROWSxCOLS`, e.g. `50000x20000`.
pub fn parse_shape(s: &str) -> Result<Shape2, String> {
    let (rows, cols) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected ROWSxCOLS, got `{s}`"))?;
    let rows = rows
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("invalid row count `{rows}`: {err}"))?;
    let cols = cols
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("invalid column count `{cols}`: {err}"))?;
    Ok((rows, cols))
}
