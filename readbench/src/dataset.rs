//! Named dataset configurations and the matrices they are drawn from.
//!
//! A matrix is a table of rows; one generic constructor turns a row into a
//! [`DatasetSpec`] for a given suite shape. Adding a configuration means
//! adding a row.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use zarrs::array::codec::bytes_to_bytes::blosc::BloscCompressor;

use crate::{
    codec::Codec,
    error::MaterializationError,
    layout::{Chunking, ElementType, Shape2},
    materialize::{ArrayMaterializer, Materialized},
    sample::SourceArray,
};

/// Shape of the arrays in the default suite.
pub const DEFAULT_SHAPE: Shape2 = (50_000, 20_000);

/// One named, reproducible storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    pub shape: Shape2,
    pub chunking: Chunking,
    pub codec: Codec,
    pub element_type: ElementType,
}

impl DatasetSpec {
    pub fn new(
        name: impl Into<String>,
        shape: Shape2,
        chunking: Chunking,
        codec: Codec,
        element_type: ElementType,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            chunking,
            codec,
            element_type,
        }
    }

    /// The store location of this dataset below `base_dir`.
    ///
    /// Only depends on `base_dir` and the name, so re-runs find the same
    /// store again.
    pub fn resolve_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(format!("{}.zarr", slug(&self.name)))
    }

    /// Materialize this dataset below `base_dir` unless a valid store is
    /// already there, and return its path.
    pub fn ensure_materialized(
        &self,
        base_dir: &Path,
        source: &SourceArray,
    ) -> Result<(PathBuf, Materialized), MaterializationError> {
        let path = self.resolve_path(base_dir);
        let outcome = ArrayMaterializer::new(source).materialize(
            &path,
            self.shape,
            self.chunking,
            self.element_type,
            &self.codec,
        )?;
        Ok((path, outcome))
    }

    pub fn chunk_shape(&self) -> Shape2 {
        self.chunking.chunk_shape(self.shape)
    }

    pub fn logical_chunk_count(&self) -> u64 {
        self.chunking.chunk_count(self.shape)
    }

    /// Decoded size of the whole array in bytes.
    pub fn nbytes(&self) -> u64 {
        self.shape.0 * self.shape.1 * self.element_type.size() as u64
    }
}

/// Lowercase, with everything but ASCII alphanumerics replaced by `_`.
fn slug(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// A matrix row. The chunk shape is `shape / divisors` (at least 1), so the
/// chunk count stays put when the suite shape changes.
#[derive(Debug, Clone)]
struct MatrixRow {
    name: &'static str,
    chunk_divisors: Option<(u64, u64)>,
    codec: Codec,
}

const LZ4_CLEVEL: u8 = 5;
const ZSTD_LEVEL: i32 = 3;

/// 200 chunks on a (50000, 20000) array: (5000, 1000)
const COARSE: Option<(u64, u64)> = Some((10, 20));
/// 20000 chunks on a (50000, 20000) array: (500, 100)
const FINE: Option<(u64, u64)> = Some((100, 200));

const LZ4: Codec = Codec::Blosc {
    cname: BloscCompressor::LZ4,
    clevel: LZ4_CLEVEL,
    shuffle: None,
};

const STANDARD_ROWS: &[MatrixRow] = &[
    MatrixRow {
        name: "Uncompressed_1_Chunk",
        chunk_divisors: None,
        codec: Codec::None,
    },
    MatrixRow {
        name: "LZ4_200_Chunks",
        chunk_divisors: COARSE,
        codec: LZ4,
    },
    MatrixRow {
        name: "Uncompressed_200_Chunks",
        chunk_divisors: COARSE,
        codec: Codec::None,
    },
    MatrixRow {
        name: "LZ4_20000_Chunks",
        chunk_divisors: FINE,
        codec: LZ4,
    },
    MatrixRow {
        name: "Uncompressed_20000_Chunks",
        chunk_divisors: FINE,
        codec: Codec::None,
    },
];

const ZSTD_ROWS: &[MatrixRow] = &[
    MatrixRow {
        name: "Zstd_200_Chunks",
        chunk_divisors: COARSE,
        codec: Codec::Zstd {
            level: ZSTD_LEVEL,
            checksum: false,
        },
    },
    MatrixRow {
        name: "Zstd_20000_Chunks",
        chunk_divisors: FINE,
        codec: Codec::Zstd {
            level: ZSTD_LEVEL,
            checksum: false,
        },
    },
];

impl MatrixRow {
    fn to_spec(&self, shape: Shape2, element_type: ElementType) -> DatasetSpec {
        let chunking = match self.chunk_divisors {
            None => Chunking::Disabled,
            Some((row_div, col_div)) => Chunking::Regular {
                rows: (shape.0 / row_div).max(1),
                cols: (shape.1 / col_div).max(1),
            },
        };
        DatasetSpec::new(self.name, shape, chunking, self.codec.clone(), element_type)
    }
}

/// Which set of configurations a suite materializes and reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetMatrix {
    /// Uncompressed and LZ4 at 1, 200 and 20000 chunks.
    #[default]
    Standard,
    /// `Standard` plus zstd at 200 and 20000 chunks.
    Extended,
}

impl DatasetMatrix {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetMatrix::Standard => "standard",
            DatasetMatrix::Extended => "extended",
        }
    }

    fn rows(&self) -> impl Iterator<Item = &'static MatrixRow> {
        let extra: &'static [MatrixRow] = match self {
            DatasetMatrix::Standard => &[],
            DatasetMatrix::Extended => ZSTD_ROWS,
        };
        STANDARD_ROWS.iter().chain(extra.iter())
    }

    /// The datasets of this matrix, in declaration order, all with the same
    /// `shape` and `element_type`.
    pub fn specs(&self, shape: Shape2, element_type: ElementType) -> Vec<DatasetSpec> {
        self.rows()
            .map(|row| row.to_spec(shape, element_type))
            .collect()
    }
}

impl Display for DatasetMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DatasetMatrix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(DatasetMatrix::Standard),
            "extended" => Ok(DatasetMatrix::Extended),
            other => Err(format!(
                "unknown matrix `{other}`, expected standard or extended"
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use ndarray::array;
    use tempfile::tempdir;

    use super::{DatasetMatrix, DatasetSpec, DEFAULT_SHAPE};
    use crate::{
        codec::Codec,
        layout::{Chunking, ElementType},
        materialize::Materialized,
        sample::SourceArray,
        store::is_materialized,
    };

    #[test]
    fn test_standard_matrix() {
        let specs = DatasetMatrix::Standard.specs(DEFAULT_SHAPE, ElementType::UInt8);
        let summary: Vec<(&str, Chunking, u64, bool)> = specs
            .iter()
            .map(|spec| {
                (
                    spec.name.as_str(),
                    spec.chunking,
                    spec.logical_chunk_count(),
                    spec.codec.is_compressed(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Uncompressed_1_Chunk", Chunking::Disabled, 1, false),
                (
                    "LZ4_200_Chunks",
                    Chunking::Regular {
                        rows: 5_000,
                        cols: 1_000
                    },
                    200,
                    true
                ),
                (
                    "Uncompressed_200_Chunks",
                    Chunking::Regular {
                        rows: 5_000,
                        cols: 1_000
                    },
                    200,
                    false
                ),
                (
                    "LZ4_20000_Chunks",
                    Chunking::Regular {
                        rows: 500,
                        cols: 100
                    },
                    20_000,
                    true
                ),
                (
                    "Uncompressed_20000_Chunks",
                    Chunking::Regular {
                        rows: 500,
                        cols: 100
                    },
                    20_000,
                    false
                ),
            ]
        );
        assert!(specs.iter().all(|spec| spec.shape == DEFAULT_SHAPE));
        assert_eq!(specs[1].codec, Codec::blosc_lz4(5));
        assert_eq!(specs[0].nbytes(), 1_000_000_000);
    }

    #[test]
    fn test_extended_matrix() {
        let specs = DatasetMatrix::Extended.specs((1_000, 2_000), ElementType::UInt16);
        assert_eq!(specs.len(), 7);
        assert_eq!(specs[5].name, "Zstd_200_Chunks");
        assert_eq!(specs[5].logical_chunk_count(), 200);
        assert_eq!(specs[6].logical_chunk_count(), 20_000);
        assert_eq!(specs[6].codec, Codec::zstd(3));
    }

    #[test]
    fn test_small_shape_chunks_at_least_one() {
        let specs = DatasetMatrix::Standard.specs((50, 50), ElementType::UInt8);
        assert_eq!(
            specs[3].chunking,
            Chunking::Regular { rows: 1, cols: 1 }
        );
    }

    #[test]
    fn test_resolve_path_is_deterministic() {
        let spec = DatasetMatrix::Standard.specs(DEFAULT_SHAPE, ElementType::UInt8)[1].clone();
        let base = Path::new("/data/bench");
        assert_eq!(
            spec.resolve_path(base),
            Path::new("/data/bench/lz4_200_chunks.zarr")
        );
        assert_eq!(spec.resolve_path(base), spec.clone().resolve_path(base));

        let odd = DatasetSpec::new(
            "My Data/set #1",
            (1, 1),
            Chunking::Disabled,
            Codec::None,
            ElementType::UInt8,
        );
        assert_eq!(
            odd.resolve_path(base),
            Path::new("/data/bench/my_data_set__1.zarr")
        );
    }

    #[test]
    fn test_ensure_materialized_once() {
        let dir = tempdir().unwrap();
        let source = SourceArray::new(array![[1u8, 2], [3, 4]]).unwrap();
        let spec = DatasetSpec::new(
            "tiny",
            (4, 4),
            Chunking::Regular { rows: 2, cols: 2 },
            Codec::blosc_lz4(5),
            ElementType::UInt8,
        );
        let (path, first) = spec.ensure_materialized(dir.path(), &source).unwrap();
        assert_eq!(path, dir.path().join("tiny.zarr"));
        assert!(is_materialized(&path));
        assert_eq!(first, Materialized::Written);

        let (again, second) = spec.ensure_materialized(dir.path(), &source).unwrap();
        assert_eq!(again, path);
        assert_eq!(second, Materialized::Reused);
    }

    #[test]
    fn test_matrix_parse() {
        assert_eq!(
            "extended".parse::<DatasetMatrix>().unwrap(),
            DatasetMatrix::Extended
        );
        assert!("everything".parse::<DatasetMatrix>().is_err());
    }
}
