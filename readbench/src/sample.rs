//! The deterministic source content written into every dataset.
//!
//! The bundled asset is a single 2-D `u8` grid (one channel of a photo),
//! stored as a bincode-encoded [`SampleAsset`]. Datasets larger than the
//! asset are filled by tiling it; smaller ones truncate it.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::SampleError;

/// Location of the asset shipped with this crate.
pub const BUNDLED_SAMPLE_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/sample_photo.bin");

/// On-disk layout of the sample asset; `pixels` is row-major.
#[derive(Debug, Serialize, Deserialize)]
struct SampleAsset {
    rows: u32,
    cols: u32,
    pixels: Vec<u8>,
}

/// An immutable 2-D grid of bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArray {
    data: Array2<u8>,
}

impl SourceArray {
    /// Returns `None` for a grid without any elements, which can't be tiled.
    pub fn new(data: Array2<u8>) -> Option<Self> {
        if data.is_empty() {
            None
        } else {
            Some(Self { data })
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.data.view()
    }

    pub fn into_inner(self) -> Array2<u8> {
        self.data
    }

    /// Tile or truncate the content to exactly `shape`.
    ///
    /// Element `(r, c)` of the result is element `(r % rows, c % cols)` of
    /// the source, so the output only depends on `(self, shape)`.
    pub fn resize_to(&self, shape: (usize, usize)) -> SourceArray {
        SourceArray {
            data: self.tile_window((0, 0), shape),
        }
    }

    /// The `shape`-sized window starting at `origin` of the source tiled
    /// infinitely in both dimensions.
    ///
    /// `resize_to(s)` and `tile_window((0, 0), s)` hold the same content;
    /// the materializer uses windows to write one region at a time.
    pub fn tile_window(&self, origin: (u64, u64), shape: (usize, usize)) -> Array2<u8> {
        let (rows, cols) = self.data.dim();
        let mut out = Array2::<u8>::zeros(shape);
        if rows == 0 || cols == 0 {
            return out;
        }
        let row0 = (origin.0 % rows as u64) as usize;
        let col0 = (origin.1 % cols as u64) as usize;

        for (r, mut out_row) in out.rows_mut().into_iter().enumerate() {
            let src_row = self.data.row((row0 + r) % rows);
            for (c, value) in out_row.iter_mut().enumerate() {
                *value = src_row[(col0 + c) % cols];
            }
        }
        out
    }
}

/// Loads the [`SourceArray`] from a sample asset on disk.
#[derive(Debug, Clone)]
pub struct SampleSource {
    path: PathBuf,
}

impl SampleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The asset that ships with this crate.
    pub fn bundled() -> Self {
        Self::new(BUNDLED_SAMPLE_PATH)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the asset. Has no side effects, so callers are free
    /// to call this repeatedly or cache the result.
    pub fn load(&self) -> Result<SourceArray, SampleError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SampleError::AssetMissing {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(SampleError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let asset: SampleAsset =
            bincode::deserialize(&bytes).map_err(|err| self.corrupt(err.to_string()))?;
        let shape = (asset.rows as usize, asset.cols as usize);
        let data = Array2::from_shape_vec(shape, asset.pixels)
            .map_err(|err| self.corrupt(format!("{err} (header says {shape:?})")))?;

        debug!("loaded sample {:?} with shape {shape:?}", self.path);

        SourceArray::new(data).ok_or_else(|| self.corrupt("the grid is empty".to_owned()))
    }

    fn corrupt(&self, msg: String) -> SampleError {
        SampleError::Corrupt {
            path: self.path.clone(),
            msg,
        }
    }
}
