//! Backend adapters: interchangeable ways of reading a whole store into
//! memory.
//!
//! Every adapter must report the same byte count for the same store; the
//! benchmark numbers are only comparable under that condition.

use std::{fmt::Display, path::Path, str::FromStr, sync::Arc};

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use zarrs::{
    array::{Array, ElementOwned},
    storage::store::FilesystemStore,
};

use crate::{error::BackendReadError, layout::ElementType, store};

mod chunked;
mod whole;

pub use chunked::NdarrayBackend;
pub use whole::ZarrsBackend;

/// A fully decoded array, typed by its element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InMemoryArray {
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
}

impl InMemoryArray {
    pub fn element_type(&self) -> ElementType {
        match self {
            InMemoryArray::UInt8(_) => ElementType::UInt8,
            InMemoryArray::UInt16(_) => ElementType::UInt16,
            InMemoryArray::UInt32(_) => ElementType::UInt32,
            InMemoryArray::UInt64(_) => ElementType::UInt64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            InMemoryArray::UInt8(a) => a.shape(),
            InMemoryArray::UInt16(a) => a.shape(),
            InMemoryArray::UInt32(a) => a.shape(),
            InMemoryArray::UInt64(a) => a.shape(),
        }
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held by the elements, i.e. `len * element size`.
    pub fn nbytes(&self) -> u64 {
        (self.len() * self.element_type().size()) as u64
    }

    /// The content widened to `u64`, for comparing arrays of different
    /// element types.
    pub fn widened(&self) -> ArrayD<u64> {
        match self {
            InMemoryArray::UInt8(a) => a.mapv(u64::from),
            InMemoryArray::UInt16(a) => a.mapv(u64::from),
            InMemoryArray::UInt32(a) => a.mapv(u64::from),
            InMemoryArray::UInt64(a) => a.clone(),
        }
    }
}

/// Element types the adapters can decode into.
pub(crate) trait ReadableElement: ElementOwned + Clone + Default + 'static {
    fn wrap(array: ArrayD<Self>) -> InMemoryArray;
}

macro_rules! readable_element {
    ($ty:ty, $variant:ident) => {
        impl ReadableElement for $ty {
            fn wrap(array: ArrayD<Self>) -> InMemoryArray {
                InMemoryArray::$variant(array)
            }
        }
    };
}

readable_element!(u8, UInt8);
readable_element!(u16, UInt16);
readable_element!(u32, UInt32);
readable_element!(u64, UInt64);

/// The result of reading a store completely.
#[derive(Debug, Clone)]
pub struct LoadedArray {
    /// Bytes realized in memory, not the size on disk.
    pub byte_count: u64,
    pub array: InMemoryArray,
}

impl From<InMemoryArray> for LoadedArray {
    fn from(array: InMemoryArray) -> Self {
        Self {
            byte_count: array.nbytes(),
            array,
        }
    }
}

pub trait BackendAdapter {
    fn name(&self) -> &'static str;

    /// Open the store at `path` and decode the whole array into memory.
    ///
    /// Codecs are taken from the store metadata; a store without any array
    /// fails with [`BackendReadError::NoArrays`].
    fn load_full_array(&self, path: &Path) -> Result<LoadedArray, BackendReadError>;
}

/// Registry of the available adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Zarrs,
    Ndarray,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::Zarrs, BackendKind::Ndarray];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Zarrs => "zarrs",
            BackendKind::Ndarray => "ndarray",
        }
    }

    pub fn adapter(&self) -> Box<dyn BackendAdapter> {
        match self {
            BackendKind::Zarrs => Box::new(ZarrsBackend),
            BackendKind::Ndarray => Box::new(NdarrayBackend),
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown backend `{s}`, expected zarrs or ndarray"))
    }
}

/// Locate and open the array of the store at `path`.
pub(crate) fn open_array(path: &Path) -> Result<Array<FilesystemStore>, BackendReadError> {
    let array_path = store::locate_array(path)?;
    let store = Arc::new(
        FilesystemStore::new(path).map_err(|err| BackendReadError::Store {
            path: path.to_owned(),
            source: Box::new(err),
        })?,
    );
    Ok(Array::open(store, &array_path)?)
}

pub(crate) fn element_type_of(
    array: &Array<FilesystemStore>,
) -> Result<ElementType, BackendReadError> {
    ElementType::from_data_type(array.data_type()).ok_or_else(|| {
        BackendReadError::UnsupportedDataType {
            data_type: format!("{:?}", array.data_type()),
        }
    })
}

pub(crate) fn shape_usize(shape: &[u64]) -> Vec<usize> {
    shape.iter().map(|&extent| extent as usize).collect()
}
