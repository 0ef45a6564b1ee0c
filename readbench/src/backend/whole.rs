use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use zarrs::{array::Array, array_subset::ArraySubset, storage::store::FilesystemStore};

use super::{
    element_type_of, open_array, shape_usize, BackendAdapter, LoadedArray, ReadableElement,
};
use crate::{error::BackendReadError, layout::ElementType};

/// Reads the store with the smallest `zarrs` surface: open the array and
/// retrieve every element in one call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZarrsBackend;

impl BackendAdapter for ZarrsBackend {
    fn name(&self) -> &'static str {
        "zarrs"
    }

    fn load_full_array(&self, path: &Path) -> Result<LoadedArray, BackendReadError> {
        let array = open_array(path)?;
        let loaded = match element_type_of(&array)? {
            ElementType::UInt8 => retrieve_all::<u8>(&array)?,
            ElementType::UInt16 => retrieve_all::<u16>(&array)?,
            ElementType::UInt32 => retrieve_all::<u32>(&array)?,
            ElementType::UInt64 => retrieve_all::<u64>(&array)?,
        };
        Ok(loaded)
    }
}

fn retrieve_all<T: ReadableElement>(
    array: &Array<FilesystemStore>,
) -> Result<LoadedArray, BackendReadError> {
    let subset = ArraySubset::new_with_shape(array.shape().to_vec());
    let elements = array.retrieve_array_subset_elements::<T>(&subset)?;
    let shape = shape_usize(array.shape());
    let data = ArrayD::from_shape_vec(IxDyn(&shape), elements)
        .map_err(|err| BackendReadError::Shape {
            msg: format!("{err} for shape {shape:?}"),
        })?;
    Ok(T::wrap(data).into())
}
