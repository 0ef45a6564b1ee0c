use std::path::Path;

use log::debug;
use ndarray::{ArrayD, IxDyn, Slice};
use zarrs::{array::Array, storage::store::FilesystemStore};

use super::{
    element_type_of, open_array, shape_usize, BackendAdapter, LoadedArray, ReadableElement,
};
use crate::{error::BackendReadError, layout::ElementType};

/// Reads the store as an N-dimensional `ndarray`: walks the chunk grid,
/// decodes every chunk on its own and assigns it into a preallocated
/// output array.
#[derive(Debug, Default, Clone, Copy)]
pub struct NdarrayBackend;

impl BackendAdapter for NdarrayBackend {
    fn name(&self) -> &'static str {
        "ndarray"
    }

    fn load_full_array(&self, path: &Path) -> Result<LoadedArray, BackendReadError> {
        let array = open_array(path)?;
        let loaded = match element_type_of(&array)? {
            ElementType::UInt8 => assemble::<u8>(&array, path)?,
            ElementType::UInt16 => assemble::<u16>(&array, path)?,
            ElementType::UInt32 => assemble::<u32>(&array, path)?,
            ElementType::UInt64 => assemble::<u64>(&array, path)?,
        };
        Ok(loaded)
    }
}

fn assemble<T: ReadableElement>(
    array: &Array<FilesystemStore>,
    path: &Path,
) -> Result<LoadedArray, BackendReadError> {
    let grid_shape = array
        .chunk_grid_shape()
        .ok_or_else(|| BackendReadError::IrregularChunkGrid {
            path: path.to_owned(),
        })?;
    let num_chunks: u64 = grid_shape.iter().product();
    debug!("assembling {num_chunks} chunks of {path:?}");

    let mut out = ArrayD::<T>::default(IxDyn(&shape_usize(array.shape())));

    for linear in 0..num_chunks {
        let chunk_indices = unravel(linear, &grid_shape);
        let bounds = array.chunk_subset_bounded(&chunk_indices)?;
        let start = bounds.start();
        let extent = bounds.shape();

        let chunk = array.retrieve_chunk_ndarray::<T>(&chunk_indices)?;
        // edge chunks overhang the array
        let chunk = chunk.slice_each_axis(|axis| {
            Slice::from(0..extent[axis.axis.index()] as usize)
        });
        out.slice_each_axis_mut(|axis| {
            let dim = axis.axis.index();
            let begin = start[dim] as usize;
            Slice::from(begin..begin + extent[dim] as usize)
        })
        .assign(&chunk);
    }

    Ok(T::wrap(out).into())
}

/// Row-major chunk indices of the `linear`-th chunk of a grid.
fn unravel(mut linear: u64, grid_shape: &[u64]) -> Vec<u64> {
    let mut indices = vec![0; grid_shape.len()];
    for (index, &extent) in indices.iter_mut().zip(grid_shape).rev() {
        *index = linear % extent;
        linear /= extent;
    }
    indices
}
