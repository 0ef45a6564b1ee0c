use std::{
    fs::{self, File},
    path::Path,
    sync::Arc,
};

use log::{debug, info, warn};
use ndarray::Array2;
use zarrs::{
    array::{Array, ArrayBuilder, Element},
    storage::{
        store::FilesystemStore, ReadableWritableListableStorage,
        ReadableWritableListableStorageTraits,
    },
};

use crate::{
    codec::Codec,
    error::MaterializationError,
    layout::{Chunking, ElementType, Shape2},
    sample::SourceArray,
    store,
};

/// What [`ArrayMaterializer::materialize`] did with the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    Written,
    /// A complete store with the same layout was already present and left
    /// untouched.
    Reused,
}

/// Writes tiled sample content into a Zarr v3 store. This is the only
/// write path of the crate.
///
/// The store is assembled in a hidden staging directory next to the
/// destination and renamed into place after every file has been synced,
/// so the destination either holds a complete store or no valid metadata.
pub struct ArrayMaterializer<'a> {
    source: &'a SourceArray,
}

impl<'a> ArrayMaterializer<'a> {
    pub fn new(source: &'a SourceArray) -> Self {
        Self { source }
    }

    pub fn materialize(
        &self,
        destination: &Path,
        shape: Shape2,
        chunking: Chunking,
        element_type: ElementType,
        codec: &Codec,
    ) -> Result<Materialized, MaterializationError> {
        let chunk_shape = chunking.chunk_shape(shape);
        if shape.0 == 0 || shape.1 == 0 {
            return Err(MaterializationError::InvalidLayout {
                msg: format!("array shape {shape:?} has a zero extent"),
            });
        }
        if chunk_shape.0 == 0 || chunk_shape.1 == 0 {
            return Err(MaterializationError::InvalidLayout {
                msg: format!("chunk shape {chunk_shape:?} has a zero extent"),
            });
        }

        if let Ok(stored) = store::read_array_metadata(destination) {
            if stored.shape == [shape.0, shape.1]
                && stored.chunk_shape() == Some(&[chunk_shape.0, chunk_shape.1][..])
                && stored.data_type == element_type.zarr_name()
                && codec.matches_stored(&stored.codecs)
            {
                info!("reusing existing store at {destination:?}");
                return Ok(Materialized::Reused);
            }
            warn!("store at {destination:?} was written with a different layout");
        }

        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|err| MaterializationError::io(parent, err))?;

        let staging = tempfile::Builder::new()
            .prefix(".readbench-staging-")
            .tempdir_in(parent)
            .map_err(|err| MaterializationError::io(parent, err))?;

        info!(
            "materializing {shape:?} {element_type} array, chunks {chunk_shape:?}, codec {}, into {destination:?}",
            codec.label()
        );
        self.write_store(staging.path(), shape, chunk_shape, element_type, codec)?;
        sync_tree(staging.path())?;

        if destination.exists() {
            warn!("replacing store at {destination:?}");
            fs::remove_dir_all(destination)
                .map_err(|err| MaterializationError::io(destination, err))?;
        }
        fs::rename(staging.path(), destination)
            .map_err(|err| MaterializationError::io(destination, err))?;
        sync_dir(parent)?;

        Ok(Materialized::Written)
    }

    fn write_store(
        &self,
        root: &Path,
        shape: Shape2,
        chunk_shape: Shape2,
        element_type: ElementType,
        codec: &Codec,
    ) -> Result<(), MaterializationError> {
        let store: ReadableWritableListableStorage = Arc::new(
            FilesystemStore::new(root).map_err(|err| MaterializationError::Store {
                path: root.to_owned(),
                source: Box::new(err),
            })?,
        );

        let mut builder = ArrayBuilder::new(
            vec![shape.0, shape.1],
            element_type.data_type(),
            vec![chunk_shape.0, chunk_shape.1]
                .try_into()
                .map_err(|_| MaterializationError::InvalidLayout {
                    msg: format!("invalid chunk shape {chunk_shape:?}"),
                })?,
            element_type.fill_value(),
        );
        builder.bytes_to_bytes_codecs(codec.bytes_to_bytes_codecs(element_type.size())?);
        let array = builder.build(Arc::clone(&store), "/")?;

        match element_type {
            ElementType::UInt8 => self.write_bands::<u8>(&array, shape, chunk_shape)?,
            ElementType::UInt16 => self.write_bands::<u16>(&array, shape, chunk_shape)?,
            ElementType::UInt32 => self.write_bands::<u32>(&array, shape, chunk_shape)?,
            ElementType::UInt64 => self.write_bands::<u64>(&array, shape, chunk_shape)?,
        }

        // chunks first, metadata last
        array
            .store_metadata()
            .map_err(|err| MaterializationError::Store {
                path: root.to_owned(),
                source: Box::new(err),
            })?;
        debug!("array metadata stored");
        Ok(())
    }

    /// Write the array one band of chunk rows at a time, so every chunk is
    /// encoded exactly once and at most one band is held in memory.
    fn write_bands<T>(
        &self,
        array: &Array<dyn ReadableWritableListableStorageTraits>,
        shape: Shape2,
        chunk_shape: Shape2,
    ) -> Result<(), MaterializationError>
    where
        T: Element + From<u8>,
    {
        let mut row = 0;
        while row < shape.0 {
            let band_rows = chunk_shape.0.min(shape.0 - row);
            let band = self
                .source
                .tile_window((row, 0), (band_rows as usize, shape.1 as usize));
            let band: Array2<T> = band.mapv(T::from);
            array.store_array_subset_ndarray(&[row, 0], band)?;
            debug!("stored rows {row}..{}", row + band_rows);
            row += band_rows;
        }
        Ok(())
    }
}

/// fsync every file and directory below `path`.
fn sync_tree(path: &Path) -> Result<(), MaterializationError> {
    let entries = fs::read_dir(path).map_err(|err| MaterializationError::io(path, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| MaterializationError::io(path, err))?;
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|err| MaterializationError::io(&entry_path, err))?;
        if file_type.is_dir() {
            sync_tree(&entry_path)?;
        } else {
            File::open(&entry_path)
                .and_then(|file| file.sync_all())
                .map_err(|err| MaterializationError::io(&entry_path, err))?;
        }
    }
    sync_dir(path)
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<(), MaterializationError> {
    File::open(path)
        .and_then(|dir| dir.sync_all())
        .map_err(|err| MaterializationError::io(path, err))
}

// directories can't be opened for syncing on every platform
#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> Result<(), MaterializationError> {
    Ok(())
}
