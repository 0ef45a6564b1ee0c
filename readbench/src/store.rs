//! Inspection of Zarr v3 stores on the local file system.
//!
//! Both the materializer (to decide whether a store can be reused) and the
//! backend adapters (to find the array to read) look at the raw node
//! metadata here, before handing the store to `zarrs`.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::debug;
use serde::Deserialize;

use crate::error::BackendReadError;

/// Name of the node metadata document in every Zarr v3 node directory.
pub const METADATA_FILE: &str = "zarr.json";

#[derive(Debug, Deserialize)]
struct NodeMetadata {
    zarr_format: u64,
    node_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Array,
    Group,
}

/// Read the node type of the Zarr v3 node rooted at `dir`.
pub fn read_node_type(dir: &Path) -> Result<NodeType, BackendReadError> {
    let metadata_path = dir.join(METADATA_FILE);
    let bytes = match fs::read(&metadata_path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(BackendReadError::MissingMetadata {
                path: dir.to_owned(),
            });
        }
        Err(err) => {
            return Err(BackendReadError::Store {
                path: metadata_path,
                source: Box::new(err),
            });
        }
    };

    let invalid = |msg: String| BackendReadError::InvalidMetadata {
        path: metadata_path.clone(),
        msg,
    };

    let metadata: NodeMetadata =
        serde_json::from_slice(&bytes).map_err(|err| invalid(err.to_string()))?;
    if metadata.zarr_format != 3 {
        return Err(invalid(format!(
            "unsupported zarr_format {}",
            metadata.zarr_format
        )));
    }
    match metadata.node_type.as_str() {
        "array" => Ok(NodeType::Array),
        "group" => Ok(NodeType::Group),
        other => Err(invalid(format!("unknown node_type `{other}`"))),
    }
}

/// Does `dir` hold complete array metadata?
pub fn is_materialized(dir: &Path) -> bool {
    matches!(read_node_type(dir), Ok(NodeType::Array))
}

/// The parts of an array's metadata that say how it was written.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredArray {
    pub shape: Vec<u64>,
    pub data_type: String,
    chunk_grid: StoredChunkGrid,
    #[serde(default)]
    pub codecs: Vec<StoredCodec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct StoredChunkGrid {
    name: String,
    configuration: Option<RegularChunkGrid>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RegularChunkGrid {
    chunk_shape: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredCodec {
    pub name: String,
    #[serde(default)]
    pub configuration: serde_json::Value,
}

impl StoredArray {
    /// `None` unless the array uses a regular chunk grid.
    pub fn chunk_shape(&self) -> Option<&[u64]> {
        match &self.chunk_grid {
            StoredChunkGrid {
                name,
                configuration: Some(grid),
            } if name == "regular" => Some(&grid.chunk_shape),
            _ => None,
        }
    }
}

/// Read the array metadata of the array node rooted at `dir`.
pub fn read_array_metadata(dir: &Path) -> Result<StoredArray, BackendReadError> {
    if read_node_type(dir)? != NodeType::Array {
        return Err(BackendReadError::NoArrays {
            path: dir.to_owned(),
        });
    }
    let metadata_path = dir.join(METADATA_FILE);
    let bytes = fs::read(&metadata_path).map_err(|err| BackendReadError::Store {
        path: metadata_path.clone(),
        source: Box::new(err),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| BackendReadError::InvalidMetadata {
        path: metadata_path,
        msg: err.to_string(),
    })
}

/// Find the array to read in the store rooted at `root`, as a store path.
///
/// A root array is used directly. For a root group, the first child array
/// in name order is used. A store without any array is an error.
pub fn locate_array(root: &Path) -> Result<String, BackendReadError> {
    match read_node_type(root)? {
        NodeType::Array => Ok("/".to_owned()),
        NodeType::Group => {
            let entries = fs::read_dir(root).map_err(|err| BackendReadError::Store {
                path: root.to_owned(),
                source: Box::new(err),
            })?;

            let mut children: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            children.sort();

            for child in children {
                if let Ok(NodeType::Array) = read_node_type(&child) {
                    if let Some(name) = child.file_name().and_then(|name| name.to_str()) {
                        debug!("using array {name:?} of group {root:?}");
                        return Ok(format!("/{name}"));
                    }
                }
            }

            Err(BackendReadError::NoArrays {
                path: root.to_owned(),
            })
        }
    }
}
