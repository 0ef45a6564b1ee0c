use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    backend::{BackendAdapter, BackendKind},
    dataset::DatasetSpec,
    error::BackendReadError,
};

/// The metric produced by one read of one dataset with one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Bytes of the decoded array in memory, independent of compression.
    pub bytes_materialized: u64,
}

/// A read workload over a fixed, ordered set of datasets.
pub trait Workload {
    fn name(&self) -> &str;

    fn backend(&self) -> BackendKind;

    fn declared_datasets(&self) -> &[DatasetSpec];

    /// Read the already-materialized dataset at `dataset_path` once.
    fn execute(&self, dataset_path: &Path) -> Result<MetricsRecord, BackendReadError>;
}

/// Loads every declared dataset entirely into memory with one backend.
pub struct LoadEntireArray {
    name: String,
    kind: BackendKind,
    backend: Box<dyn BackendAdapter>,
    datasets: Vec<DatasetSpec>,
}

impl LoadEntireArray {
    pub fn new(kind: BackendKind, datasets: Vec<DatasetSpec>) -> Self {
        Self {
            name: format!("{kind}_load_entire_array"),
            kind,
            backend: kind.adapter(),
            datasets,
        }
    }
}

impl Workload for LoadEntireArray {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> BackendKind {
        self.kind
    }

    fn declared_datasets(&self) -> &[DatasetSpec] {
        &self.datasets
    }

    fn execute(&self, dataset_path: &Path) -> Result<MetricsRecord, BackendReadError> {
        let loaded = self.backend.load_full_array(dataset_path)?;
        Ok(MetricsRecord {
            bytes_materialized: loaded.byte_count,
        })
    }
}
