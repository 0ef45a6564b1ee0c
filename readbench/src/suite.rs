//! The run harness: materializes datasets on demand, runs every workload
//! over its datasets and collects the outcome of each combination.
//!
//! Failures are isolated. A dataset that can't be materialized fails every
//! combination that reads it; a failing read fails only its own
//! combination. Only a missing sample asset aborts the whole run.

use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    time::Instant,
};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    backend::BackendKind,
    dataset::{DatasetMatrix, DatasetSpec, DEFAULT_SHAPE},
    error::{ErrorKind, MaterializationError, SampleError, SuiteError},
    layout::{ElementType, Shape2},
    materialize::Materialized,
    sample::{SampleSource, SourceArray},
    workload::{LoadEntireArray, MetricsRecord, Workload},
};

/// Everything a suite run depends on. Nothing is read from global state,
/// so suites with different parameters can run in the same process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Root directory for the materialized datasets.
    pub base_data_path: PathBuf,
    pub shape: Shape2,
    pub element_type: ElementType,
    /// Sample asset; `None` uses the bundled one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_path: Option<PathBuf>,
    pub matrix: DatasetMatrix,
    pub backends: Vec<BackendKind>,
    /// Only run the datasets with these names; empty runs all of them.
    pub datasets: Vec<String>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_data_path: PathBuf::from("readbench-data"),
            shape: DEFAULT_SHAPE,
            element_type: ElementType::UInt8,
            sample_path: None,
            matrix: DatasetMatrix::Standard,
            backends: BackendKind::ALL.to_vec(),
            datasets: vec![],
        }
    }
}

impl SuiteConfig {
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, serde_json::Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(serde_json::Error::io)?;
        serde_json::from_str(&content)
    }

    pub fn sample_source(&self) -> SampleSource {
        match &self.sample_path {
            Some(path) => SampleSource::new(path),
            None => SampleSource::bundled(),
        }
    }

    /// The datasets of the configured matrix, after the name filter. Every
    /// name in the filter must exist in the matrix.
    pub fn selected_datasets(&self) -> Result<Vec<DatasetSpec>, SuiteError> {
        let specs = self.matrix.specs(self.shape, self.element_type);
        if let Some(name) = self
            .datasets
            .iter()
            .find(|name| !specs.iter().any(|spec| &spec.name == *name))
        {
            return Err(SuiteError::UnknownDataset {
                name: name.clone(),
                matrix: self.matrix.to_string(),
            });
        }
        Ok(specs
            .into_iter()
            .filter(|spec| self.datasets.is_empty() || self.datasets.contains(&spec.name))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded {
        metrics: MetricsRecord,
        elapsed_secs: f64,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

/// The outcome of one (workload, dataset, backend) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub workload: String,
    pub backend: BackendKind,
    pub dataset: String,
    pub codec: String,
    pub chunk_count: u64,
    pub outcome: Outcome,
}

impl RunRecord {
    pub fn metrics(&self) -> Option<&MetricsRecord> {
        match &self.outcome {
            Outcome::Succeeded { metrics, .. } => Some(metrics),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.metrics().is_some()
    }
}

/// A dataset for which backends disagree on the byte count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyViolation {
    pub dataset: String,
    pub byte_counts: Vec<(BackendKind, u64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub shape: Shape2,
    pub element_type: ElementType,
    pub records: Vec<RunRecord>,
}

impl SuiteReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &RunRecord> {
        self.records.iter().filter(|record| record.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &RunRecord> {
        self.records.iter().filter(|record| !record.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.records.iter().all(RunRecord::is_success)
    }

    /// Datasets read by more than one backend with differing byte counts.
    pub fn consistency_violations(&self) -> Vec<ConsistencyViolation> {
        let mut by_dataset: BTreeMap<&str, Vec<(BackendKind, u64)>> = BTreeMap::new();
        for record in &self.records {
            if let Some(metrics) = record.metrics() {
                by_dataset
                    .entry(record.dataset.as_str())
                    .or_default()
                    .push((record.backend, metrics.bytes_materialized));
            }
        }

        by_dataset
            .into_iter()
            .filter(|(_, counts)| counts.windows(2).any(|pair| pair[0].1 != pair[1].1))
            .map(|(dataset, byte_counts)| ConsistencyViolation {
                dataset: dataset.to_owned(),
                byte_counts,
            })
            .collect()
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), serde_json::Error> {
        let file = File::create(path.as_ref()).map_err(serde_json::Error::io)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
    }
}

pub struct BenchmarkSuite {
    config: SuiteConfig,
    workloads: Vec<Box<dyn Workload>>,
}

impl BenchmarkSuite {
    /// One [`LoadEntireArray`] workload per configured backend, each over
    /// the selected datasets.
    pub fn new(config: SuiteConfig) -> Result<Self, SuiteError> {
        let datasets = config.selected_datasets()?;
        let workloads = config
            .backends
            .iter()
            .map(|kind| {
                Box::new(LoadEntireArray::new(*kind, datasets.clone())) as Box<dyn Workload>
            })
            .collect();
        Self::with_workloads(config, workloads)
    }

    /// Fails if two different datasets would be stored at the same path.
    pub fn with_workloads(
        config: SuiteConfig,
        workloads: Vec<Box<dyn Workload>>,
    ) -> Result<Self, SuiteError> {
        let suite = Self { config, workloads };
        let mut by_path: HashMap<PathBuf, &DatasetSpec> = HashMap::new();
        for spec in suite.workloads.iter().flat_map(|w| w.declared_datasets()) {
            let path = spec.resolve_path(&suite.config.base_data_path);
            match by_path.get(&path) {
                Some(other) if *other != spec => {
                    return Err(SuiteError::PathCollision {
                        first: other.name.clone(),
                        second: spec.name.clone(),
                        path,
                    });
                }
                Some(_) => {}
                None => {
                    by_path.insert(path, spec);
                }
            }
        }
        Ok(suite)
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn workloads(&self) -> &[Box<dyn Workload>] {
        &self.workloads
    }

    /// Every distinct dataset declared by any workload, in first-seen order.
    pub fn declared_datasets(&self) -> Vec<&DatasetSpec> {
        let mut seen: Vec<&DatasetSpec> = vec![];
        for spec in self.workloads.iter().flat_map(|w| w.declared_datasets()) {
            if !seen.contains(&spec) {
                seen.push(spec);
            }
        }
        seen
    }

    /// Materialize every declared dataset without reading any of them.
    pub fn materialize_all(
        &self,
    ) -> Result<Vec<(String, Result<(PathBuf, Materialized), MaterializationError>)>, SampleError>
    {
        let source = self.config.sample_source().load()?;
        Ok(self
            .declared_datasets()
            .into_iter()
            .map(|spec| {
                let result = spec.ensure_materialized(&self.config.base_data_path, &source);
                (spec.name.clone(), result)
            })
            .collect())
    }

    /// Run every workload over each of its datasets, strictly one
    /// combination after the other.
    pub fn run(&self) -> Result<SuiteReport, SampleError> {
        let source = self.config.sample_source().load()?;
        // keyed by store path; construction guarantees one dataset per path
        let mut prepared: HashMap<PathBuf, Result<PathBuf, String>> = HashMap::new();
        let mut records = vec![];

        for workload in &self.workloads {
            for spec in workload.declared_datasets() {
                let dataset_path = prepared
                    .entry(spec.resolve_path(&self.config.base_data_path))
                    .or_insert_with(|| self.prepare(spec, &source))
                    .clone();

                let outcome = match dataset_path {
                    Ok(path) => run_one(workload.as_ref(), &path),
                    Err(message) => Outcome::Failed {
                        kind: ErrorKind::Materialization,
                        message,
                    },
                };

                match &outcome {
                    Outcome::Succeeded {
                        metrics,
                        elapsed_secs,
                    } => info!(
                        "{} / {}: {} bytes in {elapsed_secs:.3}s",
                        workload.name(),
                        spec.name,
                        metrics.bytes_materialized
                    ),
                    Outcome::Failed { kind, message } => warn!(
                        "{} / {} failed ({kind}): {message}",
                        workload.name(),
                        spec.name
                    ),
                }

                records.push(RunRecord {
                    workload: workload.name().to_owned(),
                    backend: workload.backend(),
                    dataset: spec.name.clone(),
                    codec: spec.codec.label(),
                    chunk_count: spec.logical_chunk_count(),
                    outcome,
                });
            }
        }

        Ok(SuiteReport {
            shape: self.config.shape,
            element_type: self.config.element_type,
            records,
        })
    }

    fn prepare(&self, spec: &DatasetSpec, source: &SourceArray) -> Result<PathBuf, String> {
        match spec.ensure_materialized(&self.config.base_data_path, source) {
            Ok((path, _)) => Ok(path),
            Err(err) => {
                warn!("could not materialize {}: {err}", spec.name);
                Err(err.to_string())
            }
        }
    }
}

fn run_one(workload: &dyn Workload, path: &Path) -> Outcome {
    let start = Instant::now();
    match workload.execute(path) {
        Ok(metrics) => Outcome::Succeeded {
            metrics,
            elapsed_secs: start.elapsed().as_secs_f64(),
        },
        Err(err) => Outcome::Failed {
            kind: ErrorKind::BackendRead,
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use tempfile::tempdir;

    use super::{
        BenchmarkSuite, ConsistencyViolation, Outcome, RunRecord, SuiteConfig, SuiteReport,
    };
    use crate::{
        backend::BackendKind,
        codec::Codec,
        dataset::{DatasetMatrix, DatasetSpec},
        error::{ErrorKind, SampleError, SuiteError},
        layout::{Chunking, ElementType},
        workload::{LoadEntireArray, MetricsRecord, Workload},
    };

    fn small_config(base: &Path) -> SuiteConfig {
        SuiteConfig {
            base_data_path: base.to_owned(),
            shape: (120, 240),
            datasets: vec![
                "Uncompressed_1_Chunk".to_owned(),
                "LZ4_200_Chunks".to_owned(),
                "Uncompressed_200_Chunks".to_owned(),
            ],
            ..SuiteConfig::default()
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = SuiteConfig::default();
        assert_eq!(config.shape, (50_000, 20_000));
        assert_eq!(config.backends, vec![BackendKind::Zarrs, BackendKind::Ndarray]);
        assert_eq!(config.selected_datasets().unwrap().len(), 5);
    }

    #[test]
    fn test_config_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("suite.json");
        std::fs::write(
            &path,
            r#"{"base_data_path": "/tmp/x", "shape": [100, 200], "element_type": "u16",
                "matrix": "extended", "backends": ["ndarray"]}"#,
        )
        .unwrap();
        let config = SuiteConfig::from_json_path(&path).unwrap();
        assert_eq!(config.shape, (100, 200));
        assert_eq!(config.element_type, ElementType::UInt16);
        assert_eq!(config.matrix, DatasetMatrix::Extended);
        assert_eq!(config.backends, vec![BackendKind::Ndarray]);
        assert_eq!(config.selected_datasets().unwrap().len(), 7);

        assert!(SuiteConfig::from_json_path(dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_run_small_suite() {
        let dir = tempdir().unwrap();
        let suite = BenchmarkSuite::new(small_config(dir.path())).unwrap();
        let report = suite.run().unwrap();

        assert_eq!(report.records.len(), 6);
        assert!(report.all_succeeded());
        assert!(report.consistency_violations().is_empty());
        for record in &report.records {
            assert_eq!(record.metrics().unwrap().bytes_materialized, 120 * 240);
        }
        // datasets are materialized once and then shared by both workloads
        assert_eq!(
            std::fs::read_dir(dir.path())
                .unwrap()
                .filter(|entry| entry.as_ref().unwrap().path().extension().is_some())
                .count(),
            3
        );

        let report_path = dir.path().join("report.json");
        report.write_json(&report_path).unwrap();
        let parsed: SuiteReport =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(parsed.records.len(), report.records.len());
    }

    #[test]
    fn test_failures_are_isolated() {
        let dir = tempdir().unwrap();
        let config = small_config(dir.path());
        // a regular file where the store directory should go
        let blocked = config.selected_datasets().unwrap()[1].resolve_path(dir.path());
        std::fs::write(&blocked, b"not a store").unwrap();

        let report = BenchmarkSuite::new(config).unwrap().run().unwrap();
        assert_eq!(report.records.len(), 6);
        assert_eq!(report.failed().count(), 2);
        assert_eq!(report.succeeded().count(), 4);
        for record in report.failed() {
            assert_eq!(record.dataset, "LZ4_200_Chunks");
            assert!(matches!(
                record.outcome,
                Outcome::Failed {
                    kind: ErrorKind::Materialization,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_missing_sample_aborts() {
        let dir = tempdir().unwrap();
        let config = SuiteConfig {
            sample_path: Some(dir.path().join("no_sample.bin")),
            ..small_config(dir.path())
        };
        let err = BenchmarkSuite::new(config).unwrap().run().unwrap_err();
        assert!(matches!(err, SampleError::AssetMissing { .. }));
        assert_eq!(err.kind(), ErrorKind::AssetMissing);
    }

    #[test]
    fn test_consistency_violations() {
        let record = |backend: BackendKind, bytes: u64| RunRecord {
            workload: format!("{backend}_load_entire_array"),
            backend,
            dataset: "ds".to_owned(),
            codec: "none".to_owned(),
            chunk_count: 1,
            outcome: Outcome::Succeeded {
                metrics: MetricsRecord {
                    bytes_materialized: bytes,
                },
                elapsed_secs: 0.1,
            },
        };
        let report = SuiteReport {
            shape: (1, 1),
            element_type: ElementType::UInt8,
            records: vec![record(BackendKind::Zarrs, 10), record(BackendKind::Ndarray, 12)],
        };
        assert_eq!(
            report.consistency_violations(),
            vec![ConsistencyViolation {
                dataset: "ds".to_owned(),
                byte_counts: vec![(BackendKind::Zarrs, 10), (BackendKind::Ndarray, 12)],
            }]
        );
    }

    #[test]
    fn test_rerun_with_other_shape_rewrites_datasets() {
        let dir = tempdir().unwrap();
        let first = BenchmarkSuite::new(small_config(dir.path()))
            .unwrap()
            .run()
            .unwrap();
        assert!(first.all_succeeded());

        let config = SuiteConfig {
            shape: (60, 90),
            element_type: ElementType::UInt16,
            ..small_config(dir.path())
        };
        let second = BenchmarkSuite::new(config).unwrap().run().unwrap();
        assert_eq!(second.records.len(), 6);
        for record in &second.records {
            assert_eq!(
                record.metrics().unwrap().bytes_materialized,
                60 * 90 * 2,
                "{} with {}",
                record.dataset,
                record.backend
            );
        }
    }

    #[test]
    fn test_unknown_dataset_is_rejected() {
        let dir = tempdir().unwrap();
        let config = SuiteConfig {
            datasets: vec!["LZ4_200_Chunks".to_owned(), "Snappy_7_Chunks".to_owned()],
            ..small_config(dir.path())
        };
        let err = config.selected_datasets().unwrap_err();
        assert!(
            matches!(&err, SuiteError::UnknownDataset { name, .. } if name == "Snappy_7_Chunks")
        );
        assert!(matches!(
            BenchmarkSuite::new(config),
            Err(SuiteError::UnknownDataset { .. })
        ));
    }

    #[test]
    fn test_colliding_dataset_paths_are_rejected() {
        let dir = tempdir().unwrap();
        let dataset = |name: &str| {
            DatasetSpec::new(name, (8, 8), Chunking::Disabled, Codec::None, ElementType::UInt8)
        };
        let workloads: Vec<Box<dyn Workload>> = vec![Box::new(LoadEntireArray::new(
            BackendKind::Zarrs,
            vec![dataset("A-B"), dataset("a_b")],
        ))];
        let err = BenchmarkSuite::with_workloads(small_config(dir.path()), workloads)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SuiteError::PathCollision { ref first, ref second, .. } if first == "A-B" && second == "a_b"
        ));

        // the same dataset read by two workloads shares one store
        let workloads: Vec<Box<dyn Workload>> = BackendKind::ALL
            .into_iter()
            .map(|kind| {
                Box::new(LoadEntireArray::new(kind, vec![dataset("shared")])) as Box<dyn Workload>
            })
            .collect();
        let suite = BenchmarkSuite::with_workloads(small_config(dir.path()), workloads).unwrap();
        assert_eq!(suite.declared_datasets().len(), 1);
    }
}
