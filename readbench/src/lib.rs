//! Read-performance benchmark for chunked, compressed 2-D arrays in the
//! zarr v3 format.
//!
//! A small sample image is tiled up to the benchmark shape and written once
//! per storage configuration (chunking x codec). Every configured backend
//! then loads each stored array completely into memory, and the suite
//! records how many bytes each read produced and how long it took.

pub mod backend;
pub mod codec;
pub mod dataset;
pub mod error;
pub mod layout;
pub mod materialize;
pub mod sample;
pub mod store;
pub mod suite;
pub mod workload;

pub use backend::{BackendAdapter, BackendKind, InMemoryArray, LoadedArray};
pub use codec::Codec;
pub use dataset::{DatasetMatrix, DatasetSpec, DEFAULT_SHAPE};
pub use error::{BackendReadError, ErrorKind, MaterializationError, SampleError, SuiteError};
pub use layout::{Chunking, ElementType, Shape2};
pub use materialize::{ArrayMaterializer, Materialized};
pub use sample::{SampleSource, SourceArray};
pub use suite::{BenchmarkSuite, Outcome, RunRecord, SuiteConfig, SuiteReport};
pub use workload::{LoadEntireArray, MetricsRecord, Workload};
