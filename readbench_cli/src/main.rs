//! Command line front-end for the read benchmark.
//!
//! ```bash
//! readbench list
//! readbench --shape 5000x2000 --backend zarrs materialize
//! readbench --data-dir /scratch/readbench run --report report.json
//! ```
//!
//! `run` exits with a non-zero code when any combination failed or when the
//! backends disagree on the number of bytes read for a dataset.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use readbench::{
    layout::parse_shape, BackendKind, BenchmarkSuite, DatasetMatrix, ElementType, Outcome,
    Shape2, SuiteConfig, SuiteReport,
};

#[derive(Parser, Debug)]
#[command(
    name = "readbench",
    version,
    about = "Benchmarks full-array reads of chunked, compressed zarr stores"
)]
struct Cli {
    /// JSON suite configuration; the options below override it
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory the datasets are materialized in
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Sample asset to tile the arrays from
    #[arg(long, global = true, value_name = "PATH")]
    sample: Option<PathBuf>,

    /// Array shape, as ROWSxCOLS
    #[arg(long, global = true, value_parser = parse_shape)]
    shape: Option<Shape2>,

    #[arg(long, global = true)]
    element_type: Option<ElementType>,

    #[arg(long, global = true)]
    matrix: Option<DatasetMatrix>,

    /// Backend to run; may be repeated
    #[arg(long = "backend", global = true)]
    backends: Vec<BackendKind>,

    /// Only use the named dataset; may be repeated
    #[arg(long = "dataset", global = true)]
    datasets: Vec<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the selected datasets
    List,
    /// Write every selected dataset that is not on disk yet
    Materialize,
    /// Materialize and read every dataset with every backend
    Run {
        /// Write the JSON report here
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
}

impl Cli {
    fn suite_config(&self) -> Result<SuiteConfig> {
        let mut config = match &self.config {
            Some(path) => SuiteConfig::from_json_path(path)
                .with_context(|| format!("failed to load suite config {path:?}"))?,
            None => SuiteConfig::default(),
        };

        if let Some(data_dir) = &self.data_dir {
            config.base_data_path = data_dir.clone();
        }
        if let Some(sample) = &self.sample {
            config.sample_path = Some(sample.clone());
        }
        if let Some(shape) = self.shape {
            config.shape = shape;
        }
        if let Some(element_type) = self.element_type {
            config.element_type = element_type;
        }
        if let Some(matrix) = self.matrix {
            config.matrix = matrix;
        }
        if !self.backends.is_empty() {
            config.backends = self.backends.clone();
        }
        if !self.datasets.is_empty() {
            config.datasets = self.datasets.clone();
        }

        Ok(config)
    }
}

fn list(config: &SuiteConfig) -> Result<()> {
    let datasets = config.selected_datasets()?;
    println!(
        "{:<28} {:>14} {:>8} {:<14} {:>14}",
        "dataset", "chunk shape", "chunks", "codec", "bytes"
    );
    for spec in datasets {
        let (rows, cols) = spec.chunk_shape();
        println!(
            "{:<28} {:>14} {:>8} {:<14} {:>14}",
            spec.name,
            format!("{rows}x{cols}"),
            spec.logical_chunk_count(),
            spec.codec.label(),
            spec.nbytes()
        );
    }
    Ok(())
}

fn materialize(suite: &BenchmarkSuite) -> Result<()> {
    let results = suite.materialize_all().context("failed to load the sample")?;
    let mut failed = 0;
    for (name, result) in results {
        match result {
            Ok((path, outcome)) => println!("{name:<28} {outcome:?} {}", path.display()),
            Err(err) => {
                failed += 1;
                eprintln!("{name:<28} failed: {err}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} dataset(s) could not be materialized");
    }
    Ok(())
}

fn print_report(report: &SuiteReport) {
    println!(
        "{:<28} {:<8} {:>14} {:>10} {:>12}",
        "dataset", "backend", "bytes", "secs", "MiB/s"
    );
    for record in &report.records {
        match &record.outcome {
            Outcome::Succeeded {
                metrics,
                elapsed_secs,
            } => {
                let mib = metrics.bytes_materialized as f64 / (1024.0 * 1024.0);
                println!(
                    "{:<28} {:<8} {:>14} {:>10.3} {:>12.1}",
                    record.dataset,
                    record.backend,
                    metrics.bytes_materialized,
                    elapsed_secs,
                    mib / elapsed_secs.max(f64::EPSILON)
                );
            }
            Outcome::Failed { kind, message } => {
                println!(
                    "{:<28} {:<8} failed ({kind}): {message}",
                    record.dataset, record.backend
                );
            }
        }
    }
}

fn run(suite: &BenchmarkSuite, report_path: Option<&PathBuf>) -> Result<()> {
    let report = suite.run().context("benchmark suite aborted")?;
    print_report(&report);

    if let Some(path) = report_path {
        report
            .write_json(path)
            .with_context(|| format!("failed to write report {path:?}"))?;
        info!("report written to {path:?}");
    }

    let violations = report.consistency_violations();
    for violation in &violations {
        eprintln!(
            "backends disagree on {}: {:?}",
            violation.dataset, violation.byte_counts
        );
    }
    let failed = report.failed().count();
    if failed > 0 || !violations.is_empty() {
        bail!(
            "{failed} failed run(s), {} inconsistent dataset(s)",
            violations.len()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.suite_config()?;

    match &cli.cmd {
        Command::List => list(&config),
        Command::Materialize => materialize(&BenchmarkSuite::new(config)?),
        Command::Run { report } => run(&BenchmarkSuite::new(config)?, report.as_ref()),
    }
}
