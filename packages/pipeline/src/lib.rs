#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Runs the cleaning and clustering stages against on-disk artifacts.
//!
//! The two stages communicate only through the cleaned snapshot file: the
//! cleaning stage writes it, the clustering stage reads it back. Either can
//! therefore run alone, and a full [`Pipeline::run`] is exactly one followed
//! by the other.
//!
//! A halted run never writes a partial artifact. If cleaning leaves no
//! records, the previous snapshot and centroid table stay as they were.

pub mod config;
pub mod error;
pub mod progress;

use std::sync::Arc;
use std::time::{Duration, Instant};

use safe_route_clean::{CleanOutcome, CleanReport, CleanedRecords};
use safe_route_cluster::export::black_spots_to_geojson_string;
use safe_route_cluster::{
    ClusterParams, ClusterSummary, KMeansPartitioner, Partitioner, identify_black_spots,
};
use safe_route_store::{load_table, save_bytes, save_rows, save_table};
use serde::Serialize;

pub use config::{ConfigError, PipelineConfig};
pub use error::{FailureKind, PipelineError, PipelineHalt};
pub use progress::{LogProgress, NullProgress, ProgressCallback, null_progress};

/// Progress steps reported by the cleaning stage.
const CLEAN_STEPS: u64 = 3;
/// Progress steps reported by the clustering stage.
const CLUSTER_STEPS: u64 = 3;

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineReport {
    /// Cleaning counts, if the cleaning stage ran.
    pub clean: Option<CleanReport>,
    /// Cluster counts, if the clustering stage ran.
    pub clusters: Option<ClusterSummary>,
    /// Wall-clock time for the whole run.
    pub elapsed: Duration,
}

/// A configured pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    partitioner: Box<dyn Partitioner>,
    progress: Arc<dyn ProgressCallback>,
}

impl Pipeline {
    /// Creates a pipeline that clusters with k-means using the configured
    /// settings and reports no progress.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let partitioner = KMeansPartitioner::new(config.kmeans);
        Self {
            config,
            partitioner: Box::new(partitioner),
            progress: null_progress(),
        }
    }

    /// Replaces the partitioner.
    #[must_use]
    pub fn with_partitioner(mut self, partitioner: impl Partitioner + 'static) -> Self {
        self.partitioner = Box::new(partitioner);
        self
    }

    /// Sets the progress reporter.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loads the raw table, cleans it, and writes the cleaned snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineHalt`] if the configuration is invalid, the raw
    /// table is unavailable or lacks a coordinate column, no records survive
    /// cleaning, or the snapshot cannot be written.
    pub fn run_cleaning(&self) -> Result<PipelineReport, PipelineHalt> {
        let start = Instant::now();
        self.config.validate()?;
        self.progress.set_total(CLEAN_STEPS);

        let result = self.clean_stage();
        self.finish(&result, "Cleaning complete");
        let clean = result?;

        Ok(PipelineReport {
            clean: Some(clean),
            clusters: None,
            elapsed: start.elapsed(),
        })
    }

    /// Reads the cleaned snapshot, clusters it, and writes the centroid
    /// table plus any optional outputs.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineHalt`] if the configuration is invalid, the
    /// snapshot is unavailable or corrupt, there are fewer records than
    /// clusters, or an output cannot be written.
    pub fn run_clustering(&self) -> Result<PipelineReport, PipelineHalt> {
        let start = Instant::now();
        self.config.validate()?;
        self.progress.set_total(CLUSTER_STEPS);

        let result = self.cluster_stage(None);
        self.finish(&result, "Clustering complete");
        let clusters = result?;

        Ok(PipelineReport {
            clean: None,
            clusters: Some(clusters),
            elapsed: start.elapsed(),
        })
    }

    /// Runs cleaning and then clustering.
    ///
    /// If clustering halts, the returned [`PipelineHalt`] still carries the
    /// cleaning counts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineHalt`] for any failure of either stage.
    pub fn run(&self) -> Result<PipelineReport, PipelineHalt> {
        let start = Instant::now();
        self.config.validate()?;
        self.progress.set_total(CLEAN_STEPS + CLUSTER_STEPS);

        let result = self.clean_stage().and_then(|clean| {
            self.cluster_stage(Some(clean))
                .map(|clusters| (clean, clusters))
        });
        self.finish(&result, "Pipeline complete");
        let (clean, clusters) = result?;

        let elapsed = start.elapsed();
        log::info!("Pipeline finished in {:.2}s", elapsed.as_secs_f64());

        Ok(PipelineReport {
            clean: Some(clean),
            clusters: Some(clusters),
            elapsed,
        })
    }

    fn clean_stage(&self) -> Result<CleanReport, PipelineHalt> {
        let config = &self.config;
        let delimiter = config.delimiter_byte();

        self.progress
            .set_message(format!("Loading {}", config.input.display()));
        let raw = load_table(&config.input, delimiter).map_err(PipelineError::from_load)?;
        log::info!("Loaded {} raw rows from {}", raw.len(), config.input.display());
        self.progress.inc(1);

        self.progress.set_message("Cleaning records".to_owned());
        let CleanOutcome { records, report } = safe_route_clean::clean(&raw, &config.bounding_box)?;
        self.progress.inc(1);

        let with_report = |error: PipelineError| PipelineHalt {
            error,
            clean_report: Some(report),
        };

        if records.is_empty() {
            log::warn!(
                "No records survived cleaning; {} left untouched",
                config.cleaned_output.display()
            );
            return Err(with_report(PipelineError::InsufficientData {
                records: 0,
                required: 1,
            }));
        }

        self.progress
            .set_message(format!("Writing {}", config.cleaned_output.display()));
        save_table(&config.cleaned_output, &records.to_table(), delimiter)
            .map_err(|e| with_report(e.into()))?;
        self.progress.inc(1);

        log::info!(
            "Saved {} cleaned records to {}",
            records.len(),
            config.cleaned_output.display()
        );

        Ok(report)
    }

    fn cluster_stage(
        &self,
        clean_report: Option<CleanReport>,
    ) -> Result<ClusterSummary, PipelineHalt> {
        let halt = |error: PipelineError| PipelineHalt {
            error,
            clean_report,
        };
        self.cluster_outputs().map_err(halt)
    }

    fn cluster_outputs(&self) -> Result<ClusterSummary, PipelineError> {
        let config = &self.config;
        let delimiter = config.delimiter_byte();

        self.progress
            .set_message(format!("Loading {}", config.cleaned_output.display()));
        let snapshot =
            load_table(&config.cleaned_output, delimiter).map_err(PipelineError::from_load)?;
        let records = CleanedRecords::from_table(&snapshot)?;
        self.progress.inc(1);

        self.progress
            .set_message(format!("Clustering {} records", records.len()));
        let params = ClusterParams {
            clusters: config.clusters,
            seed: config.seed,
            thresholds: config.risk,
        };
        let outcome = identify_black_spots(&records, &params, self.partitioner.as_ref())?;
        self.progress.inc(1);

        // Rendered up front so a failure leaves every artifact untouched.
        let geojson = config
            .geojson_output
            .as_ref()
            .map(|path| black_spots_to_geojson_string(&outcome.black_spots).map(|s| (path, s)))
            .transpose()?;

        self.progress
            .set_message(format!("Writing {}", config.centroids_output.display()));
        save_rows(&config.centroids_output, &outcome.black_spots)?;
        log::info!(
            "Saved black spot centroids to {}",
            config.centroids_output.display()
        );

        if let Some(path) = &config.labeled_output {
            save_table(path, &outcome.labeled_table(&records), delimiter)?;
            log::info!("Saved labeled records to {}", path.display());
        }

        if let Some((path, geojson)) = geojson {
            save_bytes(path, geojson.as_bytes())?;
            log::info!("Saved black spot GeoJSON to {}", path.display());
        }
        self.progress.inc(1);

        let summary = outcome.summary();
        log::info!(
            "{} clusters: {} high, {} moderate, {} low risk ({} empty)",
            summary.clusters,
            summary.high,
            summary.moderate,
            summary.low,
            summary.empty_clusters
        );

        Ok(summary)
    }

    fn finish<T>(&self, result: &Result<T, PipelineHalt>, message: &str) {
        match result {
            Ok(_) => self.progress.finish(message.to_owned()),
            Err(_) => self.progress.finish_and_clear(),
        }
    }
}
