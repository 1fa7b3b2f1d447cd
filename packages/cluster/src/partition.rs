//! Pluggable "partition points into k centers" capability.
//!
//! The clustering stage only needs labels and centroids back, so the
//! algorithm sits behind [`Partitioner`]. [`KMeansPartitioner`] is the
//! production implementation, backed by `linfa-clustering`.

use std::collections::BTreeSet;

use linfa::DatasetBase;
use linfa::traits::{Fit, Predict};
use linfa_clustering::{KMeans, KMeansInit};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::ClusterError;

/// Cluster assignment for a point matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Cluster index of each input row, in row order.
    pub labels: Vec<usize>,
    /// Centroid of each cluster as `[latitude, longitude]`, indexed by
    /// cluster.
    pub centroids: Vec<[f64; 2]>,
}

/// Partitions an `(n, 2)` matrix of `(latitude, longitude)` rows into `k`
/// clusters.
///
/// Implementations must be deterministic for a given `seed`. Callers
/// guarantee `1 <= k <= n` and that every value is finite.
pub trait Partitioner {
    /// Returns one label per row and exactly `k` centroids.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError`] if the underlying algorithm fails.
    fn partition(&self, points: &Array2<f64>, k: usize, seed: u64)
    -> Result<Partition, ClusterError>;
}

/// Tuning knobs for [`KMeansPartitioner`].
///
/// The defaults use the same numbers as scikit-learn's `KMeans` but do not
/// behave identically. `tolerance` bounds the absolute centroid movement in
/// degrees, where scikit-learn scales its tolerance by the data variance.
/// linfa's update step also folds the previous centroid into the mean of
/// its points, so a reported centroid can sit slightly off the plain mean of
/// its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansSettings {
    /// Independent seedings; the run with the lowest inertia wins.
    pub runs: usize,
    /// Lloyd iterations per run.
    pub max_iterations: u64,
    /// Convergence threshold on absolute centroid movement, in degrees.
    pub tolerance: f64,
}

impl Default for KMeansSettings {
    fn default() -> Self {
        Self {
            runs: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

/// Lloyd's k-means with Euclidean distance on raw degrees.
///
/// No map projection is applied, so east-west distances are overstated
/// relative to north-south ones away from the equator. At city scale the
/// distortion is uniform enough that cluster shapes are still sensible.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KMeansPartitioner {
    settings: KMeansSettings,
}

impl KMeansPartitioner {
    /// Creates a partitioner with the given settings.
    #[must_use]
    pub const fn new(settings: KMeansSettings) -> Self {
        Self { settings }
    }

    /// Settings in use.
    #[must_use]
    pub const fn settings(&self) -> &KMeansSettings {
        &self.settings
    }
}

impl Partitioner for KMeansPartitioner {
    fn partition(
        &self,
        points: &Array2<f64>,
        k: usize,
        seed: u64,
    ) -> Result<Partition, ClusterError> {
        // k-means++ draws each new seed weighted by distance to the existing
        // ones, which needs at least k distinct points to draw from.
        let distinct = distinct_points(points);
        let init = if distinct < k {
            log::warn!(
                "Only {distinct} distinct locations for {k} clusters; \
                 some clusters will be empty"
            );
            KMeansInit::Random
        } else {
            KMeansInit::KMeansPlusPlus
        };

        let rng = StdRng::seed_from_u64(seed);
        let dataset = DatasetBase::from(points.clone());

        let model = KMeans::params_with(k, rng, L2Dist)
            .n_runs(self.settings.runs)
            .max_n_iterations(self.settings.max_iterations)
            .tolerance(self.settings.tolerance)
            .init_method(init)
            .fit(&dataset)?;

        let labels: Array1<usize> = model.predict(points);
        let centroids = model
            .centroids()
            .rows()
            .into_iter()
            .map(|row| [row[0], row[1]])
            .collect();

        Ok(Partition {
            labels: labels.to_vec(),
            centroids,
        })
    }
}

/// Number of distinct rows in the matrix, compared bit-for-bit.
fn distinct_points(points: &Array2<f64>) -> usize {
    points
        .rows()
        .into_iter()
        .map(|row| (row[0].to_bits(), row[1].to_bits()))
        .collect::<BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_groups() -> Array2<f64> {
        array![
            [28.6139, 77.2090],
            [28.6145, 77.2085],
            [28.6120, 77.2100],
            [28.6131, 77.2093],
            [28.4595, 77.0266],
            [28.4600, 77.0250],
            [28.4580, 77.0270],
        ]
    }

    #[test]
    fn separates_distant_groups() {
        let partition = KMeansPartitioner::default()
            .partition(&two_groups(), 2, 42)
            .unwrap();

        assert_eq!(partition.labels.len(), 7);
        assert_eq!(partition.centroids.len(), 2);

        let north = partition.labels[0];
        let south = partition.labels[4];
        assert_ne!(north, south);
        assert!(partition.labels[..4].iter().all(|&l| l == north));
        assert!(partition.labels[4..].iter().all(|&l| l == south));

        let [lat, lng] = partition.centroids[north];
        assert!((lat - 28.613_375).abs() < 1e-3);
        assert!((lng - 77.209_2).abs() < 1e-3);
    }

    #[test]
    fn same_seed_same_partition() {
        let partitioner = KMeansPartitioner::default();
        let first = partitioner.partition(&two_groups(), 3, 7).unwrap();
        let second = partitioner.partition(&two_groups(), 3, 7).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_points_do_not_panic() {
        let points = array![[28.6, 77.2], [28.6, 77.2], [28.6, 77.2], [28.5, 77.1]];
        let partition = KMeansPartitioner::default()
            .partition(&points, 3, 42)
            .unwrap();

        assert_eq!(partition.labels.len(), 4);
        assert_eq!(partition.centroids.len(), 3);
        assert!(partition.labels.iter().all(|&l| l < 3));
    }

    #[test]
    fn counts_distinct_points() {
        let points = array![[1.0, 2.0], [1.0, 2.0], [2.0, 1.0]];
        assert_eq!(distinct_points(&points), 2);
    }
}
