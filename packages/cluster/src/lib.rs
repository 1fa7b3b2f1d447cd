#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Clustering stage: groups cleaned accidents into black spots.
//!
//! [`identify_black_spots`] hands the accident coordinates to a
//! [`Partitioner`], then counts the accidents in each cluster and labels
//! each cluster with a [`RiskLevel`] from the configured
//! [`RiskThresholds`].

pub mod export;
pub mod partition;

use ndarray::Array2;
use safe_route_accident_models::AccidentRecord;
use safe_route_clean::CleanedRecords;
use safe_route_cluster_models::{BlackSpot, RiskLevel, RiskThresholds};
use safe_route_store::RecordTable;
use serde::Serialize;

pub use partition::{KMeansPartitioner, KMeansSettings, Partition, Partitioner};

/// Header of the cluster column appended to labeled record tables.
pub const CLUSTER_ID_COLUMN: &str = "Cluster_ID";

/// Errors that can occur during clustering.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// `k` must be at least 1.
    #[error("cluster count must be at least 1, got {0}")]
    InvalidClusterCount(usize),

    /// Not enough records to form the requested clusters.
    #[error("insufficient data: {records} records for {clusters} clusters")]
    InsufficientData {
        /// Records available.
        records: usize,
        /// Clusters requested.
        clusters: usize,
    },

    /// The partitioner returned output inconsistent with its input.
    #[error("partitioner returned a malformed result: {0}")]
    MalformedPartition(String),

    /// The k-means fit failed.
    #[error("k-means failed: {0}")]
    KMeans(#[from] linfa_clustering::KMeansError),
}

/// Inputs to [`identify_black_spots`] besides the records themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterParams {
    /// Number of clusters, `k`.
    pub clusters: usize,
    /// Seed handed to the partitioner.
    pub seed: u64,
    /// Count thresholds for risk labels.
    pub thresholds: RiskThresholds,
}

/// A cleaned accident together with its cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteredRecord {
    /// The accident.
    pub record: AccidentRecord,
    /// Cluster index in `[0, k)`.
    pub cluster_id: usize,
}

/// Result of [`identify_black_spots`].
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    /// One black spot per cluster, ordered by cluster id.
    pub black_spots: Vec<BlackSpot>,
    /// Every input record with its cluster, in input order.
    pub labeled: Vec<ClusteredRecord>,
    /// Sum of squared distances from each record to its centroid.
    pub inertia: f64,
}

impl ClusterOutcome {
    /// Aggregate counts for logging and reporting.
    #[must_use]
    pub fn summary(&self) -> ClusterSummary {
        let count = |level: RiskLevel| {
            self.black_spots
                .iter()
                .filter(|s| s.risk_level == level)
                .count()
        };

        ClusterSummary {
            clusters: self.black_spots.len(),
            total_crashes: self.black_spots.iter().map(|s| s.total_crashes).sum(),
            empty_clusters: self
                .black_spots
                .iter()
                .filter(|s| s.total_crashes == 0)
                .count(),
            high: count(RiskLevel::High),
            moderate: count(RiskLevel::Moderate),
            low: count(RiskLevel::Low),
            inertia: self.inertia,
        }
    }

    /// Renders the labeled records as a table: the cleaned columns plus a
    /// trailing [`CLUSTER_ID_COLUMN`].
    #[must_use]
    pub fn labeled_table(&self, records: &CleanedRecords) -> RecordTable {
        let schema = records.schema();
        let mut columns = schema.columns().to_vec();
        columns.push(CLUSTER_ID_COLUMN.to_owned());

        let rows = self
            .labeled
            .iter()
            .map(|labeled| {
                let mut row = labeled.record.to_row(schema);
                row.push(labeled.cluster_id.to_string());
                row
            })
            .collect();
        RecordTable::from_parts(columns, rows)
    }
}

/// Aggregate view of a [`ClusterOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterSummary {
    /// Number of clusters.
    pub clusters: usize,
    /// Sum of `total_crashes`; equals the number of input records.
    pub total_crashes: usize,
    /// Clusters with no records.
    pub empty_clusters: usize,
    /// Clusters labeled [`RiskLevel::High`].
    pub high: usize,
    /// Clusters labeled [`RiskLevel::Moderate`].
    pub moderate: usize,
    /// Clusters labeled [`RiskLevel::Low`].
    pub low: usize,
    /// Within-cluster sum of squares.
    pub inertia: f64,
}

/// Partitions cleaned accidents into `k` black spots.
///
/// Coordinates go to the partitioner as-is: the cleaning stage already
/// guarantees they are finite. Centroids are reported exactly as the
/// partitioner returns them. A cluster that ends up empty is reported with
/// zero crashes and [`RiskLevel::Low`].
///
/// # Errors
///
/// * [`ClusterError::InvalidClusterCount`] if `k` is zero.
/// * [`ClusterError::InsufficientData`] if there are no records, or fewer
///   records than clusters. The partitioner is not invoked.
/// * [`ClusterError::MalformedPartition`] if the partitioner's output does
///   not line up with the input.
pub fn identify_black_spots(
    records: &CleanedRecords,
    params: &ClusterParams,
    partitioner: &dyn Partitioner,
) -> Result<ClusterOutcome, ClusterError> {
    let k = params.clusters;
    if k == 0 {
        return Err(ClusterError::InvalidClusterCount(k));
    }
    if records.is_empty() || records.len() < k {
        return Err(ClusterError::InsufficientData {
            records: records.len(),
            clusters: k,
        });
    }

    log::info!(
        "Running k-means clustering with k={k} on {} records (seed {})",
        records.len(),
        params.seed
    );

    let points = coordinate_matrix(records.records());
    let partition = partitioner.partition(&points, k, params.seed)?;
    check_partition(&partition, records.len(), k)?;

    let mut counts = vec![0_usize; k];
    for &label in &partition.labels {
        counts[label] += 1;
    }

    let black_spots: Vec<BlackSpot> = partition
        .centroids
        .iter()
        .zip(&counts)
        .enumerate()
        .map(|(cluster_id, (&[lat, lng], &total_crashes))| BlackSpot {
            cluster_id,
            centroid_latitude: lat,
            centroid_longitude: lng,
            total_crashes,
            risk_level: params.thresholds.classify(total_crashes),
        })
        .collect();

    let inertia = records
        .records()
        .iter()
        .zip(&partition.labels)
        .map(|(r, &label)| {
            let [lat, lng] = partition.centroids[label];
            (r.latitude - lat).powi(2) + (r.longitude - lng).powi(2)
        })
        .sum();

    let labeled = records
        .records()
        .iter()
        .zip(partition.labels)
        .map(|(record, cluster_id)| ClusteredRecord {
            record: record.clone(),
            cluster_id,
        })
        .collect();

    log::info!("Identified {k} black spots");

    Ok(ClusterOutcome {
        black_spots,
        labeled,
        inertia,
    })
}

/// Builds the `(n, 2)` matrix of `(latitude, longitude)` rows.
#[must_use]
pub fn coordinate_matrix(records: &[AccidentRecord]) -> Array2<f64> {
    Array2::from_shape_fn((records.len(), 2), |(i, j)| {
        if j == 0 {
            records[i].latitude
        } else {
            records[i].longitude
        }
    })
}

fn check_partition(partition: &Partition, records: usize, k: usize) -> Result<(), ClusterError> {
    if partition.labels.len() != records {
        return Err(ClusterError::MalformedPartition(format!(
            "{} labels for {records} records",
            partition.labels.len()
        )));
    }
    if partition.centroids.len() != k {
        return Err(ClusterError::MalformedPartition(format!(
            "{} centroids for {k} clusters",
            partition.centroids.len()
        )));
    }
    if let Some(&label) = partition.labels.iter().find(|&&l| l >= k) {
        return Err(ClusterError::MalformedPartition(format!(
            "label {label} out of range for {k} clusters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use safe_route_accident_models::BoundingBox;

    /// Partitioner that returns a fixed answer regardless of input.
    struct FixedPartitioner(Partition);

    impl Partitioner for FixedPartitioner {
        fn partition(
            &self,
            _points: &Array2<f64>,
            _k: usize,
            _seed: u64,
        ) -> Result<Partition, ClusterError> {
            Ok(self.0.clone())
        }
    }

    /// Partitioner that fails the test if it is ever called.
    struct UnreachablePartitioner;

    impl Partitioner for UnreachablePartitioner {
        fn partition(
            &self,
            _points: &Array2<f64>,
            _k: usize,
            _seed: u64,
        ) -> Result<Partition, ClusterError> {
            panic!("partitioner should not be invoked");
        }
    }

    fn cleaned(points: &[(f64, f64)]) -> CleanedRecords {
        let mut table = RecordTable::new(vec!["Latitude".into(), "Longitude".into()]);
        for (lat, lng) in points {
            table.push_row(vec![lat.to_string(), lng.to_string()]).unwrap();
        }
        safe_route_clean::clean(&table, &BoundingBox::DELHI_NCR)
            .unwrap()
            .records
    }

    fn params(clusters: usize) -> ClusterParams {
        ClusterParams {
            clusters,
            seed: 42,
            thresholds: RiskThresholds::default(),
        }
    }

    fn hotspot(center: (f64, f64), n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let offset = (i % 7) as f64 * 0.0001;
                (center.0 + offset, center.1 - offset)
            })
            .collect()
    }

    #[test]
    fn every_record_lands_in_exactly_one_cluster() {
        let mut points = hotspot((28.6139, 77.2090), 6);
        points.extend(hotspot((28.4595, 77.0266), 4));
        let records = cleaned(&points);

        let outcome =
            identify_black_spots(&records, &params(2), &KMeansPartitioner::default()).unwrap();

        assert_eq!(outcome.black_spots.len(), 2);
        assert_eq!(outcome.labeled.len(), 10);
        assert_eq!(outcome.summary().total_crashes, 10);

        let mut sizes: Vec<usize> = outcome.black_spots.iter().map(|s| s.total_crashes).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, [4, 6]);
    }

    #[test]
    fn fixed_seed_is_deterministic() {
        let mut points = hotspot((28.6139, 77.2090), 12);
        points.extend(hotspot((28.5355, 77.3310), 9));
        points.extend(hotspot((28.7041, 77.1025), 5));
        let records = cleaned(&points);
        let partitioner = KMeansPartitioner::default();

        let first = identify_black_spots(&records, &params(3), &partitioner).unwrap();
        let second = identify_black_spots(&records, &params(3), &partitioner).unwrap();
        assert_eq!(first.black_spots, second.black_spots);
    }

    #[test]
    fn risk_levels_follow_counts() {
        let mut points = hotspot((28.6139, 77.2090), 51);
        points.extend(hotspot((28.4595, 77.0266), 50));
        points.extend(hotspot((28.5355, 77.3310), 21));
        points.extend(hotspot((28.7041, 77.1025), 20));
        let records = cleaned(&points);

        let mut labels = vec![0; 51];
        labels.extend(vec![1; 50]);
        labels.extend(vec![2; 21]);
        labels.extend(vec![3; 20]);
        let partitioner = FixedPartitioner(Partition {
            labels,
            centroids: vec![[28.6, 77.2], [28.4, 77.0], [28.5, 77.3], [28.7, 77.1]],
        });

        let outcome = identify_black_spots(&records, &params(4), &partitioner).unwrap();
        let levels: Vec<RiskLevel> = outcome.black_spots.iter().map(|s| s.risk_level).collect();
        assert_eq!(
            levels,
            [
                RiskLevel::High,
                RiskLevel::Moderate,
                RiskLevel::Moderate,
                RiskLevel::Low
            ]
        );

        let summary = outcome.summary();
        assert_eq!((summary.high, summary.moderate, summary.low), (1, 2, 1));
    }

    #[test]
    fn empty_cluster_is_low_with_zero_crashes() {
        let records = cleaned(&[(28.61, 77.20), (28.62, 77.21), (28.46, 77.03)]);
        let partitioner = FixedPartitioner(Partition {
            labels: vec![0, 0, 2],
            centroids: vec![[28.615, 77.205], [28.5, 77.1], [28.46, 77.03]],
        });

        let outcome = identify_black_spots(&records, &params(3), &partitioner).unwrap();
        let empty = &outcome.black_spots[1];
        assert_eq!(empty.total_crashes, 0);
        assert_eq!(empty.risk_level, RiskLevel::Low);
        assert_eq!(outcome.summary().empty_clusters, 1);
    }

    #[test]
    fn centroids_are_reported_unrounded() {
        let records = cleaned(&[(28.61, 77.20), (28.62, 77.21)]);
        let partitioner = FixedPartitioner(Partition {
            labels: vec![0, 0],
            centroids: vec![[28.615_000_000_001, 77.205_000_000_009]],
        });

        let spot = &identify_black_spots(&records, &params(1), &partitioner)
            .unwrap()
            .black_spots[0];
        assert!((spot.centroid_latitude - 28.615_000_000_001).abs() < f64::EPSILON);
        assert!((spot.centroid_longitude - 77.205_000_000_009).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_input_is_insufficient_and_skips_partitioner() {
        let records = cleaned(&[]);
        let err = identify_black_spots(&records, &params(2), &UnreachablePartitioner).unwrap_err();
        assert!(matches!(
            err,
            ClusterError::InsufficientData {
                records: 0,
                clusters: 2
            }
        ));
    }

    #[test]
    fn fewer_records_than_clusters_is_insufficient() {
        let records = cleaned(&[(28.61, 77.20), (28.62, 77.21)]);
        let err = identify_black_spots(&records, &params(3), &UnreachablePartitioner).unwrap_err();
        assert!(matches!(err, ClusterError::InsufficientData { records: 2, .. }));
    }

    #[test]
    fn zero_clusters_is_rejected() {
        let records = cleaned(&[(28.61, 77.20)]);
        let err = identify_black_spots(&records, &params(0), &UnreachablePartitioner).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidClusterCount(0)));
    }

    #[test]
    fn out_of_range_label_is_malformed() {
        let records = cleaned(&[(28.61, 77.20), (28.62, 77.21)]);
        let partitioner = FixedPartitioner(Partition {
            labels: vec![0, 5],
            centroids: vec![[28.6, 77.2], [28.6, 77.2]],
        });
        let err = identify_black_spots(&records, &params(2), &partitioner).unwrap_err();
        assert!(matches!(err, ClusterError::MalformedPartition(_)));
    }

    #[test]
    fn labeled_table_appends_cluster_column() {
        let records = cleaned(&[(28.61, 77.2), (28.46, 77.03)]);
        let partitioner = FixedPartitioner(Partition {
            labels: vec![1, 0],
            centroids: vec![[28.46, 77.03], [28.61, 77.2]],
        });

        let outcome = identify_black_spots(&records, &params(2), &partitioner).unwrap();
        let table = outcome.labeled_table(&records);
        assert_eq!(table.columns(), ["Latitude", "Longitude", CLUSTER_ID_COLUMN]);
        assert_eq!(table.value(0, CLUSTER_ID_COLUMN), Some("1"));
        assert_eq!(table.value(1, CLUSTER_ID_COLUMN), Some("0"));
    }
}
