//! Failure taxonomy for pipeline runs.
//!
//! Stage crates report their own error types. [`PipelineError`] folds them
//! into the handful of outcomes an operator acts on, and [`FailureKind`]
//! names each outcome without its payload.

use safe_route_clean::{CleanError, CleanReport};
use safe_route_cluster::ClusterError;
use safe_route_store::StoreError;
use strum_macros::{AsRefStr, Display};

use crate::config::ConfigError;

/// Payload-free category of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum FailureKind {
    /// An input artifact is missing or unreadable.
    DataUnavailable,
    /// A required column is absent.
    SchemaMismatch,
    /// Too few records remain to continue.
    InsufficientData,
    /// A configuration value is out of range.
    InvalidConfiguration,
    /// The clustering algorithm failed.
    Clustering,
    /// An output artifact could not be written.
    Io,
}

/// Errors that halt a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An input artifact could not be obtained.
    #[error("data unavailable: {0}")]
    DataUnavailable(#[source] StoreError),

    /// A previously written cleaned snapshot no longer parses.
    #[error("data unavailable: {0}")]
    CorruptSnapshot(#[source] CleanError),

    /// A required column is absent.
    #[error("schema mismatch: required column '{column}' is missing")]
    SchemaMismatch {
        /// Name of the missing column.
        column: String,
    },

    /// Too few records remain for the next stage.
    #[error("insufficient data: {records} records, at least {required} required")]
    InsufficientData {
        /// Records available.
        records: usize,
        /// Records the stage needs.
        required: usize,
    },

    /// A configuration value is out of range.
    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),

    /// The clustering algorithm failed.
    #[error("clustering failed: {0}")]
    Clustering(#[source] ClusterError),

    /// An artifact could not be written or encoded.
    #[error("failed to write output: {0}")]
    Store(#[source] StoreError),

    /// The GeoJSON rendering could not be produced.
    #[error("failed to render GeoJSON: {0}")]
    GeoJson(#[from] serde_json::Error),
}

impl PipelineError {
    /// Category of this failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::DataUnavailable(_) | Self::CorruptSnapshot(_) => FailureKind::DataUnavailable,
            Self::SchemaMismatch { .. } => FailureKind::SchemaMismatch,
            Self::InsufficientData { .. } => FailureKind::InsufficientData,
            Self::InvalidConfiguration(_) => FailureKind::InvalidConfiguration,
            Self::Clustering(_) => FailureKind::Clustering,
            Self::Store(_) | Self::GeoJson(_) => FailureKind::Io,
        }
    }
}

impl PipelineError {
    /// Classifies a failure to load an input artifact.
    ///
    /// Anything that stops the file from being read is
    /// [`Self::DataUnavailable`]; only a missing column is a schema problem.
    #[must_use]
    pub fn from_load(e: StoreError) -> Self {
        match e {
            StoreError::MissingColumn { column } => Self::SchemaMismatch { column },
            e => Self::DataUnavailable(e),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MissingColumn { column } => Self::SchemaMismatch { column },
            e if e.is_unavailable() => Self::DataUnavailable(e),
            e => Self::Store(e),
        }
    }
}

impl From<CleanError> for PipelineError {
    fn from(e: CleanError) -> Self {
        match e {
            CleanError::SchemaMismatch(missing) => Self::SchemaMismatch {
                column: missing.column.to_owned(),
            },
            e @ CleanError::CorruptSnapshot { .. } => Self::CorruptSnapshot(e),
        }
    }
}

impl From<ClusterError> for PipelineError {
    fn from(e: ClusterError) -> Self {
        match e {
            ClusterError::InsufficientData { records, clusters } => Self::InsufficientData {
                records,
                required: clusters,
            },
            ClusterError::InvalidClusterCount(k) => Self::InvalidConfiguration(
                ConfigError::Invalid(format!("cluster count must be at least 1, got {k}")),
            ),
            e => Self::Clustering(e),
        }
    }
}

/// A halted run: the error plus whatever the cleaning stage reported before
/// the halt.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct PipelineHalt {
    /// Why the run stopped.
    #[source]
    pub error: PipelineError,
    /// Cleaning counts, if the cleaning stage completed.
    pub clean_report: Option<CleanReport>,
}

impl PipelineHalt {
    /// Category of the underlying failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

impl From<PipelineError> for PipelineHalt {
    fn from(error: PipelineError) -> Self {
        Self {
            error,
            clean_report: None,
        }
    }
}

macro_rules! halt_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for PipelineHalt {
                fn from(e: $source) -> Self {
                    PipelineError::from(e).into()
                }
            }
        )*
    };
}

halt_from!(StoreError, CleanError, ClusterError, ConfigError, serde_json::Error);
