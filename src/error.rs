use thiserror::Error;

/// Errors produced while fitting mixtures or sweeping cluster counts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GmmError {
    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    #[error("Invalid cluster count {k} for {n} points")]
    InvalidClusterCount { k: usize, n: usize },

    #[error("Priors must sum to 1, got {sum}")]
    InvalidPriors { sum: f64 },

    #[error("Responsibilities for point {column} sum to {sum}, expected 1")]
    InvalidResponsibilities { column: usize, sum: f64 },

    /// The covariance is not positive definite, or its determinant underflows.
    #[error("Degenerate covariance{}", .cluster.map(|c| format!(" for cluster {c}")).unwrap_or_default())]
    DegenerateCovariance { cluster: Option<usize> },

    #[error("Point {point} has zero likelihood under every cluster")]
    DegenerateLikelihood { point: usize },

    #[error("Cluster {cluster} has no responsibility mass")]
    EmptyCluster { cluster: usize },

    #[error("Empty sweep range [{kmin}, {kmax}] for {n} points")]
    EmptySweepRange { kmin: usize, kmax: usize, n: usize },

    #[error("Invalid range [{kmin}, {kmax}]")]
    InvalidRange { kmin: usize, kmax: usize },

    #[error("Tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),

    #[error("Variance fraction must lie in (0, 1], got {0}")]
    InvalidVarianceFraction(f64),

    #[error("K-means failed: {0}")]
    ConvergenceFailure(String),

    #[error("No cluster count in [{kmin}, {kmax}] produced a fit")]
    NoViableFit { kmin: usize, kmax: usize },
}

impl GmmError {
    pub(crate) fn shape(expected: impl Into<String>, found: impl Into<String>) -> Self {
        GmmError::ShapeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Attaches a cluster index to a covariance failure raised without one.
    pub(crate) fn in_cluster(self, cluster: usize) -> Self {
        match self {
            GmmError::DegenerateCovariance { cluster: None } => GmmError::DegenerateCovariance {
                cluster: Some(cluster),
            },
            other => other,
        }
    }

    /// True for failures caused by degenerate numerics rather than bad arguments.
    ///
    /// Callers can usually recover from these by re-initializing with another
    /// seed or by shrinking the number of clusters.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            GmmError::DegenerateCovariance { .. }
                | GmmError::DegenerateLikelihood { .. }
                | GmmError::EmptyCluster { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GmmError>;
