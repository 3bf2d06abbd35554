use crate::error::{GmmError, Result};
use ndarray::{Array1, Array2, Array3, Axis};

/// Tolerance applied to every probability-sum invariant.
pub const PROBABILITY_TOLERANCE: f64 = 1e-8;

/// Priors, means and covariances of a k-component mixture in d dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureParams {
    /// Cluster weights, shape (k,).
    pub priors: Array1<f64>,
    /// Cluster centers, shape (k, d).
    pub means: Array2<f64>,
    /// Stacked covariance matrices, shape (k, d, d).
    pub covariances: Array3<f64>,
}

impl MixtureParams {
    /// Builds a parameter set after checking that the three parts agree on k and d.
    pub fn new(priors: Array1<f64>, means: Array2<f64>, covariances: Array3<f64>) -> Result<Self> {
        check_shapes(&priors, &means, &covariances)?;
        Ok(MixtureParams {
            priors,
            means,
            covariances,
        })
    }

    pub fn n_components(&self) -> usize {
        self.priors.len()
    }

    pub fn n_features(&self) -> usize {
        self.means.ncols()
    }

    /// Free parameters of a full-covariance mixture.
    ///
    /// Means contribute k·d, covariances k·d(d+1)/2 and priors k − 1, since
    /// the last prior is fixed by the others.
    pub fn free_parameters(&self) -> usize {
        free_parameters(self.n_components(), self.n_features())
    }
}

pub fn free_parameters(k: usize, d: usize) -> usize {
    k * d + k * d * (d + 1) / 2 + k.saturating_sub(1)
}

pub(crate) fn check_shapes(
    priors: &Array1<f64>,
    means: &Array2<f64>,
    covariances: &Array3<f64>,
) -> Result<()> {
    let k = priors.len();
    let d = means.ncols();
    if means.nrows() != k {
        return Err(GmmError::shape(
            format!("{k} means"),
            format!("{} means", means.nrows()),
        ));
    }
    if covariances.dim() != (k, d, d) {
        let (a, b, c) = covariances.dim();
        return Err(GmmError::shape(
            format!("{k}x{d}x{d} covariances"),
            format!("{a}x{b}x{c}"),
        ));
    }
    Ok(())
}

/// Covariance of the rows of `points` around their mean, normalized by n.
pub fn dataset_covariance(points: &Array2<f64>) -> Array2<f64> {
    let n = points.nrows().max(1) as f64;
    let centered = match points.mean_axis(Axis(0)) {
        Some(mean) => points - &mean,
        None => return Array2::zeros((points.ncols(), points.ncols())),
    };
    centered.t().dot(&centered) / n
}
