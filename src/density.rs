//! Multivariate Gaussian density for a batch of points.

use crate::error::{GmmError, Result};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use std::f64::consts::PI;

/// Smallest value `density` returns, so that downstream logarithms stay finite.
pub const DENSITY_FLOOR: f64 = 1e-300;

/// Largest asymmetry tolerated in a covariance, relative to its largest entry.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Cholesky factorization of one covariance matrix.
///
/// Holds the inverse and log-determinant so a covariance can be evaluated
/// against many point batches without refactoring it.
#[derive(Debug, Clone)]
pub struct Precision {
    inverse: Array2<f64>,
    log_det: f64,
}

impl Precision {
    /// Factors a symmetric covariance. Fails when it is not symmetric or not
    /// positive definite.
    pub fn new<S>(covariance: &ArrayBase<S, Ix2>) -> Result<Self>
    where
        S: Data<Elem = f64>,
    {
        let (rows, cols) = covariance.dim();
        if rows != cols {
            return Err(GmmError::shape(
                "square covariance",
                format!("{rows}x{cols}"),
            ));
        }
        let d = rows;
        if !is_symmetric(covariance) {
            return Err(GmmError::DegenerateCovariance { cluster: None });
        }
        let matrix = DMatrix::from_row_iterator(d, d, covariance.iter().copied());
        let cholesky = matrix
            .cholesky()
            .ok_or(GmmError::DegenerateCovariance { cluster: None })?;

        let log_det = 2.0 * cholesky.l_dirty().diagonal().map(f64::ln).sum();
        let inverse = cholesky.inverse();
        let inverse = Array2::from_shape_fn((d, d), |(i, j)| inverse[(i, j)]);

        if !log_det.is_finite() || inverse.iter().any(|v| !v.is_finite()) {
            return Err(GmmError::DegenerateCovariance { cluster: None });
        }
        Ok(Precision { inverse, log_det })
    }

    pub fn dim(&self) -> usize {
        self.inverse.nrows()
    }

    pub fn log_det(&self) -> f64 {
        self.log_det
    }

    /// Squared Mahalanobis distance of every row of `centered` under this precision.
    pub fn mahalanobis<S>(&self, centered: &ArrayBase<S, Ix2>) -> Array1<f64>
    where
        S: Data<Elem = f64>,
    {
        (centered.dot(&self.inverse) * centered).sum_axis(Axis(1))
    }
}

fn is_symmetric<S>(covariance: &ArrayBase<S, Ix2>) -> bool
where
    S: Data<Elem = f64>,
{
    let scale = covariance.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tolerance = SYMMETRY_TOLERANCE * scale;
    ndarray::Zip::from(covariance)
        .and(covariance.t())
        .all(|&a, &b| (a - b).abs() <= tolerance)
}

/// Evaluates the Gaussian PDF with the given mean and covariance at each row of `points`.
///
/// Every value for a finite row is at least [`DENSITY_FLOOR`]. A row with a
/// NaN coordinate evaluates to NaN rather than being floored.
pub fn density<S1, S2, S3>(
    points: &ArrayBase<S1, Ix2>,
    mean: &ArrayBase<S2, Ix1>,
    covariance: &ArrayBase<S3, Ix2>,
) -> Result<Array1<f64>>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    S3: Data<Elem = f64>,
{
    let d = points.ncols();
    if mean.len() != d {
        return Err(GmmError::shape(
            format!("mean of length {d}"),
            format!("length {}", mean.len()),
        ));
    }
    if covariance.dim() != (d, d) {
        return Err(GmmError::shape(
            format!("{d}x{d} covariance"),
            format!("{}x{}", covariance.nrows(), covariance.ncols()),
        ));
    }
    let precision = Precision::new(covariance)?;
    density_with(points, mean, &precision)
}

/// Same as [`density`], against an already factored covariance.
pub fn density_with<S1, S2>(
    points: &ArrayBase<S1, Ix2>,
    mean: &ArrayBase<S2, Ix1>,
    precision: &Precision,
) -> Result<Array1<f64>>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
{
    let d = points.ncols();
    if mean.len() != d || precision.dim() != d {
        return Err(GmmError::shape(
            format!("dimension {d}"),
            format!("mean {} / covariance {}", mean.len(), precision.dim()),
        ));
    }

    let log_norm = -0.5 * (d as f64 * (2.0 * PI).ln() + precision.log_det());
    let norm = log_norm.exp();
    if !norm.is_finite() || norm == 0.0 {
        return Err(GmmError::DegenerateCovariance { cluster: None });
    }

    let centered = points - mean;
    let quad = precision.mahalanobis(&centered);
    Ok(quad.mapv(|q| {
        let p = norm * (-0.5 * q).exp();
        if p < DENSITY_FLOOR {
            DENSITY_FLOOR
        } else {
            p
        }
    }))
}
