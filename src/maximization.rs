//! M step: re-estimate mixture parameters from responsibilities.

use crate::error::{GmmError, Result};
use crate::params::{MixtureParams, PROBABILITY_TOLERANCE};
use ndarray::{Array2, Array3, Axis};

/// Responsibility mass below which a cluster is considered empty.
pub const EMPTY_CLUSTER_MASS: f64 = 1e-12;

/// Computes priors, means and covariances from a k×n responsibility matrix.
pub fn maximization(points: &Array2<f64>, responsibilities: &Array2<f64>) -> Result<MixtureParams> {
    let (n, d) = points.dim();
    let (k, columns) = responsibilities.dim();
    if columns != n {
        return Err(GmmError::shape(
            format!("responsibilities with {n} columns"),
            format!("{columns} columns"),
        ));
    }
    if k == 0 || n == 0 {
        return Err(GmmError::shape(
            "at least one cluster and one point",
            format!("{k} clusters, {n} points"),
        ));
    }
    for (column, sum) in responsibilities.sum_axis(Axis(0)).iter().enumerate() {
        if !((sum - 1.0).abs() <= PROBABILITY_TOLERANCE) {
            return Err(GmmError::InvalidResponsibilities { column, sum: *sum });
        }
    }

    let mass = responsibilities.sum_axis(Axis(1));
    if let Some(cluster) = mass.iter().position(|&m| !(m >= EMPTY_CLUSTER_MASS)) {
        return Err(GmmError::EmptyCluster { cluster });
    }

    let priors = &mass / n as f64;
    let means = responsibilities.dot(points) / &mass.view().insert_axis(Axis(1));

    let mut covariances = Array3::<f64>::zeros((k, d, d));
    for (cluster, mut cov) in covariances.axis_iter_mut(Axis(0)).enumerate() {
        let centered = points - &means.row(cluster);
        let weights = responsibilities.row(cluster).insert_axis(Axis(1));
        let weighted = &centered * &weights;
        cov.assign(&(weighted.t().dot(&centered) / mass[cluster]));
    }

    MixtureParams::new(priors, means, covariances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_hard_assignments() {
        let points = array![[0.0, 0.0], [2.0, 0.0], [10.0, 10.0], [10.0, 12.0]];
        let g = array![[1.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 1.0]];
        let params = maximization(&points, &g).unwrap();

        assert_eq!(params.priors, array![0.5, 0.5]);
        assert_eq!(params.means, array![[1.0, 0.0], [10.0, 11.0]]);
        assert_eq!(
            params.covariances.index_axis(Axis(0), 0),
            array![[1.0, 0.0], [0.0, 0.0]]
        );
        assert_eq!(
            params.covariances.index_axis(Axis(0), 1),
            array![[0.0, 0.0], [0.0, 1.0]]
        );
    }

    #[test]
    fn test_soft_assignments_weight_the_mean() {
        let points = array![[0.0], [4.0]];
        let g = array![[0.75, 0.25], [0.25, 0.75]];
        let params = maximization(&points, &g).unwrap();

        assert_eq!(params.priors, array![0.5, 0.5]);
        assert_eq!(params.means, array![[1.0], [3.0]]);
        // 0.75 * 1 + 0.25 * 9 over a mass of 1.
        assert!((params.covariances[[0, 0, 0]] - 3.0).abs() < 1e-12);
        assert!((params.priors.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_responsibilities() {
        let points = array![[0.0], [1.0]];
        let g = array![[0.5, 0.5], [0.4, 0.5]];
        let err = maximization(&points, &g).unwrap_err();
        assert!(matches!(err, GmmError::InvalidResponsibilities { column: 0, .. }));
    }

    #[test]
    fn test_nan_responsibilities_rejected() {
        let points = array![[0.0], [1.0]];
        let g = array![[f64::NAN, 0.5], [0.5, 0.5]];
        let err = maximization(&points, &g).unwrap_err();
        assert!(matches!(err, GmmError::InvalidResponsibilities { column: 0, .. }));
    }

    #[test]
    fn test_empty_cluster() {
        let points = array![[0.0], [1.0]];
        let g = array![[1.0, 1.0], [0.0, 0.0]];
        let err = maximization(&points, &g).unwrap_err();
        assert_eq!(err, GmmError::EmptyCluster { cluster: 1 });
    }

    #[test]
    fn test_shape_mismatch() {
        let points = array![[0.0], [1.0], [2.0]];
        let g = array![[1.0, 1.0]];
        let err = maximization(&points, &g).unwrap_err();
        assert!(matches!(err, GmmError::ShapeMismatch { .. }));
    }
}
