//! E step: posterior cluster probabilities under the current mixture.

use crate::density::{density_with, Precision};
use crate::error::{GmmError, Result};
use crate::params::{check_shapes, MixtureParams, PROBABILITY_TOLERANCE};
use ndarray::{Array1, Array2, Array3, Axis};

/// Computes the k×n responsibility matrix and the total log-likelihood.
///
/// Column i of the returned matrix is the posterior distribution over
/// clusters for point i. The scalar is `Σᵢ ln Σⱼ πⱼ N(xᵢ | μⱼ, Σⱼ)`.
pub fn expectation(
    points: &Array2<f64>,
    priors: &Array1<f64>,
    means: &Array2<f64>,
    covariances: &Array3<f64>,
) -> Result<(Array2<f64>, f64)> {
    check_shapes(priors, means, covariances)?;
    if means.ncols() != points.ncols() {
        return Err(GmmError::shape(
            format!("means of dimension {}", points.ncols()),
            format!("dimension {}", means.ncols()),
        ));
    }
    let sum = priors.sum();
    if priors.iter().any(|&p| !p.is_finite() || p < 0.0)
        || !((sum - 1.0).abs() <= PROBABILITY_TOLERANCE)
    {
        return Err(GmmError::InvalidPriors { sum });
    }

    let k = priors.len();
    let n = points.nrows();
    let mut weighted = Array2::<f64>::zeros((k, n));
    for (cluster, mut row) in weighted.axis_iter_mut(Axis(0)).enumerate() {
        let precision = Precision::new(&covariances.index_axis(Axis(0), cluster))
            .map_err(|e| e.in_cluster(cluster))?;
        let pdf = density_with(points, &means.row(cluster), &precision)
            .map_err(|e| e.in_cluster(cluster))?;
        row.assign(&(pdf * priors[cluster]));
    }

    let totals = weighted.sum_axis(Axis(0));
    if let Some(point) = totals.iter().position(|&t| t == 0.0 || !t.is_finite()) {
        return Err(GmmError::DegenerateLikelihood { point });
    }

    let log_likelihood = totals.mapv(f64::ln).sum();
    weighted /= &totals;
    Ok((weighted, log_likelihood))
}

/// [`expectation`] against a packaged parameter set.
pub fn expectation_for(points: &Array2<f64>, params: &MixtureParams) -> Result<(Array2<f64>, f64)> {
    expectation(points, &params.priors, &params.means, &params.covariances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, stack};
    use proptest::prelude::*;

    fn two_cluster_params() -> (Array1<f64>, Array2<f64>, Array3<f64>) {
        let priors = array![0.5, 0.5];
        let means = array![[0.0, 0.0], [5.0, 5.0]];
        let eye = Array2::<f64>::eye(2);
        let covariances = stack(Axis(0), &[eye.view(), eye.view()]).unwrap();
        (priors, means, covariances)
    }

    #[test]
    fn test_columns_sum_to_one() {
        let points = array![[0.0, 0.0], [5.0, 5.0], [2.5, 2.5], [10.0, -3.0]];
        let (priors, means, covs) = two_cluster_params();
        let (g, ll) = expectation(&points, &priors, &means, &covs).unwrap();

        assert_eq!(g.dim(), (2, 4));
        for col in g.sum_axis(Axis(0)).iter() {
            assert!((col - 1.0).abs() < 1e-12);
        }
        assert!(g[[0, 0]] > 0.99);
        assert!(g[[1, 1]] > 0.99);
        assert!((g[[0, 2]] - 0.5).abs() < 1e-12);
        assert!(ll.is_finite());
    }

    #[test]
    fn test_single_cluster_log_likelihood() {
        let points = array![[0.0], [1.0]];
        let covs = Array3::from_elem((1, 1, 1), 1.0);
        let (g, ll) = expectation(&points, &array![1.0], &array![[0.0]], &covs).unwrap();

        let expected = -(2.0 * std::f64::consts::PI).ln() - 0.5;
        assert!((ll - expected).abs() < 1e-12);
        assert_eq!(g, array![[1.0, 1.0]]);
    }

    #[test]
    fn test_invalid_priors() {
        let points = array![[0.0, 0.0]];
        let (_, means, covs) = two_cluster_params();
        let err = expectation(&points, &array![0.5, 0.6], &means, &covs).unwrap_err();
        assert!(matches!(err, GmmError::InvalidPriors { .. }));
    }

    #[test]
    fn test_shape_mismatch() {
        let points = array![[0.0, 0.0, 0.0]];
        let (priors, means, covs) = two_cluster_params();
        let err = expectation(&points, &priors, &means, &covs).unwrap_err();
        assert!(matches!(err, GmmError::ShapeMismatch { .. }));

        let err = expectation(&array![[0.0, 0.0]], &array![1.0], &means, &covs).unwrap_err();
        assert!(matches!(err, GmmError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_degenerate_covariance_names_cluster() {
        let points = array![[0.0, 0.0]];
        let (priors, means, mut covs) = two_cluster_params();
        covs.index_axis_mut(Axis(0), 1).fill(0.0);
        let err = expectation(&points, &priors, &means, &covs).unwrap_err();
        assert_eq!(err, GmmError::DegenerateCovariance { cluster: Some(1) });
    }

    #[test]
    fn test_negative_prior_rejected() {
        let points = array![[0.0, 0.0]];
        let (_, means, covs) = two_cluster_params();
        let err = expectation(&points, &array![1.5, -0.5], &means, &covs).unwrap_err();
        assert!(matches!(err, GmmError::InvalidPriors { .. }));
    }

    #[test]
    fn test_nan_prior_rejected() {
        let points = array![[0.0, 0.0]];
        let (_, means, covs) = two_cluster_params();
        let err = expectation(&points, &array![f64::NAN, 0.5], &means, &covs).unwrap_err();
        assert!(matches!(err, GmmError::InvalidPriors { .. }));
    }

    #[test]
    fn test_non_finite_point_is_degenerate() {
        let points = array![[0.0, 0.0], [f64::NAN, 1.0], [5.0, 5.0]];
        let (priors, means, covs) = two_cluster_params();
        let err = expectation(&points, &priors, &means, &covs).unwrap_err();
        assert_eq!(err, GmmError::DegenerateLikelihood { point: 1 });
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_idempotent() {
        let points = array![[0.3, -1.2], [4.1, 5.5], [2.0, 2.2]];
        let (priors, means, covs) = two_cluster_params();
        let first = expectation(&points, &priors, &means, &covs).unwrap();
        let second = expectation(&points, &priors, &means, &covs).unwrap();
        assert_eq!(first.0, second.0);
        assert_eq!(first.1.to_bits(), second.1.to_bits());
    }

    proptest! {
        #[test]
        fn responsibilities_are_distributions(
            coords in prop::collection::vec(-20.0f64..20.0, 2..60),
            w in 0.05f64..0.95,
        ) {
            let n = coords.len() / 2;
            let points = Array2::from_shape_vec((n, 2), coords[..n * 2].to_vec()).unwrap();
            let (_, means, covs) = two_cluster_params();
            let (g, ll) = expectation(&points, &array![w, 1.0 - w], &means, &covs).unwrap();
            prop_assert!(ll.is_finite());
            for sum in g.sum_axis(Axis(0)).iter() {
                prop_assert!((sum - 1.0).abs() < 1e-10);
            }
        }
    }
}
