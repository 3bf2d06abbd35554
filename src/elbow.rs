//! Cluster-count selection by within-cluster variance reduction.

use crate::error::{GmmError, Result};
use crate::kmeans::{kmeans, KMeansFit};
use log::{debug, info};
use ndarray::Array2;
use rand::Rng;

/// K-means result for one candidate cluster count.
#[derive(Debug, Clone)]
pub struct ElbowEntry {
    pub k: usize,
    pub clustering: KMeansFit,
    /// Sum of squared distances from each point to its centroid.
    pub variance: f64,
}

/// Outcome of [`select_k_by_elbow`].
#[derive(Debug, Clone)]
pub struct ElbowSelection {
    /// One entry per k, in increasing order of k.
    pub results: Vec<ElbowEntry>,
    /// `variance(kmin) − variance(k)` for each k.
    pub delta_variances: Vec<f64>,
}

impl ElbowSelection {
    pub fn ks(&self) -> Vec<usize> {
        self.results.iter().map(|e| e.k).collect()
    }
}

/// Clusters the points with K-means for every k in `[kmin, kmax]`.
///
/// Picking the elbow from `delta_variances` is left to the caller.
/// `kmax` defaults to the number of points.
pub fn select_k_by_elbow<R: Rng + ?Sized>(
    points: &Array2<f64>,
    kmin: usize,
    kmax: Option<usize>,
    iterations: usize,
    rng: &mut R,
) -> Result<ElbowSelection> {
    let n = points.nrows();
    let kmax = kmax.unwrap_or(n);
    if kmin == 0 || kmax == 0 || kmin >= kmax || kmax > n {
        return Err(GmmError::InvalidRange { kmin, kmax });
    }

    let mut results = Vec::with_capacity(kmax - kmin + 1);
    let mut delta_variances = Vec::with_capacity(kmax - kmin + 1);
    let mut baseline = None;
    for k in kmin..=kmax {
        let clustering = kmeans(points, k, iterations, rng)?;
        let variance = clustering.inertia(points);
        let base = *baseline.get_or_insert(variance);
        debug!("k={}: within-cluster variance {:.4}", k, variance);
        delta_variances.push(base - variance);
        results.push(ElbowEntry {
            k,
            clustering,
            variance,
        });
    }

    info!(
        "variance sweep over k in [{}, {}] finished, total reduction {:.4}",
        kmin,
        kmax,
        delta_variances.last().copied().unwrap_or(0.0)
    );
    Ok(ElbowSelection {
        results,
        delta_variances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn three_groups() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.2, 0.1],
            [5.0, 5.0],
            [5.1, 4.9],
            [10.0, 0.0],
            [9.8, 0.2]
        ]
    }

    #[test]
    fn test_invalid_ranges() {
        let points = three_groups();
        let mut rng = StdRng::seed_from_u64(0);
        for (kmin, kmax) in [(1, Some(1)), (0, Some(3)), (3, Some(2)), (1, Some(7))] {
            assert!(matches!(
                select_k_by_elbow(&points, kmin, kmax, 10, &mut rng),
                Err(GmmError::InvalidRange { .. })
            ));
        }
    }

    #[test]
    fn test_delta_variance_relative_to_kmin() {
        let points = three_groups();
        let mut rng = StdRng::seed_from_u64(5);
        let selection = select_k_by_elbow(&points, 1, Some(4), 100, &mut rng).unwrap();

        assert_eq!(selection.ks(), vec![1, 2, 3, 4]);
        assert_eq!(selection.delta_variances.len(), 4);
        assert_eq!(selection.delta_variances[0], 0.0);
        for (entry, delta) in selection.results.iter().zip(&selection.delta_variances) {
            assert_eq!(entry.clustering.n_clusters(), entry.k);
            assert!((selection.results[0].variance - entry.variance - delta).abs() < 1e-12);
        }
        // k = 1 has a single centroid at the data mean.
        assert!(selection.delta_variances[1] > 0.0);
    }

    #[test]
    fn test_zero_iterations_fails() {
        let points = three_groups();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            select_k_by_elbow(&points, 1, Some(3), 0, &mut rng),
            Err(GmmError::ConvergenceFailure(_))
        ));
    }
}
