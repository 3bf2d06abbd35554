use crate::error::{GmmError, Result};
use log::{debug, trace};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use rand::prelude::*;
use rayon::prelude::*;

/// Output of a K-means run.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Cluster centroids, shape (k, d).
    pub centroids: Array2<f64>,
    /// Index of the centroid each point was assigned to, shape (n,).
    pub labels: Array1<usize>,
    /// Lloyd iterations actually run.
    pub iterations: usize,
}

impl KMeansFit {
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Sum of squared distances from each point to its assigned centroid.
    #[allow(non_snake_case)]
    pub fn inertia(&self, X: &Array2<f64>) -> f64 {
        within_cluster_variance(X, &self.centroids, &self.labels)
    }

    /// Counts the number of points assigned to each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        count_labels(&self.labels, self.n_clusters())
    }
}

/// Standard K-Means clustering algorithm.
#[derive(Clone, Debug)]
pub struct KMeans {
    pub n_clusters: usize,
    pub n_iters: usize,
}

impl KMeans {
    /// Creates a new KMeans instance with the given number of clusters and iterations.
    pub fn new(n_clusters: usize, n_iters: usize) -> Self {
        KMeans {
            n_clusters,
            n_iters,
        }
    }

    /// Fits the model to the data and returns the cluster centroids and labels.
    ///
    /// Starting centroids are `n_clusters` distinct rows of `X` drawn with `rng`.
    /// A cluster that loses all of its points is reseeded with a random row.
    #[allow(non_snake_case)]
    pub fn fit_predict<R: Rng + ?Sized>(&self, X: &Array2<f64>, rng: &mut R) -> Result<KMeansFit> {
        let n_samples = X.len_of(Axis(0));
        let n_features = X.len_of(Axis(1));
        if n_samples == 0 || n_features == 0 {
            return Err(GmmError::ConvergenceFailure("dataset is empty".into()));
        }
        if self.n_clusters == 0 || self.n_clusters > n_samples {
            return Err(GmmError::ConvergenceFailure(format!(
                "cannot form {} clusters from {} points",
                self.n_clusters, n_samples
            )));
        }
        if self.n_iters == 0 {
            return Err(GmmError::ConvergenceFailure(
                "iteration count must be positive".into(),
            ));
        }

        // Initialize centroids randomly.
        let indices: Vec<usize> = (0..n_samples).choose_multiple(rng, self.n_clusters);
        let mut centroids = X.select(Axis(0), &indices);

        let mut labels = assign_labels(X, &centroids);
        let mut iterations = 0;

        for _ in 0..self.n_iters {
            iterations += 1;

            // Compute new centroids.
            let mut new_centroids = Array2::<f64>::zeros((self.n_clusters, n_features));
            let mut counts = vec![0; self.n_clusters];
            X.axis_iter(Axis(0))
                .zip(labels.iter())
                .for_each(|(x, &label)| {
                    new_centroids
                        .row_mut(label)
                        .zip_mut_with(&x, |a, &b| *a += b);
                    counts[label] += 1;
                });
            for (i, mut c) in new_centroids.axis_iter_mut(Axis(0)).enumerate() {
                if counts[i] > 0 {
                    c.mapv_inplace(|v| v / counts[i] as f64);
                } else {
                    let idx = rng.gen_range(0..n_samples);
                    trace!("reseeding empty cluster {} with point {}", i, idx);
                    c.assign(&X.row(idx));
                }
            }
            centroids = new_centroids;

            // Assign labels.
            let new_labels = assign_labels(X, &centroids);
            if new_labels == labels {
                break;
            }
            labels = new_labels;
        }

        debug!(
            "k-means with {} clusters settled after {} iterations",
            self.n_clusters, iterations
        );
        Ok(KMeansFit {
            centroids,
            labels,
            iterations,
        })
    }
}

/// Assigns labels to each sample based on the closest centroid.
#[allow(non_snake_case)]
fn assign_labels<S1, S2>(X: &ArrayBase<S1, Ix2>, centroids: &ArrayBase<S2, Ix2>) -> Array1<usize>
where
    S1: Data<Elem = f64> + Sync,
    S2: Data<Elem = f64> + Sync,
{
    let n_samples = X.len_of(Axis(0));
    let n_centroids = centroids.len_of(Axis(0));
    let labels: Vec<usize> = (0..n_samples)
        .into_par_iter()
        .map(|i| {
            let x = X.row(i);
            let mut min_dist = f64::INFINITY;
            let mut min_j = 0;
            for j in 0..n_centroids {
                let dist = squared_distance(&x, &centroids.row(j));
                if dist < min_dist {
                    min_dist = dist;
                    min_j = j;
                }
            }
            min_j
        })
        .collect();

    Array1::from(labels)
}

/// Squared Euclidean distance between two points.
fn squared_distance<S1, S2>(x: &ArrayBase<S1, Ix1>, y: &ArrayBase<S2, Ix1>) -> f64
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
{
    (x - y).mapv(|v| v * v).sum()
}

/// Runs K-means with `k` clusters for at most `iterations` Lloyd steps.
#[allow(non_snake_case)]
pub fn kmeans<R: Rng + ?Sized>(
    X: &Array2<f64>,
    k: usize,
    iterations: usize,
    rng: &mut R,
) -> Result<KMeansFit> {
    KMeans::new(k, iterations).fit_predict(X, rng)
}

/// Sum of squared distances from each point to the centroid named by `labels`.
///
/// # Panics
///
/// Panics if a label is not a row index of `centroids`.
#[allow(non_snake_case)]
pub fn within_cluster_variance(X: &Array2<f64>, centroids: &Array2<f64>, labels: &Array1<usize>) -> f64 {
    X.axis_iter(Axis(0))
        .zip(labels.iter())
        .map(|(x, &label)| squared_distance(&x, &centroids.row(label)))
        .sum()
}

/// Counts the number of occurrences of each label.
fn count_labels(labels: &Array1<usize>, n_labels: usize) -> Vec<usize> {
    let mut counts = vec![0; n_labels];
    labels.iter().for_each(|&label| {
        counts[label] += 1;
    });
    counts
}
