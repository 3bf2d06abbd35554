//! Gaussian mixture fitting by Expectation-Maximization.
//!
//! A fit starts from K-means centroids (or caller-supplied means), uniform
//! priors and the dataset covariance for every cluster, then alternates
//!
//! ```text
//! E: γᵢⱼ = πⱼ N(xᵢ | μⱼ, Σⱼ) / Σₗ πₗ N(xᵢ | μₗ, Σₗ)
//! M: πⱼ = Σᵢ γᵢⱼ / n,  μⱼ = Σᵢ γᵢⱼ xᵢ / Σᵢ γᵢⱼ,  Σⱼ = Σᵢ γᵢⱼ (xᵢ − μⱼ)(xᵢ − μⱼ)ᵀ / Σᵢ γᵢⱼ
//! ```
//!
//! until the log-likelihood moves by less than the tolerance or the
//! iteration cap is reached. Degenerate numerics are returned as errors;
//! nothing is retried internally.

use crate::density::Precision;
use crate::error::{GmmError, Result};
use crate::expectation::expectation_for;
use crate::kmeans::kmeans;
use crate::maximization::maximization;
use crate::params::{dataset_covariance, MixtureParams};
use log::{debug, trace};
use ndarray::{Array1, Array2, Array3, Axis};
use rand::Rng;

pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

/// Lloyd iterations used to produce starting means.
pub const KMEANS_INIT_ITERATIONS: usize = 100;

/// Log-likelihood is reported every this many iterations.
const LOG_EVERY: usize = 10;

/// How an EM run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStatus {
    /// Successive log-likelihoods differed by less than the tolerance.
    Converged,
    /// The iteration cap was hit first. The parameters are the last ones computed.
    IterationLimitReached,
}

/// Result of a successful EM run.
#[derive(Debug, Clone)]
pub struct GmmFit {
    pub params: MixtureParams,
    /// Posterior probabilities under `params`, shape (k, n).
    pub responsibilities: Array2<f64>,
    pub log_likelihood: f64,
    pub status: FitStatus,
    /// Number of M steps performed.
    pub iterations: usize,
    /// Log-likelihood after initialization and after every iteration.
    pub log_likelihood_history: Vec<f64>,
}

impl GmmFit {
    pub fn n_components(&self) -> usize {
        self.params.n_components()
    }

    pub fn converged(&self) -> bool {
        self.status == FitStatus::Converged
    }

    /// Most likely cluster for each training point.
    pub fn labels(&self) -> Array1<usize> {
        argmax_columns(&self.responsibilities)
    }

    /// Most likely cluster for each row of `points` under the fitted mixture.
    pub fn predict(&self, points: &Array2<f64>) -> Result<Array1<usize>> {
        let (g, _) = expectation_for(points, &self.params)?;
        Ok(argmax_columns(&g))
    }

    /// Bayesian Information Criterion of this fit on `n_points` points.
    pub fn bic(&self, n_points: usize) -> f64 {
        bic(self.params.free_parameters(), n_points, self.log_likelihood)
    }
}

/// `p·ln(n) − 2·ll`; lower is better.
pub fn bic(free_parameters: usize, n_points: usize, log_likelihood: f64) -> f64 {
    free_parameters as f64 * (n_points as f64).ln() - 2.0 * log_likelihood
}

fn argmax_columns(g: &Array2<f64>) -> Array1<usize> {
    g.axis_iter(Axis(1))
        .map(|column| {
            column
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (j, &p)| {
                    if p > best.1 {
                        (j, p)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

/// Configuration of a Gaussian mixture fit.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    pub n_components: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl GaussianMixture {
    /// Creates a new mixture with the default iteration cap and tolerance.
    pub fn new(n_components: usize) -> Self {
        GaussianMixture {
            n_components,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Fits the mixture, drawing K-means starting means with `rng`.
    pub fn fit<R: Rng + ?Sized>(&self, points: &Array2<f64>, rng: &mut R) -> Result<GmmFit> {
        self.validate(points)?;
        let init = kmeans(points, self.n_components, KMEANS_INIT_ITERATIONS, rng)?;
        self.fit_with_means(points, init.centroids)
    }

    /// Fits the mixture from the given starting means, shape (k, d).
    pub fn fit_with_means(&self, points: &Array2<f64>, means: Array2<f64>) -> Result<GmmFit> {
        self.validate(points)?;
        if means.dim() != (self.n_components, points.ncols()) {
            return Err(GmmError::shape(
                format!("{}x{} means", self.n_components, points.ncols()),
                format!("{}x{}", means.nrows(), means.ncols()),
            ));
        }
        let params = initial_params(points, means)?;
        self.run(points, params)
    }

    fn validate(&self, points: &Array2<f64>) -> Result<()> {
        let n = points.nrows();
        if self.n_components == 0 || self.n_components > n {
            return Err(GmmError::InvalidClusterCount {
                k: self.n_components,
                n,
            });
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(GmmError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }

    fn run(&self, points: &Array2<f64>, mut params: MixtureParams) -> Result<GmmFit> {
        let k = self.n_components;
        let (mut responsibilities, mut log_likelihood) = expectation_for(points, &params)?;
        let mut history = vec![log_likelihood];
        let mut status = FitStatus::IterationLimitReached;
        let mut iterations = 0;

        trace!("k={}: initial log likelihood {}", k, log_likelihood);
        while iterations < self.max_iterations {
            let next = maximization(points, &responsibilities)?;
            let (next_responsibilities, next_log_likelihood) = expectation_for(points, &next)?;
            iterations += 1;

            let delta = (next_log_likelihood - log_likelihood).abs();
            params = next;
            responsibilities = next_responsibilities;
            log_likelihood = next_log_likelihood;
            history.push(log_likelihood);

            if iterations % LOG_EVERY == 0 {
                debug!(
                    "k={}: log likelihood after {} iterations: {:.5}",
                    k, iterations, log_likelihood
                );
            }
            if delta < self.tolerance {
                status = FitStatus::Converged;
                break;
            }
        }

        debug!(
            "k={}: {:?} after {} iterations, log likelihood {:.5}",
            k, status, iterations, log_likelihood
        );
        Ok(GmmFit {
            params,
            responsibilities,
            log_likelihood,
            status,
            iterations,
            log_likelihood_history: history,
        })
    }
}

/// Uniform priors, and the dataset covariance for every cluster.
///
/// Falls back to identity covariances when the dataset covariance is not
/// positive definite, e.g. for a single point or collinear data.
fn initial_params(points: &Array2<f64>, means: Array2<f64>) -> Result<MixtureParams> {
    let (k, d) = means.dim();
    let mut shared = dataset_covariance(points);
    if Precision::new(&shared).is_err() {
        trace!("dataset covariance is singular, starting from identity");
        shared = Array2::eye(d);
    }
    let priors = Array1::from_elem(k, 1.0 / k as f64);
    let covariances = Array3::from_shape_fn((k, d, d), |(_, i, j)| shared[[i, j]]);
    MixtureParams::new(priors, means, covariances)
}

/// Fits a `k`-component mixture with K-means initialization.
pub fn fit_gmm<R: Rng + ?Sized>(
    points: &Array2<f64>,
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut R,
) -> Result<GmmFit> {
    GaussianMixture::new(k)
        .with_max_iterations(max_iterations)
        .with_tolerance(tolerance)
        .fit(points, rng)
}
