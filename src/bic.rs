//! Cluster-count selection by Bayesian Information Criterion.

use crate::error::{GmmError, Result};
use crate::gmm::{bic, GaussianMixture, GmmFit};
use crate::params::{free_parameters, MixtureParams};
use log::{info, warn};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Score of one successful fit in a sweep.
#[derive(Debug, Clone)]
pub struct BicScore {
    pub log_likelihood: f64,
    pub bic: f64,
    pub free_parameters: usize,
}

/// One candidate cluster count in a sweep, with its score or the reason it failed.
#[derive(Debug, Clone)]
pub struct BicEntry {
    pub k: usize,
    pub score: std::result::Result<BicScore, GmmError>,
}

/// Outcome of [`select_k_by_bic`].
#[derive(Debug, Clone)]
pub struct BicSelection {
    pub best_k: usize,
    pub best: GmmFit,
    /// One entry per k, in increasing order of k.
    pub trace: Vec<BicEntry>,
}

impl BicSelection {
    pub fn best_params(&self) -> &MixtureParams {
        &self.best.params
    }

    /// Log-likelihood per k; `None` where the fit failed.
    pub fn log_likelihoods(&self) -> Vec<Option<f64>> {
        self.trace
            .iter()
            .map(|e| e.score.as_ref().ok().map(|s| s.log_likelihood))
            .collect()
    }

    /// BIC per k; `None` where the fit failed.
    pub fn bics(&self) -> Vec<Option<f64>> {
        self.trace
            .iter()
            .map(|e| e.score.as_ref().ok().map(|s| s.bic))
            .collect()
    }
}

/// Fits a mixture for every k in `[kmin, kmax]` and keeps the one with the lowest BIC.
///
/// `kmax` defaults to the number of points. Each k is fitted independently
/// on its own generator seeded from `rng`, so a sweep is reproducible for a
/// given `rng` state regardless of thread scheduling. A k whose fit fails is
/// recorded in the trace and skipped; ties go to the smaller k.
pub fn select_k_by_bic<R: Rng + ?Sized>(
    points: &Array2<f64>,
    kmin: usize,
    kmax: Option<usize>,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut R,
) -> Result<BicSelection> {
    let (n, d) = points.dim();
    let kmax = kmax.unwrap_or(n);
    if kmin == 0 || kmin > kmax || kmax > n {
        return Err(GmmError::EmptySweepRange { kmin, kmax, n });
    }
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(GmmError::InvalidTolerance(tolerance));
    }

    let seeds: Vec<(usize, u64)> = (kmin..=kmax).map(|k| (k, rng.gen())).collect();
    let fits: Vec<(usize, Result<GmmFit>)> = seeds
        .into_par_iter()
        .map(|(k, seed)| {
            let mut rng = StdRng::seed_from_u64(seed);
            let fit = GaussianMixture::new(k)
                .with_max_iterations(max_iterations)
                .with_tolerance(tolerance)
                .fit(points, &mut rng);
            (k, fit)
        })
        .collect();

    let mut trace = Vec::with_capacity(fits.len());
    let mut best: Option<(f64, GmmFit)> = None;
    for (k, fit) in fits {
        match fit {
            Ok(fit) => {
                let p = free_parameters(k, d);
                let score = BicScore {
                    log_likelihood: fit.log_likelihood,
                    bic: bic(p, n, fit.log_likelihood),
                    free_parameters: p,
                };
                info!(
                    "k={}: log likelihood {:.4}, BIC {:.4}",
                    k, score.log_likelihood, score.bic
                );
                if best.as_ref().map_or(true, |(b, _)| score.bic < *b) {
                    best = Some((score.bic, fit));
                }
                trace.push(BicEntry { k, score: Ok(score) });
            }
            Err(err) => {
                warn!("k={}: fit failed: {}", k, err);
                trace.push(BicEntry { k, score: Err(err) });
            }
        }
    }

    let (_, best) = best.ok_or(GmmError::NoViableFit { kmin, kmax })?;
    Ok(BicSelection {
        best_k: best.n_components(),
        best,
        trace,
    })
}
