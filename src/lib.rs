//! Gaussian mixture models fitted by Expectation-Maximization, with
//! cluster-count selection by BIC and by within-cluster variance.
//!
//! All randomness is drawn from a caller-supplied [`rand::Rng`], so seeded
//! runs are reproducible.

pub mod bic;
pub mod density;
pub mod elbow;
pub mod error;
pub mod expectation;
pub mod gmm;
pub mod kmeans;
pub mod maximization;
pub mod params;
pub mod pca;

pub use bic::{select_k_by_bic, BicEntry, BicScore, BicSelection};
pub use density::{density, DENSITY_FLOOR};
pub use elbow::{select_k_by_elbow, ElbowEntry, ElbowSelection};
pub use error::{GmmError, Result};
pub use expectation::expectation;
pub use gmm::{fit_gmm, FitStatus, GaussianMixture, GmmFit};
pub use kmeans::{kmeans, KMeans, KMeansFit};
pub use maximization::maximization;
pub use params::MixtureParams;
pub use pca::{pca_weights, reduce_dimensions, PcaTarget};
