use anyhow::{ensure, Result};
use clap::Parser;
use gmix::{reduce_dimensions, select_k_by_bic, select_k_by_elbow, PcaTarget};
use ndarray::{Array2, Axis};
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand::prelude::*;
use rand_distr::Normal;

/// Generate Gaussian blobs and pick the number of clusters that explains them.
#[derive(Parser, Debug)]
#[command(name = "gmix", version)]
struct Args {
    /// Number of points drawn around each center
    #[arg(long, default_value_t = 100)]
    samples_per_cluster: usize,

    /// Number of generated centers
    #[arg(long, default_value_t = 3)]
    clusters: usize,

    /// Number of dimensions
    #[arg(long, default_value_t = 2)]
    features: usize,

    /// Standard deviation of each blob
    #[arg(long, default_value_t = 1.0)]
    spread: f64,

    /// Smallest cluster count to test
    #[arg(long, default_value_t = 1)]
    kmin: usize,

    /// Largest cluster count to test
    #[arg(long, default_value_t = 6)]
    kmax: usize,

    /// Maximum EM / K-means iterations per candidate
    #[arg(long, default_value_t = 1000)]
    iterations: usize,

    /// Log-likelihood tolerance for EM early stopping
    #[arg(long, default_value_t = 1e-5)]
    tolerance: f64,

    /// Seed for data generation and initialization
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Project onto this many principal components before clustering
    #[arg(long)]
    pca: Option<usize>,
}

fn generate_blobs(args: &Args, rng: &mut StdRng) -> Result<Array2<f64>> {
    let center_distribution = Uniform::new(-10.0 * args.spread, 10.0 * args.spread);
    let noise = Normal::new(0.0, args.spread)?;

    let centers = Array2::random_using((args.clusters, args.features), center_distribution, rng);
    let mut blobs = Vec::with_capacity(args.clusters);
    for center in centers.axis_iter(Axis(0)) {
        let points =
            Array2::random_using((args.samples_per_cluster, args.features), noise, rng) + &center;
        blobs.push(points);
    }
    let views: Vec<_> = blobs.iter().map(|b| b.view()).collect();
    Ok(ndarray::concatenate(Axis(0), &views)?)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    ensure!(args.clusters > 0, "--clusters must be positive");
    ensure!(args.spread > 0.0, "--spread must be positive");

    println!(
        "Number of Samples: {}, Number of Features: {}, Number of Clusters: {}",
        args.samples_per_cluster * args.clusters,
        args.features,
        args.clusters
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut points = generate_blobs(&args, &mut rng)?;
    println!("Dataset generated.");

    if let Some(ndim) = args.pca {
        points = reduce_dimensions(&points, PcaTarget::Components(ndim))?;
        println!("Reduced to {} principal components.", ndim);
    }

    let kmax = args.kmax.min(points.nrows());
    let selection = select_k_by_bic(
        &points,
        args.kmin,
        Some(kmax),
        args.iterations,
        args.tolerance,
        &mut rng,
    )?;

    println!("BIC sweep:");
    for entry in &selection.trace {
        match &entry.score {
            Ok(score) => println!(
                "  k={:<3} log likelihood {:>14.4}  BIC {:>14.4}",
                entry.k, score.log_likelihood, score.bic
            ),
            Err(err) => println!("  k={:<3} failed: {}", entry.k, err),
        }
    }
    println!("Best k by BIC: {}", selection.best_k);
    println!("Priors: {}", selection.best.params.priors);
    println!("Means:\n{}", selection.best.params.means);

    let labels = selection.best.labels();
    println!("Cluster Assignment Counts:");
    for cluster_id in 0..selection.best_k {
        let count = labels.iter().filter(|&&x| x == cluster_id).count();
        println!("Cluster {}: {} points", cluster_id, count);
    }

    if args.kmin < kmax {
        let elbow = select_k_by_elbow(&points, args.kmin, Some(kmax), args.iterations, &mut rng)?;
        println!("Variance reduction relative to k={}:", args.kmin);
        for (entry, delta) in elbow.results.iter().zip(&elbow.delta_variances) {
            println!(
                "  k={:<3} variance {:>14.4}  reduction {:>14.4}",
                entry.k, entry.variance, delta
            );
        }
    }

    Ok(())
}
