//! Principal component analysis used to shrink datasets before clustering.

use crate::error::{GmmError, Result};
use log::debug;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Axis};

/// How many principal components to keep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PcaTarget {
    /// Keep exactly this many components.
    Components(usize),
    /// Keep the fewest leading components whose share of the singular-value
    /// mass reaches this fraction.
    Variance(f64),
}

struct Svd {
    /// Singular values in decreasing order.
    singular_values: Array1<f64>,
    /// Right singular vectors as columns, shape (d, r).
    components: Array2<f64>,
}

fn svd(points: &Array2<f64>) -> Result<Svd> {
    let (n, d) = points.dim();
    if n == 0 || d == 0 {
        return Err(GmmError::shape("non-empty dataset", format!("{n}x{d}")));
    }
    let matrix = DMatrix::from_row_iterator(n, d, points.iter().copied());
    let decomposition = matrix.svd(false, true);
    let v_t = decomposition
        .v_t
        .ok_or_else(|| GmmError::shape("decomposable dataset", format!("{n}x{d}")))?;

    let mut order: Vec<usize> = (0..decomposition.singular_values.len()).collect();
    order.sort_by(|&a, &b| {
        decomposition.singular_values[b].total_cmp(&decomposition.singular_values[a])
    });

    let singular_values = order
        .iter()
        .map(|&i| decomposition.singular_values[i])
        .collect::<Array1<f64>>();
    let components = Array2::from_shape_fn((d, order.len()), |(row, col)| v_t[(order[col], row)]);
    Ok(Svd {
        singular_values,
        components,
    })
}

/// Number of leading components whose cumulative singular-value ratio reaches `fraction`.
fn components_for(singular_values: &Array1<f64>, fraction: f64) -> usize {
    let total = singular_values.sum();
    if total <= 0.0 {
        return 1;
    }
    let mut cumulative = 0.0;
    for (i, s) in singular_values.iter().enumerate() {
        cumulative += s / total;
        if cumulative >= fraction - 1e-12 {
            return i + 1;
        }
    }
    singular_values.len()
}

fn check_fraction(fraction: f64) -> Result<()> {
    if fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(GmmError::InvalidVarianceFraction(fraction))
    }
}

/// Weight matrix of shape (d, nd) whose columns are the leading principal
/// directions of `points` retaining `fraction` of the variance.
///
/// `points` is expected to be centered already.
pub fn pca_weights(points: &Array2<f64>, fraction: f64) -> Result<Array2<f64>> {
    check_fraction(fraction)?;
    let svd = svd(points)?;
    let nd = components_for(&svd.singular_values, fraction);
    Ok(svd.components.slice_move(ndarray::s![.., ..nd]))
}

/// Centers `points` and projects them onto their leading principal components.
pub fn reduce_dimensions(points: &Array2<f64>, target: PcaTarget) -> Result<Array2<f64>> {
    let (n, d) = points.dim();
    let mean = points
        .mean_axis(Axis(0))
        .ok_or_else(|| GmmError::shape("non-empty dataset", format!("{n}x{d}")))?;
    let centered = points - &mean;
    let svd = svd(&centered)?;

    let nd = match target {
        PcaTarget::Components(ndim) => {
            if ndim == 0 || ndim > svd.singular_values.len() {
                return Err(GmmError::shape(
                    format!("between 1 and {} components", svd.singular_values.len()),
                    format!("{ndim}"),
                ));
            }
            ndim
        }
        PcaTarget::Variance(fraction) => {
            check_fraction(fraction)?;
            components_for(&svd.singular_values, fraction)
        }
    };

    debug!("reducing {} dimensions to {}", d, nd);
    let weights = svd.components.slice(ndarray::s![.., ..nd]);
    Ok(centered.dot(&weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line_with_noise() -> Array2<f64> {
        array![
            [0.0, 0.0, 0.1],
            [1.0, 1.2, -0.1],
            [2.0, 1.9, 0.1],
            [3.0, 3.1, -0.1],
            [4.0, 4.0, 0.0]
        ]
    }

    #[test]
    fn test_fixed_components() {
        let points = line_with_noise();
        let reduced = reduce_dimensions(&points, PcaTarget::Components(1)).unwrap();
        assert_eq!(reduced.dim(), (5, 1));

        // The first axis is close to the diagonal, so projections keep the order.
        let column = reduced.column(0).to_vec();
        let increasing = column.windows(2).all(|w| w[1] > w[0]);
        let decreasing = column.windows(2).all(|w| w[1] < w[0]);
        assert!(increasing || decreasing);
        let span = (column[4] - column[0]).abs();
        assert!(span > 5.4 && span < 5.9, "span {span}");
    }

    #[test]
    fn test_projection_is_centered() {
        let reduced = reduce_dimensions(&line_with_noise(), PcaTarget::Components(2)).unwrap();
        let mean = reduced.mean_axis(Axis(0)).unwrap();
        assert!(mean.iter().all(|m| m.abs() < 1e-9));
    }

    #[test]
    fn test_variance_fraction() {
        let points = line_with_noise();
        let all = reduce_dimensions(&points, PcaTarget::Variance(1.0)).unwrap();
        assert_eq!(all.ncols(), 3);

        let most = reduce_dimensions(&points, PcaTarget::Variance(0.5)).unwrap();
        assert_eq!(most.ncols(), 1);
    }

    #[test]
    fn test_weights_are_orthonormal() {
        let points = line_with_noise();
        let mean = points.mean_axis(Axis(0)).unwrap();
        let w = pca_weights(&(&points - &mean), 1.0).unwrap();
        let gram = w.t().dot(&w);
        for i in 0..gram.nrows() {
            for j in 0..gram.ncols() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_invalid_targets() {
        let points = line_with_noise();
        assert!(matches!(
            reduce_dimensions(&points, PcaTarget::Components(0)),
            Err(GmmError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            reduce_dimensions(&points, PcaTarget::Components(4)),
            Err(GmmError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            reduce_dimensions(&points, PcaTarget::Variance(0.0)),
            Err(GmmError::InvalidVarianceFraction(_))
        ));
        assert!(matches!(
            pca_weights(&points, 1.5),
            Err(GmmError::InvalidVarianceFraction(_))
        ));
    }
}
