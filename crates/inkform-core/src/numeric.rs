//! Dense-slice helpers: differencing, prefix sums, sign predicates,
//! element-wise arctangent, Vandermonde construction, least-squares solve and
//! polynomial fitting.
//!
//! Everything here operates on plain `&[f64]` slices or `DMatrix<f64>`; the
//! higher layers decide what the numbers mean.

use nalgebra::DMatrix;

use crate::GeomError;

/// First differences: `out[i] = xs[i + 1] - xs[i]`.
pub fn diff(xs: &[f64]) -> Vec<f64> {
    xs.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Running prefix sums of `xs`.
pub fn cumsum(xs: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    xs.iter()
        .map(|x| {
            acc += x;
            acc
        })
        .collect()
}

/// `n` evenly spaced values from `start` to `stop`, endpoints inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Sign of `x` as -1.0, 0.0 or 1.0.
///
/// Unlike `f64::signum` this maps zero to zero, which the indicator channels
/// rely on.
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Element-wise two-argument arctangent, `out[i] = atan2(y[i], x[i])`.
pub fn atan2_each(y: &[f64], x: &[f64]) -> Vec<f64> {
    y.iter().zip(x).map(|(a, b)| a.atan2(*b)).collect()
}

/// Vandermonde matrix with `order` columns, highest power first.
///
/// Row `i` is `[x_i^(order-1), ..., x_i, 1]`.
pub fn vander(x: &[f64], order: usize) -> DMatrix<f64> {
    DMatrix::from_fn(x.len(), order, |i, j| x[i].powi((order - 1 - j) as i32))
}

/// Least-squares solve of `a * x = b` via SVD.
pub fn lstsq(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>, GeomError> {
    if a.nrows() != b.nrows() {
        return Err(GeomError::WrongShape {
            expected: a.nrows(),
            got: b.nrows(),
        });
    }
    let svd = a.clone().svd(true, true);
    svd.solve(b, 1e-12).map_err(|_| GeomError::SingularSystem)
}

/// Least-squares polynomial fit of degree `deg`.
///
/// `y` holds one column per fitted output; the result is a
/// `(deg + 1) x ncols` coefficient matrix, highest power first. Columns of
/// the Vandermonde matrix are scaled to unit norm before solving and the
/// coefficients unscaled afterwards, which keeps the system well conditioned
/// for arc-length parameters spanning very different ranges.
pub fn polyfit(x: &[f64], y: &DMatrix<f64>, deg: usize) -> Result<DMatrix<f64>, GeomError> {
    if y.nrows() != x.len() {
        return Err(GeomError::WrongShape {
            expected: x.len(),
            got: y.nrows(),
        });
    }
    let order = deg + 1;
    let mut lhs = vander(x, order);

    let scale: Vec<f64> = (0..order).map(|j| lhs.column(j).norm()).collect();
    for (j, s) in scale.iter().enumerate() {
        if *s > 0.0 {
            for i in 0..lhs.nrows() {
                lhs[(i, j)] /= s;
            }
        }
    }

    let mut coeffs = lstsq(&lhs, y)?;
    for (j, s) in scale.iter().enumerate() {
        if *s > 0.0 {
            for k in 0..coeffs.ncols() {
                coeffs[(j, k)] /= s;
            }
        }
    }
    Ok(coeffs)
}

/// Local minima values of `ys`, in order of appearance.
pub fn local_minima(ys: &[f64]) -> Vec<f64> {
    local_extrema(ys, false)
}

/// Local maxima values of `ys`, in order of appearance.
pub fn local_maxima(ys: &[f64]) -> Vec<f64> {
    local_extrema(ys, true)
}

/// Legacy extremum scan.
///
/// A strictly monotone step in the extremal direction resets the candidate
/// set to the new value; a step the other way flushes the candidates into the
/// result. A flat step whose value equals the current candidate discards the
/// candidate set entirely. Downstream calibration depends on exactly this
/// plateau handling, so it is kept bit-for-bit even though re-adding the
/// candidate would look more natural.
fn local_extrema(ys: &[f64], maxima: bool) -> Vec<f64> {
    let Some(&first) = ys.first() else {
        return Vec::new();
    };
    let dir = if maxima { 1.0 } else { -1.0 };
    let mut candidates = vec![first];
    let mut out = Vec::new();
    for w in ys.windows(2) {
        let step = (w[1] - w[0]) * dir;
        if step > 0.0 {
            candidates.clear();
            candidates.push(w[1]);
        }
        if step < 0.0 {
            out.append(&mut candidates);
        }
        if w[1] == w[0] && candidates.last() == Some(&w[1]) {
            candidates.clear();
        }
    }
    out.append(&mut candidates);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn diff_and_cumsum_are_inverse_shifted() {
        let xs = [1.0, 3.0, 6.0, 10.0];
        assert_eq!(diff(&xs), vec![2.0, 3.0, 4.0]);
        assert_eq!(cumsum(&[1.0, 2.0, 3.0]), vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn linspace_hits_both_endpoints() {
        let v = linspace(0.0, 1.0, 4);
        assert_eq!(v.len(), 4);
        assert_relative_eq!(v[0], 0.0);
        assert_relative_eq!(v[1], 1.0 / 3.0);
        assert_relative_eq!(v[3], 1.0);
        assert_eq!(linspace(2.0, 5.0, 1), vec![2.0]);
    }

    #[test]
    fn sign_maps_zero_to_zero() {
        assert_eq!(sign(3.5), 1.0);
        assert_eq!(sign(-0.1), -1.0);
        assert_eq!(sign(0.0), 0.0);
    }

    #[test]
    fn polyfit_recovers_a_line() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = DMatrix::from_fn(5, 2, |i, j| {
            let t = x[i];
            if j == 0 {
                2.0 * t + 1.0
            } else {
                -0.5 * t + 3.0
            }
        });
        let c = polyfit(&x, &y, 1).expect("fit");
        assert_eq!(c.nrows(), 2);
        assert_relative_eq!(c[(0, 0)], 2.0, epsilon = 1e-9);
        assert_relative_eq!(c[(1, 0)], 1.0, epsilon = 1e-9);
        assert_relative_eq!(c[(0, 1)], -0.5, epsilon = 1e-9);
        assert_relative_eq!(c[(1, 1)], 3.0, epsilon = 1e-9);
    }

    #[test]
    fn polyfit_rejects_mismatched_rows() {
        let y = DMatrix::zeros(3, 1);
        let err = polyfit(&[0.0, 1.0], &y, 1).unwrap_err();
        assert_eq!(err, GeomError::WrongShape { expected: 2, got: 3 });
    }

    #[test]
    fn extrema_simple_peaks_and_valleys() {
        let ys = [0.0, 2.0, 1.0, 3.0, 0.5];
        assert_eq!(local_maxima(&ys), vec![2.0, 3.0]);
        assert_eq!(local_minima(&ys), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn extrema_plateau_discards_candidates() {
        // Legacy tie-break: a plateau at the running candidate value drops it.
        let ys = [0.0, 1.0, 1.0, 0.0];
        assert_eq!(local_maxima(&ys), Vec::<f64>::new());
        assert_eq!(local_minima(&[1.0, 0.0, 0.0, 1.0]), Vec::<f64>::new());
    }

    #[test]
    fn extrema_first_sample_is_a_candidate() {
        assert_eq!(local_maxima(&[3.0, 1.0, 2.0]), vec![3.0, 2.0]);
    }
}
