//! Parametric cubic spline over arc length.
//!
//! A [`StrokeSpline`] interpolates a sampled pen stroke with one natural
//! cubic spline per coordinate, both parametrized by cumulative arc length.
//! Degenerate inputs (fewer than four distinct samples, closed single-point
//! strokes) are padded with a proxy so that fitting always succeeds for
//! non-empty input.

use nalgebra::{DMatrix, Point2, Vector2};

use crate::numeric::{cumsum, diff, linspace};
use crate::GeomError;

/// Resampling density: knots per unit of arc length.
pub const DOTS_PER_UNIT: f64 = 8.0;

const POINT_EPS: f64 = 1e-7;

/// Natural interpolating cubic spline over a strictly increasing parameter
/// grid.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    t: Vec<f64>,
    y: Vec<f64>,
    /// Second derivatives at the grid points, zero at both ends.
    m: Vec<f64>,
}

impl CubicSpline {
    /// Fit an interpolating spline through `(t[i], y[i])`.
    ///
    /// `t` must be strictly increasing with at least two entries. If the
    /// tridiagonal system turns out singular the spline degrades to the
    /// piecewise-linear interpolant (all second derivatives zero) and a
    /// diagnostic is logged; it never fails for valid input shapes.
    pub fn fit(t: Vec<f64>, y: Vec<f64>) -> Result<Self, GeomError> {
        if t.len() != y.len() {
            return Err(GeomError::WrongShape {
                expected: t.len(),
                got: y.len(),
            });
        }
        if t.len() < 2 {
            return Err(GeomError::EmptyStroke);
        }
        debug_assert!(t.windows(2).all(|w| w[1] > w[0]));

        let n = t.len();
        let mut m = vec![0.0; n];
        if n > 2 {
            let h = diff(&t);
            let k = n - 2;
            let mut a = DMatrix::<f64>::zeros(k, k);
            let mut rhs = DMatrix::<f64>::zeros(k, 1);
            for i in 0..k {
                a[(i, i)] = 2.0 * (h[i] + h[i + 1]);
                if i > 0 {
                    a[(i, i - 1)] = h[i];
                }
                if i + 1 < k {
                    a[(i, i + 1)] = h[i + 1];
                }
                rhs[(i, 0)] =
                    6.0 * ((y[i + 2] - y[i + 1]) / h[i + 1] - (y[i + 1] - y[i]) / h[i]);
            }
            match a.lu().solve(&rhs) {
                Some(sol) => {
                    for i in 0..k {
                        m[i + 1] = sol[(i, 0)];
                    }
                }
                None => {
                    log::warn!("cubic spline system is singular, degrading to a linear fit");
                }
            }
        }
        Ok(Self { t, y, m })
    }

    /// Evaluate the spline or one of its first two derivatives at `x`.
    ///
    /// Parameters outside the grid are extrapolated from the boundary
    /// segment. Derivative orders above 2 evaluate to zero.
    pub fn eval(&self, x: f64, der: usize) -> f64 {
        let n = self.t.len();
        let i = match self.t.partition_point(|&v| v <= x) {
            0 => 0,
            p => (p - 1).min(n - 2),
        };
        let h = self.t[i + 1] - self.t[i];
        let a = (self.t[i + 1] - x) / h;
        let b = (x - self.t[i]) / h;
        match der {
            0 => {
                a * self.y[i]
                    + b * self.y[i + 1]
                    + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) * h * h / 6.0
            }
            1 => {
                (self.y[i + 1] - self.y[i]) / h - (3.0 * a * a - 1.0) / 6.0 * h * self.m[i]
                    + (3.0 * b * b - 1.0) / 6.0 * h * self.m[i + 1]
            }
            2 => a * self.m[i] + b * self.m[i + 1],
            _ => 0.0,
        }
    }
}

/// Parametric curve fit of one pen stroke: x(t), y(t) over cumulative arc
/// length.
#[derive(Debug, Clone)]
pub struct StrokeSpline {
    u: Vec<f64>,
    x: CubicSpline,
    y: CubicSpline,
}

impl StrokeSpline {
    /// Fit a stroke sampled as an ordered point list.
    ///
    /// Empty input is a precondition violation. Fewer than four distinct
    /// points are padded with a linear proxy running from the last point back
    /// to the first; if the endpoints coincide (within epsilon) the proxy's
    /// trailing y samples are nudged upwards so the parameter grid stays
    /// strictly increasing.
    pub fn fit(points: &[Point2<f64>]) -> Result<Self, GeomError> {
        if points.is_empty() {
            return Err(GeomError::EmptyStroke);
        }

        // Exactly coincident neighbors would collapse a spline segment.
        let mut xs: Vec<f64> = vec![points[0].x];
        let mut ys: Vec<f64> = vec![points[0].y];
        for p in &points[1..] {
            if p.x != xs[xs.len() - 1] || p.y != ys[ys.len() - 1] {
                xs.push(p.x);
                ys.push(p.y);
            }
        }

        if xs.len() < 4 {
            let first = Point2::new(xs[0], ys[0]);
            let last = Point2::new(*xs.last().unwrap_or(&xs[0]), *ys.last().unwrap_or(&ys[0]));
            let w_first = linspace(0.0, 1.0, 4);
            let w_last = linspace(1.0, 0.0, 4);
            xs = (0..4)
                .map(|i| w_first[i] * first.x + w_last[i] * last.x)
                .collect();
            ys = (0..4)
                .map(|i| w_first[i] * first.y + w_last[i] * last.y)
                .collect();
            let closed = (first.x - last.x).abs() < POINT_EPS && (first.y - last.y).abs() < POINT_EPS;
            if closed {
                for (y, nudge) in ys.iter_mut().zip(linspace(0.0, 0.1, 4)) {
                    *y += nudge;
                }
            }
        }

        let dists: Vec<f64> = xs
            .windows(2)
            .zip(ys.windows(2))
            .map(|(wx, wy)| (wx[1] - wx[0]).hypot(wy[1] - wy[0]))
            .collect();
        let mut u = Vec::with_capacity(xs.len());
        u.push(0.0);
        u.extend(cumsum(&dists));

        let x = CubicSpline::fit(u.clone(), xs)?;
        let y = CubicSpline::fit(u.clone(), ys)?;
        Ok(Self { u, x, y })
    }

    /// Largest parameter value, equal to the total arc length of the fit
    /// points.
    pub fn max_param(&self) -> f64 {
        *self.u.last().unwrap_or(&0.0)
    }

    /// Parameter values of the fit points.
    pub fn params(&self) -> &[f64] {
        &self.u
    }

    /// Resampled knot sequence: `max(2, round(8 * arc length))` evenly
    /// spaced parameter values on `[0, max_param]`.
    pub fn knots(&self) -> Vec<f64> {
        let total = self.max_param();
        let count = ((DOTS_PER_UNIT * total).round() as usize).max(2);
        linspace(0.0, total, count)
    }

    /// Evaluate position (`der == 0`) or a derivative at one parameter value.
    pub fn eval_at(&self, t: f64, der: usize) -> Vector2<f64> {
        Vector2::new(self.x.eval(t, der), self.y.eval(t, der))
    }

    /// Evaluate position or a derivative at many parameter values.
    pub fn eval(&self, ts: &[f64], der: usize) -> Vec<Vector2<f64>> {
        ts.iter().map(|&t| self.eval_at(t, der)).collect()
    }
}
