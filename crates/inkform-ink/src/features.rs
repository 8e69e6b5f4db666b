//! Per-sample derived channels and the 15-channel feature matrix.
//!
//! Every channel is computed over the concatenated knot resampling of the
//! ink's strokes, in stroke order. The channel definitions follow the
//! calibration of the downstream recognizer, including a few historical
//! quirks (argument order of the heading arctangent, the pen-down rail
//! convention); changing them silently would shift the classifier's input
//! distribution.

use nalgebra::{DMatrix, Vector2};

use inkform_core::numeric::{atan2_each, polyfit, sign};
use inkform_core::GeomError;

use crate::ink::Ink;

/// Channel names in matrix column order.
pub const FEATURE_NAMES: [&str; 15] = [
    "x",
    "y",
    "high-pass filtered x",
    "stroke start",
    "stroke stop",
    "radius",
    "writing direction x",
    "writing direction y",
    "tangent x",
    "tangent y",
    "below a stroke",
    "above a stroke",
    "delta x",
    "delta y",
    "intersection",
];

/// Division guard shared by the channel computations.
const EPS: f64 = 1e-8;

/// All derived per-sample quantities of one ink unit.
///
/// Vectors are indexed by concatenated knot sample; `knot_counts` records how
/// many samples each stroke contributed.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub knot_counts: Vec<usize>,
    pub positions: Vec<Vector2<f64>>,
    pub deriv1: Vec<Vector2<f64>>,
    pub deriv2: Vec<Vector2<f64>>,
    pub tangent: Vec<Vector2<f64>>,
    pub rough_tangent: Vec<Vector2<f64>>,
    pub radius_normalized: Vec<f64>,
    pub writing_direction: Vec<Vector2<f64>>,
    /// Pen-down rails: 1 everywhere except 0 at each stroke's first sample
    /// (start) respectively last sample (stop).
    pub rail_start: Vec<f64>,
    pub rail_stop: Vec<f64>,
    pub x_high_pass: Vec<f64>,
    pub enclosed_below: Vec<f64>,
    pub enclosed_above: Vec<f64>,
    /// First differences of the resampled positions, prefixed with 0.
    pub delta_x: Vec<f64>,
    pub delta_y: Vec<f64>,
    pub intersection: Vec<f64>,
    /// samples x 15, column order as in [`FEATURE_NAMES`].
    pub matrix: DMatrix<f32>,
}

pub(crate) fn compute(ink: &Ink) -> Result<FeatureSet, GeomError> {
    let mut knot_counts = Vec::with_capacity(ink.n_strokes());
    let mut positions: Vec<Vector2<f64>> = Vec::new();
    let mut deriv1: Vec<Vector2<f64>> = Vec::new();
    let mut deriv2: Vec<Vector2<f64>> = Vec::new();
    let mut rough_tangent: Vec<Vector2<f64>> = Vec::new();
    let mut x_high_pass: Vec<f64> = Vec::new();

    for stroke in ink.strokes() {
        let spline = stroke.spline()?;
        let knots = stroke.knots()?;
        knot_counts.push(knots.len());

        let pos = spline.eval(knots, 0);
        deriv1.extend(spline.eval(knots, 1));
        deriv2.extend(spline.eval(knots, 2));

        // High-pass x: subtract the per-stroke least-squares line of x
        // against the knot parameter.
        let xs = DMatrix::from_fn(knots.len(), 1, |i, _| pos[i].x);
        match polyfit(knots, &xs, 1) {
            Ok(c) => x_high_pass.extend(
                knots
                    .iter()
                    .zip(pos.iter())
                    .map(|(t, p)| p.x - (c[(0, 0)] * t + c[(1, 0)])),
            ),
            Err(err) => {
                log::warn!("high-pass line fit degenerate ({err}), leaving x unfiltered");
                x_high_pass.extend(pos.iter().map(|p| p.x));
            }
        }

        rough_tangent.extend(rough_tangent_of(spline, knots));
        positions.extend(pos);
    }

    let n = positions.len();
    let x: Vec<f64> = positions.iter().map(|p| p.x).collect();
    let y: Vec<f64> = positions.iter().map(|p| p.y).collect();

    // Pen-down rails.
    let mut rail_start = vec![1.0; n];
    let mut rail_stop = vec![1.0; n];
    let mut offset = 0;
    for count in &knot_counts {
        rail_start[offset] = 0.0;
        rail_stop[offset + count - 1] = 0.0;
        offset += count;
    }

    // Tangent with an epsilon-padded magnitude.
    let tangent: Vec<Vector2<f64>> = deriv1
        .iter()
        .map(|d| d / (EPS + d.norm_squared()).sqrt())
        .collect();

    // Curvature radius, squashed to (-1, 1).
    let radius_normalized: Vec<f64> = deriv1
        .iter()
        .zip(&deriv2)
        .map(|(d1, d2)| {
            let denom = EPS + d1.x * d2.y - d1.y * d2.x;
            let r = d1.norm_squared().powf(1.5) / denom;
            sign(r) / (1.0 + r.abs())
        })
        .collect();

    let tx: Vec<f64> = tangent.iter().map(|t| t.x).collect();
    let ty: Vec<f64> = tangent.iter().map(|t| t.y).collect();
    let writing_direction: Vec<Vector2<f64>> = atan2_each(&ty, &tx)
        .iter()
        .map(|a| Vector2::new(a.cos(), a.sin()))
        .collect();

    // Per-segment differences of the resampled sequence (stroke boundaries
    // included; the rails mask them out where it matters).
    let seg_dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let seg_dy: Vec<f64> = y.windows(2).map(|w| w[1] - w[0]).collect();
    let mut delta_x = Vec::with_capacity(n);
    delta_x.push(0.0);
    delta_x.extend_from_slice(&seg_dx);
    let mut delta_y = Vec::with_capacity(n);
    delta_y.push(0.0);
    delta_y.extend_from_slice(&seg_dy);

    // Segment j connects samples j and j+1 without crossing a pen-up.
    let seg_ok: Vec<bool> = (0..n.saturating_sub(1))
        .map(|j| rail_stop[j] * rail_start[j + 1] == 1.0)
        .collect();

    let (enclosed_below, enclosed_above) =
        enclosure(&x, &y, &seg_dx, &seg_dy, &seg_ok);
    let intersection = self_intersection(&x, &y, &seg_dx, &seg_dy, &seg_ok);

    let matrix = DMatrix::from_fn(n, 15, |i, ch| {
        let v = match ch {
            0 => x[i],
            1 => y[i],
            2 => x_high_pass[i],
            3 => rail_start[i],
            4 => rail_stop[i],
            5 => radius_normalized[i],
            6 => writing_direction[i].x,
            7 => writing_direction[i].y,
            8 => rough_tangent[i].x,
            9 => rough_tangent[i].y,
            10 => enclosed_below[i],
            11 => enclosed_above[i],
            12 => delta_x[i],
            13 => delta_y[i],
            _ => intersection[i],
        };
        v as f32
    });

    Ok(FeatureSet {
        knot_counts,
        positions,
        deriv1,
        deriv2,
        tangent,
        rough_tangent,
        radius_normalized,
        writing_direction,
        rail_start,
        rail_stop,
        x_high_pass,
        enclosed_below,
        enclosed_above,
        delta_x,
        delta_y,
        intersection,
        matrix,
    })
}

/// Midpoint-to-midpoint tangent estimate, more stable than the derivative
/// where the spline wiggles between samples.
///
/// The evaluation grid keeps both knot endpoints and inserts the midpoint of
/// every knot interval, so the position differences span one half-interval
/// on each side of a knot.
fn rough_tangent_of(
    spline: &inkform_core::StrokeSpline,
    knots: &[f64],
) -> Vec<Vector2<f64>> {
    let k = knots.len();
    let mut grid = Vec::with_capacity(k + 1);
    grid.push(knots[0]);
    for w in knots.windows(2) {
        grid.push((w[0] + w[1]) / 2.0);
    }
    grid.push(knots[k - 1]);

    let pos = spline.eval(&grid, 0);
    pos.windows(2)
        .map(|w| {
            let d = w[1] - w[0];
            d / (d.norm() + EPS)
        })
        .collect()
}

/// Enclosure channels: whether each sample lies above/below some other
/// same-ink segment whose x-extent straddles it.
fn enclosure(
    x: &[f64],
    y: &[f64],
    seg_dx: &[f64],
    seg_dy: &[f64],
    seg_ok: &[bool],
) -> (Vec<f64>, Vec<f64>) {
    let n = x.len();
    let m = seg_ok.len();

    // Chord line of each segment: y = a * x + b.
    let a: Vec<f64> = (0..m).map(|j| seg_dy[j] / seg_dx[j]).collect();
    let b: Vec<f64> = (0..m).map(|j| y[j] - a[j] * x[j]).collect();

    let mut below = Vec::with_capacity(n);
    let mut above = Vec::with_capacity(n);
    for i in 0..n {
        let mut hits_below = 0.0;
        let mut hits_above = 0.0;
        for j in 0..m {
            if !seg_ok[j] {
                continue;
            }
            // Strictly between the segment's x endpoints; this also rules
            // out vertical segments whose chord slope is not finite.
            if (x[i] - x[j]) * (x[i] - x[j + 1]) >= 0.0 {
                continue;
            }
            if y[i] > a[j] * x[i] + b[j] {
                hits_below += 1.0;
            } else {
                hits_above += 1.0;
            }
        }
        below.push(sign(hits_below));
        above.push(sign(hits_above));
    }
    (below, above)
}

/// Self-intersection indicator.
///
/// For every pair of segments, the relative orientation of segment j's
/// heading against the direction towards samples i and i+1 is reduced
/// mod 2π and thresholded at π; a flip between the two (XOR) marks a
/// potential crossing. Pairs touching a pen-up gap, the diagonal and its
/// immediate neighbors are masked out, and the relation is symmetrized so
/// both segments must see the flip.
fn self_intersection(
    x: &[f64],
    y: &[f64],
    seg_dx: &[f64],
    seg_dy: &[f64],
    seg_ok: &[bool],
) -> Vec<f64> {
    use std::f64::consts::{PI, TAU};

    let n = x.len();
    let m = seg_ok.len();
    if m == 0 {
        return vec![0.0; n];
    }

    // Heading per segment; the x-before-y argument order is part of the
    // recognizer's calibration.
    let phi = atan2_each(seg_dx, seg_dy);

    let oriented = |j: usize, i: usize| -> bool {
        let towards = (x[i] - x[j]).atan2(y[i] - y[j]);
        (phi[j] - towards).rem_euclid(TAU) < PI
    };

    let mut cond = vec![false; m * m];
    for j in 0..m {
        for i in 0..m {
            if !seg_ok[i] {
                continue;
            }
            // XOR across the two samples bounding segment i.
            let flips = oriented(j, i) != oriented(j, i + 1);
            cond[j * m + i] = flips;
        }
    }
    // The diagonal and near-diagonal pairs are trivial neighbors.
    for j in 0..m {
        cond[j * m + j] = false;
        if j + 1 < m {
            cond[j * m + j + 1] = false;
        }
        if j > 0 {
            cond[j * m + j - 1] = false;
        }
    }

    // Both segments must observe the flip.
    let mut per_segment = vec![0.0; m];
    for i in 0..m {
        let crossing = (0..m).any(|j| cond[j * m + i] && cond[i * m + j]);
        per_segment[i] = if crossing { 1.0 } else { 0.0 };
    }

    // A sample is flagged when either adjacent segment crosses.
    (0..n)
        .map(|i| {
            let prev = if i > 0 { per_segment[i - 1] } else { 0.0 };
            let next = if i < m { per_segment[i] } else { 0.0 };
            sign(prev + next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{Point, Stroke};
    use approx::assert_relative_eq;

    fn ink_of(strokes: &[&[(f64, f64)]]) -> Ink {
        Ink::new(
            strokes
                .iter()
                .map(|pts| {
                    Stroke::new(pts.iter().map(|&(x, y)| Point::new(x, y)).collect())
                        .expect("stroke")
                })
                .collect(),
        )
        .expect("ink")
    }

    fn line_ink() -> Ink {
        ink_of(&[&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (10.0, 0.0)]])
    }

    #[test]
    fn matrix_has_fifteen_channels_and_finite_entries() {
        let ink = ink_of(&[
            &[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0), (3.0, -1.0), (4.0, 0.0)],
            &[(6.0, 0.0), (7.0, 2.0), (8.0, 0.0)],
        ]);
        let m = ink.feature_matrix().expect("features");
        assert_eq!(m.ncols(), 15);
        assert_eq!(m.ncols(), FEATURE_NAMES.len());
        let f = ink.features().expect("features");
        assert_eq!(m.nrows(), f.knot_counts.iter().sum::<usize>());
        assert!(m.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rails_mark_stroke_boundaries() {
        let ink = ink_of(&[
            &[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0), (3.0, 1.0)],
            &[(6.0, 0.0), (7.0, 2.0), (8.0, 0.0)],
        ]);
        let f = ink.features().expect("features");
        let first = f.knot_counts[0];
        assert_eq!(f.rail_start[0], 0.0);
        assert_eq!(f.rail_start[first], 0.0);
        assert_eq!(f.rail_stop[first - 1], 0.0);
        assert_eq!(f.rail_stop[f.rail_stop.len() - 1], 0.0);
        assert_eq!(f.rail_start.iter().filter(|&&v| v == 0.0).count(), 2);
        assert_eq!(f.rail_stop.iter().filter(|&&v| v == 0.0).count(), 2);
    }

    #[test]
    fn straight_line_has_flat_geometry_channels() {
        let ink = line_ink();
        let f = ink.features().expect("features");
        for t in &f.tangent {
            assert_relative_eq!(t.x, 1.0, epsilon = 1e-4);
            assert_relative_eq!(t.y, 0.0, epsilon = 1e-6);
        }
        for w in &f.writing_direction {
            assert_relative_eq!(w.x, 1.0, epsilon = 1e-6);
            assert_relative_eq!(w.y, 0.0, epsilon = 1e-6);
        }
        // Curvature radius of a straight line is huge, so the squashed
        // channel sits near zero.
        for r in &f.radius_normalized {
            assert!(r.abs() < 1e-3, "normalized radius {r} not near zero");
        }
        assert!(f.enclosed_below.iter().all(|&v| v == 0.0));
        assert!(f.enclosed_above.iter().all(|&v| v == 0.0));
        assert!(f.intersection.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn deltas_are_prefixed_with_zero() {
        let ink = line_ink();
        let f = ink.features().expect("features");
        assert_eq!(f.delta_x[0], 0.0);
        assert_eq!(f.delta_y[0], 0.0);
        assert_eq!(f.delta_x.len(), f.positions.len());
        // Evenly resampled straight line: constant positive x steps.
        assert!(f.delta_x[1..].iter().all(|&d| d > 0.0));
    }

    #[test]
    fn high_pass_removes_linear_drift() {
        let ink = line_ink();
        let f = ink.features().expect("features");
        for v in &f.x_high_pass {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn closed_loop_is_enclosed_from_both_sides() {
        // A polygonal "o": samples inside the loop see segments above and
        // below them.
        let circle: Vec<(f64, f64)> = (0..=24)
            .map(|i| {
                let a = i as f64 / 24.0 * std::f64::consts::TAU;
                (a.cos(), a.sin())
            })
            .collect();
        let ink = ink_of(&[&circle]);
        let f = ink.features().expect("features");
        assert!(
            f.enclosed_below.iter().any(|&v| v == 1.0),
            "no sample enclosed from below"
        );
        assert!(
            f.enclosed_above.iter().any(|&v| v == 1.0),
            "no sample enclosed from above"
        );
    }

    #[test]
    fn crossing_stroke_raises_the_intersection_flag() {
        // A figure-eight style crossing within one stroke.
        let ink = ink_of(&[&[
            (0.0, 0.0),
            (2.0, 2.0),
            (3.0, 1.5),
            (2.5, 0.0),
            (1.0, 2.0),
        ]]);
        let f = ink.features().expect("features");
        assert!(
            f.intersection.iter().any(|&v| v == 1.0),
            "crossing not detected"
        );
    }

    #[test]
    fn straight_two_point_stroke_does_not_intersect_itself() {
        let ink = ink_of(&[&[(0.0, 0.0), (5.0, 0.0)]]);
        let f = ink.features().expect("features");
        assert!(f.intersection.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn rough_tangent_matches_knot_count() {
        let ink = ink_of(&[
            &[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)],
            &[(5.0, 0.0), (6.0, -1.0), (7.0, 0.0)],
        ]);
        let f = ink.features().expect("features");
        assert_eq!(f.rough_tangent.len(), f.positions.len());
        for t in &f.rough_tangent {
            assert!(t.norm() <= 1.0 + 1e-9);
        }
    }
}
