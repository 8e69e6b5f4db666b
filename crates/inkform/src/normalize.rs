//! The five-step ink normalization pipeline.
//!
//! Each step derives one [`Transform`] from the current ink and applies it,
//! yielding a brand-new [`Ink`]; the input is never mutated. The step order
//! and several numeric details (running the skew step twice, the crossing
//! count's +1 adjustment) are part of the downstream recognizer's
//! calibration and must not be "fixed".

use std::f64::consts::FRAC_PI_2;

use nalgebra::{DMatrix, Vector2};

use inkform_core::numeric::polyfit;
use inkform_core::Transform;
use inkform_ink::Ink;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Fitted skew directions shorter than this are logged as ambiguous.
const SKEW_AMBIGUOUS_NORM: f64 = 0.1;
/// Below this norm the skew angle snaps to the nearest quarter turn.
const SKEW_LOW_CONFIDENCE_NORM: f64 = 0.23;
/// One-sided tolerance when splitting y-extrema into baseline/meanline
/// candidates.
const EXTREMA_EPS: f64 = 1e-12;
/// Expected y-range of a baseline-normalized ink.
const BASELINE_RANGE: f64 = 4.0;

/// Run all five normalization steps in their fixed order and return the
/// final ink. This is the only pipeline entry point external collaborators
/// call.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(ink), fields(id = ink.id().value(), strokes = ink.n_strokes())))]
pub fn apply_normalizations(ink: &Ink) -> Ink {
    let ink = normalized_skew_and_mean(ink);
    // Applied twice in sequence, by design.
    let ink = normalized_skew_and_mean(&ink);
    let ink = normalized_baseline(&ink);
    let ink = normalized_width(&ink);
    normalized_left(&ink)
}

/// Rotate the fitted writing line to the horizontal and move its reference
/// point near the origin.
///
/// When the fitted direction is too short to trust, the rotation angle snaps
/// to the nearest multiple of 90° and the translation targets the centroid
/// instead of the fitted intercept.
pub fn normalized_skew_and_mean(ink: &Ink) -> Ink {
    let part_lengths = ink.part_lengths();
    let pts = ink.concatenated();
    let coords = DMatrix::from_fn(pts.len(), 2, |i, j| if j == 0 { pts[i].x } else { pts[i].y });

    let coeffs = match polyfit(part_lengths, &coords, 1) {
        Ok(c) => c,
        Err(err) => {
            log::warn!("skew line fit degenerate ({err}), skipping skew normalization");
            return ink.apply(&Transform::identity());
        }
    };
    let direction = Vector2::new(coeffs[(0, 0)], coeffs[(0, 1)]);
    let intercept = Vector2::new(coeffs[(1, 0)], coeffs[(1, 1)]);

    let norm = direction.norm();
    if norm < SKEW_AMBIGUOUS_NORM {
        log::warn!("skew detection is ambiguous (direction norm {norm:.4})");
    }

    let mut angle = direction.y.atan2(direction.x);
    let transform = if norm < SKEW_LOW_CONFIDENCE_NORM {
        angle = (angle / FRAC_PI_2).round() * FRAC_PI_2;
        let centroid = ink.centroid();
        Transform::translation(-centroid.x, -centroid.y).compose(&Transform::rotation(-angle))
    } else {
        Transform::rotation(-angle).compose(&Transform::translation(-intercept.x, -intercept.y))
    };
    ink.apply(&transform)
}

/// Scale heights so the baseline-to-meanline distance becomes 1 and shift
/// the baseline to y = 0.
pub fn normalized_baseline(ink: &Ink) -> Ink {
    let (minima, maxima) = ink.extrema();

    let mut height = 1.0;
    let mut baseline = 0.0;
    let distinct = match (
        minima.iter().cloned().reduce(f64::min),
        maxima.iter().cloned().reduce(f64::max),
    ) {
        (Some(lo), Some(hi)) => lo != hi,
        _ => false,
    };
    if distinct {
        let below: Vec<f64> = minima.iter().copied().filter(|&v| v <= EXTREMA_EPS).collect();
        let above: Vec<f64> = maxima.iter().copied().filter(|&v| v >= -EXTREMA_EPS).collect();
        if below.is_empty() || above.is_empty() {
            log::warn!("no usable baseline/meanline extrema, keeping unit height");
        } else {
            let base = below.iter().sum::<f64>() / below.len() as f64;
            let mean = above.iter().sum::<f64>() / above.len() as f64;
            let h = mean - base;
            if h.is_finite() && h.abs() > f64::EPSILON {
                baseline = base;
                height = h;
            } else {
                log::warn!("degenerate baseline height {h:.4}, keeping unit height");
            }
        }
    }

    let transform = Transform::uniform_scale(1.0 / height)
        .compose(&Transform::translation(0.0, -baseline));
    let normalized = ink.apply(&transform);

    let bb = normalized.bounds();
    if bb.min_y < -BASELINE_RANGE || bb.max_y > BASELINE_RANGE {
        log::warn!(
            "baseline normalization out of range (y in [{:.2}, {:.2}])",
            bb.min_y,
            bb.max_y
        );
    }
    normalized
}

/// Count crossings of the horizontal line at `y_level` by the concatenated
/// sample sequence, plus one.
///
/// The +1 is an off-by-one carried over from the reference implementation;
/// the width calibration depends on it.
pub fn find_intersections(ink: &Ink, y_level: f64) -> usize {
    let crossings = ink
        .concatenated()
        .windows(2)
        .filter(|w| (w[0].y < y_level) != (w[1].y < y_level))
        .count();
    crossings + 1
}

/// Compress the x axis in proportion to how often the ink crosses the
/// half-height line, so dense and sparse words end up comparably wide.
pub fn normalized_width(ink: &Ink) -> Ink {
    let crossings = find_intersections(ink, 0.5);
    let width = ink.bounds().width();
    let factor = if crossings >= 2 && width > 0.0 {
        crossings as f64 / (4.0 * width)
    } else {
        1.0
    };
    ink.apply(&Transform::scale(factor, 1.0))
}

/// Shift the ink so its bounding box starts at x = 0.
pub fn normalized_left(ink: &Ink) -> Ink {
    let min_x = ink.bounds().min_x;
    ink.apply(&Transform::translation(-min_x, 0.0))
}
