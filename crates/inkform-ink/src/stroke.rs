//! A single pen-down gesture and its cached curve fit.

use std::sync::OnceLock;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use inkform_core::{GeomError, StrokeSpline};

/// A captured stylus sample position.
pub type Point = Point2<f64>;

/// Tolerance for point equality. Coordinates are never compared exactly.
pub const POINT_EPS: f64 = 1e-7;

/// Epsilon-based point equality.
pub fn points_eq(a: &Point, b: &Point) -> bool {
    (a.x - b.x).abs() < POINT_EPS && (a.y - b.y).abs() < POINT_EPS
}

/// Axis-aligned bounding box of a point set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Bounding box of `points`. Degenerate (inverted infinite) for an empty
    /// slice, which no caller constructs.
    pub fn of(points: &[Point]) -> Self {
        let mut bb = Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for p in points {
            bb.min_x = bb.min_x.min(p.x);
            bb.max_x = bb.max_x.max(p.x);
            bb.min_y = bb.min_y.min(p.y);
            bb.max_y = bb.max_y.max(p.y);
        }
        bb
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// One continuous pen-down-to-pen-up sample sequence.
///
/// The fitted [`StrokeSpline`] and its resampled knot vector are computed at
/// most once per instance and are logically immutable afterwards; concurrent
/// first access is single-flighted by the underlying `OnceLock` cells.
#[derive(Debug, Clone)]
pub struct Stroke {
    points: Vec<Point>,
    spline: OnceLock<Result<StrokeSpline, GeomError>>,
    knots: OnceLock<Vec<f64>>,
}

impl Stroke {
    /// Build a stroke from captured samples. At least one point is required.
    pub fn new(points: Vec<Point>) -> Result<Self, GeomError> {
        if points.is_empty() {
            return Err(GeomError::EmptyStroke);
        }
        Ok(Self::from_nonempty(points))
    }

    pub(crate) fn from_nonempty(points: Vec<Point>) -> Self {
        debug_assert!(!points.is_empty());
        Self {
            points,
            spline: OnceLock::new(),
            knots: OnceLock::new(),
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    pub fn first(&self) -> &Point {
        &self.points[0]
    }

    pub fn last(&self) -> &Point {
        &self.points[self.points.len() - 1]
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::of(&self.points)
    }

    /// Total arc length of the raw polyline.
    pub fn arc_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
            .sum()
    }

    /// The fitted parametric cubic spline over cumulative arc length.
    pub fn spline(&self) -> Result<&StrokeSpline, GeomError> {
        self.spline
            .get_or_init(|| StrokeSpline::fit(&self.points))
            .as_ref()
            .map_err(|e| e.clone())
    }

    /// Resampled knot parameter values, evenly spaced on the spline's
    /// parameter range.
    pub fn knots(&self) -> Result<&[f64], GeomError> {
        let spline = self.spline()?;
        Ok(self.knots.get_or_init(|| spline.knots()))
    }

    /// Append another stroke's points, used when merging gapless strokes
    /// during ink construction. Caches are reset; callers only do this
    /// before any derived quantity has been requested.
    pub(crate) fn append(&mut self, other: Stroke) {
        self.points.extend(other.points);
        self.spline = OnceLock::new();
        self.knots = OnceLock::new();
    }

    /// Collapse runs of adjacent epsilon-equal points to their first sample.
    pub(crate) fn dedup_adjacent(&mut self) {
        let mut kept: Vec<Point> = Vec::with_capacity(self.points.len());
        for p in self.points.drain(..) {
            if kept.last().is_none_or(|l| !points_eq(l, &p)) {
                kept.push(p);
            }
        }
        self.points = kept;
        self.spline = OnceLock::new();
        self.knots = OnceLock::new();
    }
}
