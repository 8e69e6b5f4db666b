//! One written unit built from cleaned strokes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use inkform_core::numeric::{cumsum, local_maxima, local_minima};
use inkform_core::{GeomError, Transform};

use crate::features::{self, FeatureSet};
use crate::stroke::{points_eq, BoundingBox, Point, Stroke};

static NEXT_INK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide monotonic ink identity.
///
/// Ids are allocated by a counter instead of random draws so that identity
/// stays reproducible and collision-free within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InkId(u64);

impl InkId {
    fn next() -> Self {
        Self(NEXT_INK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// An ordered collection of strokes forming one written unit.
///
/// Invariant when clean: no stroke contains adjacent epsilon-equal points,
/// and no stroke's last point coincides (within epsilon) with the next
/// stroke's first point. [`Ink::new`] establishes the invariant; applying a
/// [`Transform`] preserves it by construction, so transformed inks are never
/// re-cleaned.
///
/// Derived quantities are cached per instance in fill-once cells; distinct
/// instances are fully independent.
#[derive(Debug, Clone)]
pub struct Ink {
    id: InkId,
    strokes: Vec<Stroke>,
    clean: bool,
    concatenated: OnceLock<Vec<Point>>,
    part_lengths: OnceLock<Vec<f64>>,
    features: OnceLock<Result<FeatureSet, GeomError>>,
}

impl Ink {
    /// Build an ink unit from raw captured strokes, cleaning them:
    /// gapless adjacent strokes are merged, then adjacent duplicate points
    /// removed within each stroke.
    ///
    /// At least one stroke is required.
    pub fn new(strokes: Vec<Stroke>) -> Result<Self, GeomError> {
        if strokes.is_empty() {
            return Err(GeomError::EmptyStroke);
        }

        let mut merged: Vec<Stroke> = Vec::with_capacity(strokes.len());
        for stroke in strokes {
            match merged.last_mut() {
                Some(prev) if points_eq(prev.last(), stroke.first()) => prev.append(stroke),
                _ => merged.push(stroke),
            }
        }
        for stroke in &mut merged {
            stroke.dedup_adjacent();
        }

        Ok(Self::assemble(merged, true))
    }

    fn assemble(strokes: Vec<Stroke>, clean: bool) -> Self {
        Self {
            id: InkId::next(),
            strokes,
            clean,
            concatenated: OnceLock::new(),
            part_lengths: OnceLock::new(),
            features: OnceLock::new(),
        }
    }

    pub fn id(&self) -> InkId {
        self.id
    }

    pub fn is_clean(&self) -> bool {
        self.clean
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn n_strokes(&self) -> usize {
        self.strokes.len()
    }

    /// All points of all strokes in stroke order, for whole-ink queries.
    pub fn concatenated(&self) -> &[Point] {
        self.concatenated.get_or_init(|| {
            self.strokes
                .iter()
                .flat_map(|s| s.points().iter().copied())
                .collect()
        })
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::of(self.concatenated())
    }

    /// Sum of the strokes' raw arc lengths.
    pub fn arc_length(&self) -> f64 {
        self.strokes.iter().map(Stroke::arc_length).sum()
    }

    /// Cumulative arc length at each concatenated raw sample, prefixed
    /// with 0. Pen-up gaps contribute the straight-line distance between the
    /// surrounding samples.
    pub fn part_lengths(&self) -> &[f64] {
        self.part_lengths.get_or_init(|| {
            let pts = self.concatenated();
            let dists: Vec<f64> = pts
                .windows(2)
                .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
                .collect();
            let mut out = Vec::with_capacity(pts.len());
            out.push(0.0);
            out.extend(cumsum(&dists));
            out
        })
    }

    /// Mean of the concatenated raw points.
    pub fn centroid(&self) -> Point {
        let pts = self.concatenated();
        let n = pts.len() as f64;
        let (sx, sy) = pts
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }

    /// Per-stroke local y-extrema values, concatenated in stroke order:
    /// `(minima, maxima)`.
    pub fn extrema(&self) -> (Vec<f64>, Vec<f64>) {
        let mut minima = Vec::new();
        let mut maxima = Vec::new();
        for stroke in &self.strokes {
            let ys: Vec<f64> = stroke.points().iter().map(|p| p.y).collect();
            minima.extend(local_minima(&ys));
            maxima.extend(local_maxima(&ys));
        }
        (minima, maxima)
    }

    /// Apply an affine transform, yielding a new ink unit.
    ///
    /// The concatenated point array is transformed and re-split using the
    /// original per-stroke point counts. Affine maps never change adjacency
    /// or merge topology, so the clean flag is inherited unchanged and
    /// cleaning is not re-run.
    pub fn apply(&self, transform: &Transform) -> Ink {
        let moved = transform.apply_points(self.concatenated());
        let mut strokes = Vec::with_capacity(self.strokes.len());
        let mut offset = 0;
        for stroke in &self.strokes {
            let n = stroke.n_points();
            strokes.push(Stroke::from_nonempty(moved[offset..offset + n].to_vec()));
            offset += n;
        }
        Self::assemble(strokes, self.clean)
    }

    /// The full per-sample derived channel set (computed once per instance).
    pub fn features(&self) -> Result<&FeatureSet, GeomError> {
        self.features
            .get_or_init(|| features::compute(self))
            .as_ref()
            .map_err(|e| e.clone())
    }

    /// The samples x 15 feature matrix handed to the recognizer.
    pub fn feature_matrix(&self) -> Result<&DMatrix<f32>, GeomError> {
        self.features().map(|f| &f.matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stroke(points: &[(f64, f64)]) -> Stroke {
        Stroke::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect()).expect("stroke")
    }

    #[test]
    fn gapless_strokes_are_merged_and_join_point_deduped() {
        let a = stroke(&[(0.0, 0.0), (2.0, 1.0), (5.0, 5.0)]);
        let b = stroke(&[(5.0000001, 5.0), (6.0, 4.0)]);
        let ink = Ink::new(vec![a, b]).expect("ink");
        assert_eq!(ink.n_strokes(), 1);
        // |A| + |B| - 1: the epsilon-equal join point collapses.
        assert_eq!(ink.strokes()[0].n_points(), 4);
        assert!(ink.is_clean());
    }

    #[test]
    fn merge_chains_across_several_strokes() {
        let a = stroke(&[(0.0, 0.0), (1.0, 0.0)]);
        let b = stroke(&[(1.0, 0.0), (2.0, 0.0)]);
        let c = stroke(&[(2.0, 0.0), (3.0, 0.0)]);
        let d = stroke(&[(9.0, 9.0), (10.0, 9.0)]);
        let ink = Ink::new(vec![a, b, c, d]).expect("ink");
        assert_eq!(ink.n_strokes(), 2);
        assert_eq!(ink.strokes()[0].n_points(), 4);
    }

    #[test]
    fn no_adjacent_duplicates_after_construction() {
        let ink = Ink::new(vec![stroke(&[
            (0.0, 0.0),
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 3e-8),
            (2.0, 0.0),
        ])])
        .expect("ink");
        for s in ink.strokes() {
            for w in s.points().windows(2) {
                assert!(!points_eq(&w[0], &w[1]));
            }
        }
    }

    #[test]
    fn part_lengths_are_prefixed_with_zero() {
        let ink = Ink::new(vec![stroke(&[(0.0, 0.0), (3.0, 4.0), (3.0, 10.0)])]).expect("ink");
        assert_eq!(ink.part_lengths(), &[0.0, 5.0, 11.0]);
    }

    #[test]
    fn apply_preserves_stroke_split_and_clean_flag() {
        let ink = Ink::new(vec![
            stroke(&[(0.0, 0.0), (1.0, 1.0)]),
            stroke(&[(5.0, 0.0), (6.0, 1.0), (7.0, 0.0)]),
        ])
        .expect("ink");
        let moved = ink.apply(&Transform::translation(2.0, -1.0));
        assert_eq!(moved.n_strokes(), 2);
        assert_eq!(moved.strokes()[1].n_points(), 3);
        assert!(moved.is_clean());
        assert_relative_eq!(moved.strokes()[0].points()[0].x, 2.0);
        assert_relative_eq!(moved.strokes()[0].points()[0].y, -1.0);
        // A fresh identity for the new instance.
        assert_ne!(moved.id(), ink.id());
    }

    #[test]
    fn extrema_concatenate_per_stroke() {
        let ink = Ink::new(vec![
            stroke(&[(0.0, 0.0), (1.0, 2.0), (2.0, 0.0)]),
            stroke(&[(4.0, 1.0), (5.0, -1.0), (6.0, 1.0)]),
        ])
        .expect("ink");
        let (minima, maxima) = ink.extrema();
        assert_eq!(maxima, vec![2.0, 1.0, 1.0]);
        assert_eq!(minima, vec![0.0, 0.0, -1.0]);
    }
}
