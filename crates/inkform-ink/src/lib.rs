//! Stroke and ink aggregation plus the 15-channel per-sample feature
//! extraction consumed by a downstream sequence classifier.
//!
//! An [`Ink`] is one written unit (a word, usually) built from raw captured
//! strokes. Construction cleans the input once (gapless strokes are merged,
//! adjacent duplicate points removed) and every later transform yields a new
//! `Ink` with the clean invariant intact. Derived geometric quantities are
//! computed at most once per instance.

mod features;
mod ink;
mod stroke;

pub use features::{FeatureSet, FEATURE_NAMES};
pub use ink::{Ink, InkId};
pub use stroke::{points_eq, BoundingBox, Point, Stroke, POINT_EPS};
