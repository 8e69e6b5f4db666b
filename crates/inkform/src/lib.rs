//! Pen-stroke geometry pipeline: ink aggregation, normalization and
//! feature extraction.
//!
//! The pipeline turns raw, noisy stylus samples into a normalized curve
//! representation and a fixed 15-channel per-sample feature matrix for a
//! downstream sequence classifier. It is a pure batch transform: construct
//! an [`Ink`] from captured strokes, normalize it, extract features.
//!
//! ## Quickstart
//!
//! ```
//! use inkform::{apply_normalizations, Ink, Point, Stroke};
//!
//! let stroke = Stroke::new(vec![
//!     Point::new(0.0, 0.0),
//!     Point::new(1.0, 1.0),
//!     Point::new(2.0, 0.0),
//!     Point::new(3.0, 1.0),
//! ])?;
//! let ink = Ink::new(vec![stroke])?;
//!
//! let normalized = apply_normalizations(&ink);
//! let features = normalized.feature_matrix()?;
//! assert_eq!(features.ncols(), 15);
//! # Ok::<(), inkform::GeomError>(())
//! ```
//!
//! Input coordinates are expected in the capture surface's space with "up"
//! already positive; flipping y is the caller's responsibility.

mod normalize;

pub use normalize::{
    apply_normalizations, find_intersections, normalized_baseline, normalized_left,
    normalized_skew_and_mean, normalized_width,
};

pub use inkform_core::{
    init_with_level, numeric, CubicSpline, GeomError, StrokeSpline, Transform, DOTS_PER_UNIT,
};
pub use inkform_ink::{
    points_eq, BoundingBox, FeatureSet, Ink, InkId, Point, Stroke, FEATURE_NAMES, POINT_EPS,
};

#[cfg(feature = "tracing")]
pub use inkform_core::init_tracing;
