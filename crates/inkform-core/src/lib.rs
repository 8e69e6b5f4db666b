//! Numeric utilities, curve fitting and affine transforms for pen-stroke
//! geometry.
//!
//! This crate is intentionally small and purely geometric. It knows nothing
//! about strokes or ink units; it provides the dense-array helpers, the
//! parametric cubic spline and the 2D affine `Transform` the higher layers
//! are built from.

mod error;
mod logger;
pub mod numeric;
mod spline;
mod transform;

pub use error::GeomError;
pub use spline::{CubicSpline, StrokeSpline, DOTS_PER_UNIT};
pub use transform::Transform;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
