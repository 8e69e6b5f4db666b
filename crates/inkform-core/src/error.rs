use thiserror::Error;

/// Errors surfaced by the geometry core.
///
/// Recoverable numerical degeneracies (ill-conditioned spline or line fits)
/// are *not* represented here; those degrade to documented fallbacks and emit
/// a `log::warn!` diagnostic instead. Only precondition violations and
/// directly-requested operations that the caller must observe fail with an
/// error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeomError {
    /// Curve fitting and ink aggregation require at least one point.
    #[error("stroke contains no points")]
    EmptyStroke,

    /// A coordinate array had the wrong shape.
    #[error("wrong array shape (expected {expected} rows, got {got})")]
    WrongShape { expected: usize, got: usize },

    /// Requested inverse of a non-invertible transformation.
    #[error("transformation is singular and cannot be inverted")]
    SingularTransform,

    /// A least-squares system could not be solved.
    #[error("least-squares system is singular or ill-conditioned")]
    SingularSystem,
}
