//! Errors raised while building or combining time-dependent arrays.
//!
//! Everything here is a caller-input problem, reported at the point of
//! violation: during construction or at the offending algebraic call, never
//! during evaluation.

use thiserror::Error;
use crate::dtype::DType;

/// Shorthand for results carrying an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The construction dispatcher received a value matching none of the
    /// accepted input shapes.
    #[error(
        "time-dependent array input must be one of: an array; a 2-tuple \
        (function, array); a 3-tuple (times, values, array); a function \
        `(t: f64) -> array`; but got {0}"
    )]
    UnsupportedInput(String),

    /// PWC breakpoints are not 1D, strictly increasing, or too few.
    #[error("argument `{arg}` must be {reason}")]
    MalformedTimes { arg: &'static str, reason: String },

    /// An argument does not have the required shape.
    #[error("argument `{arg}` must have shape {expected}, but has shape {actual:?}")]
    ShapeMismatch { arg: &'static str, expected: String, actual: Vec<usize> },

    /// A modulating function slot was filled by something else.
    #[error("argument `{arg}` must be a function, but is {found}")]
    NotCallable { arg: &'static str, found: String },

    /// A user function returned something other than a native array.
    #[error(
        "the provided function must return a native array, to avoid costly \
        conversion at each solver step, but returned {0}"
    )]
    UnexpectedReturnType(String),

    /// A value does not have (or cannot be cast to) the required dtype.
    #[error("expected dtype {expected}, but got dtype `{actual}`")]
    DTypeMismatch { expected: String, actual: DType },

    /// Two shapes cannot be broadcast together.
    #[error("shapes {lhs:?} and {rhs:?} cannot be broadcast together")]
    Broadcast { lhs: Vec<usize>, rhs: Vec<usize> },

    /// An algebraic combinator has no rule for this variant pair.
    #[error("unsupported operation: {lhs} {op} {rhs}")]
    UnsupportedOperation {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error(transparent)]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error(transparent)]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),
}

impl Error {
    pub(crate) fn not_square(arg: &'static str, actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            arg,
            expected: "(n, n) (a square matrix)".into(),
            actual: actual.to_vec(),
        }
    }

    pub(crate) fn broadcast(lhs: &[usize], rhs: &[usize]) -> Self {
        Self::Broadcast { lhs: lhs.to_vec(), rhs: rhs.to_vec() }
    }

    /// Return `true` for the shape-mismatch family (including non-square
    /// matrices).
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }

    /// Return `true` if the error comes from an algebraic combination with no
    /// defined rule.
    pub fn is_unsupported_operation(&self) -> bool {
        matches!(self, Self::UnsupportedOperation { .. })
    }
}
