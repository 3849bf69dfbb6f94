#![allow(dead_code, non_snake_case, non_upper_case_globals)]

//! Time-dependent operators and the Lindblad master equation.
//!
//! Operators are built once from loosely typed input by
//! [`totime`][time_array::totime], combined with the [`TimeArray`] algebra,
//! and evaluated at arbitrary times by an external integrator, typically
//! through [`Lindbladian::derivative`].

pub mod error;
pub mod dtype;
pub mod convert;
pub mod nd_utils;
pub mod time_array;
pub mod lindblad;

pub use error::{ Error, Result };
pub use dtype::{ ArrayLike, ComplexElem, DType, Elem };
pub use time_array::{ totime, Input, TimeArray };
pub use lindblad::{ LindbladParams, Lindbladian };
