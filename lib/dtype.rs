//! Element types and the dynamically-typed array-like input.
//!
//! Storage inside a [`TimeArray`][crate::time_array::TimeArray] is statically
//! typed by an [`Elem`]; user input arrives as an [`ArrayLike`], whose dtype is
//! only known at runtime and is checked/cast exactly once, at construction.

use std::{ fmt, ops::Neg };
use ndarray as nd;
use num_complex::{ Complex32 as C32, Complex64 as C64 };
use crate::{
    convert,
    error::{ Error, Result },
};

/// Runtime name of an element type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Float32,
    Float64,
    /// Single-precision complex (two `f32`s).
    Complex64,
    /// Double-precision complex (two `f64`s).
    Complex128,
}

impl DType {
    /// Return `true` for the complex dtypes.
    pub fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// Map a complex dtype to its real counterpart; real dtypes map to
    /// themselves.
    pub fn to_real(self) -> Self {
        match self {
            Self::Complex64 => Self::Float32,
            Self::Complex128 => Self::Float64,
            real => real,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float32 => write!(f, "float32"),
            Self::Float64 => write!(f, "float64"),
            Self::Complex64 => write!(f, "complex64"),
            Self::Complex128 => write!(f, "complex128"),
        }
    }
}

/// An array-like value of runtime-determined dtype.
///
/// This is what user-supplied data and user time functions produce. `List`
/// stands in for nested sequences: it is convertible, but is *not* a native
/// array, and time functions returning one are rejected at construction.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayLike {
    Float32(nd::ArrayD<f32>),
    Float64(nd::ArrayD<f64>),
    Complex64(nd::ArrayD<C32>),
    Complex128(nd::ArrayD<C64>),
    List(Vec<ArrayLike>),
}

impl ArrayLike {
    /// Dtype of the contained array, if it is a native array.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Self::Float32(_) => Some(DType::Float32),
            Self::Float64(_) => Some(DType::Float64),
            Self::Complex64(_) => Some(DType::Complex64),
            Self::Complex128(_) => Some(DType::Complex128),
            Self::List(_) => None,
        }
    }

    /// Shape of the contained array, if it is a native array.
    pub fn shape(&self) -> Option<&[usize]> {
        match self {
            Self::Float32(a) => Some(a.shape()),
            Self::Float64(a) => Some(a.shape()),
            Self::Complex64(a) => Some(a.shape()),
            Self::Complex128(a) => Some(a.shape()),
            Self::List(_) => None,
        }
    }

    /// Return `true` if `self` is a native array (not a nested list).
    pub fn is_native(&self) -> bool { !matches!(self, Self::List(_)) }

    /// Human-readable description of the runtime type, for error messages.
    pub fn type_name(&self) -> String {
        if let Self::List(items) = self {
            return format!("a list of length {}", items.len());
        }
        match (self.dtype(), self.shape()) {
            (Some(dtype), Some(shape))
                => format!("an array of dtype `{}` and shape {:?}", dtype, shape),
            _ => "an unknown value".into(),
        }
    }
}

macro_rules! impl_arraylike_from {
    ( $elem:ty, $variant:ident ) => {
        impl<D> From<nd::Array<$elem, D>> for ArrayLike
        where D: nd::Dimension
        {
            fn from(a: nd::Array<$elem, D>) -> Self { Self::$variant(a.into_dyn()) }
        }

        impl From<$elem> for ArrayLike {
            fn from(x: $elem) -> Self { Self::$variant(nd::arr0(x).into_dyn()) }
        }

        impl From<Vec<$elem>> for ArrayLike {
            fn from(v: Vec<$elem>) -> Self {
                Self::$variant(nd::Array1::from(v).into_dyn())
            }
        }
    }
}
impl_arraylike_from!(f32, Float32);
impl_arraylike_from!(f64, Float64);
impl_arraylike_from!(C32, Complex64);
impl_arraylike_from!(C64, Complex128);

impl From<Vec<ArrayLike>> for ArrayLike {
    fn from(items: Vec<ArrayLike>) -> Self { Self::List(items) }
}

/// Element types a time-dependent array can be stored in.
pub trait Elem:
    nd::LinalgScalar
    + nd::ScalarOperand
    + Neg<Output = Self>
    + PartialEq
    + fmt::Debug
    + Send
    + Sync
    + 'static
{
    /// Real counterpart of `Self`; equal to `Self` for real types.
    type Real: Elem;

    /// Runtime name of `Self`.
    const DTYPE: DType;

    /// Complex conjugate; identity for real types.
    fn conj(self) -> Self;

    fn from_f64(x: f64) -> Self;

    /// Convert from a complex value. Only reached for complex `Self`; real
    /// types keep the real part.
    fn from_c64(z: C64) -> Self;

    /// Move out the contained array if it has exactly dtype `Self`, otherwise
    /// hand the input back.
    fn take_native(a: ArrayLike) -> std::result::Result<nd::ArrayD<Self>, ArrayLike>;

    /// Cast any array-like to an array of `Self`.
    ///
    /// Real data can be cast to any dtype; complex data cannot be cast to a
    /// real dtype. Nested lists are stacked along a new leading axis.
    fn cast(a: &ArrayLike) -> Result<nd::ArrayD<Self>> {
        let complex_to_real = || Error::DTypeMismatch {
            expected: format!("`{}`", Self::DTYPE),
            actual: a.dtype().unwrap_or(Self::DTYPE),
        };
        match a {
            ArrayLike::Float32(x) => Ok(x.mapv(|v| Self::from_f64(v as f64))),
            ArrayLike::Float64(x) => Ok(x.mapv(Self::from_f64)),
            ArrayLike::Complex64(x) => {
                if !Self::DTYPE.is_complex() { return Err(complex_to_real()); }
                Ok(x.mapv(|z| Self::from_c64(C64::new(z.re as f64, z.im as f64))))
            },
            ArrayLike::Complex128(x) => {
                if !Self::DTYPE.is_complex() { return Err(complex_to_real()); }
                Ok(x.mapv(Self::from_c64))
            },
            ArrayLike::List(items) => convert::stack_list::<Self>(items),
        }
    }
}

/// Complex element types, on which open-system dynamics is defined.
pub trait ComplexElem: Elem {
    /// The imaginary unit.
    fn i() -> Self;

    /// One half, as an element.
    fn half() -> Self;
}

impl Elem for f32 {
    type Real = f32;
    const DTYPE: DType = DType::Float32;

    fn conj(self) -> Self { self }

    fn from_f64(x: f64) -> Self { x as f32 }

    fn from_c64(z: C64) -> Self { z.re as f32 }

    fn take_native(a: ArrayLike)
        -> std::result::Result<nd::ArrayD<Self>, ArrayLike>
    {
        match a {
            ArrayLike::Float32(x) => Ok(x),
            other => Err(other),
        }
    }
}

impl Elem for f64 {
    type Real = f64;
    const DTYPE: DType = DType::Float64;

    fn conj(self) -> Self { self }

    fn from_f64(x: f64) -> Self { x }

    fn from_c64(z: C64) -> Self { z.re }

    fn take_native(a: ArrayLike)
        -> std::result::Result<nd::ArrayD<Self>, ArrayLike>
    {
        match a {
            ArrayLike::Float64(x) => Ok(x),
            other => Err(other),
        }
    }
}

impl Elem for C32 {
    type Real = f32;
    const DTYPE: DType = DType::Complex64;

    fn conj(self) -> Self { C32::conj(&self) }

    fn from_f64(x: f64) -> Self { C32::new(x as f32, 0.0) }

    fn from_c64(z: C64) -> Self { C32::new(z.re as f32, z.im as f32) }

    fn take_native(a: ArrayLike)
        -> std::result::Result<nd::ArrayD<Self>, ArrayLike>
    {
        match a {
            ArrayLike::Complex64(x) => Ok(x),
            other => Err(other),
        }
    }
}

impl Elem for C64 {
    type Real = f64;
    const DTYPE: DType = DType::Complex128;

    fn conj(self) -> Self { C64::conj(&self) }

    fn from_f64(x: f64) -> Self { C64::new(x, 0.0) }

    fn from_c64(z: C64) -> Self { z }

    fn take_native(a: ArrayLike)
        -> std::result::Result<nd::ArrayD<Self>, ArrayLike>
    {
        match a {
            ArrayLike::Complex128(x) => Ok(x),
            other => Err(other),
        }
    }
}

impl ComplexElem for C32 {
    fn i() -> Self { C32::i() }

    fn half() -> Self { C32::new(0.5, 0.0) }
}

impl ComplexElem for C64 {
    fn i() -> Self { C64::i() }

    fn half() -> Self { C64::new(0.5, 0.0) }
}
