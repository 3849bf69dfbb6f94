//! Lazy, immutable representations of time-dependent (possibly batched)
//! matrices.
//!
//! A [`TimeArray`] is one of four variants:
//! - [`Constant`][TimeArray::Constant]: a fixed array;
//! - [`Callable`][TimeArray::Callable]: an arbitrary function of time;
//! - [`Pwc`][TimeArray::Pwc]: a sum of piecewise-constant coefficients times
//!   fixed matrices;
//! - [`Modulated`][TimeArray::Modulated]: a sum of function-valued
//!   coefficients times fixed matrices.
//!
//! All variants share one algebra (evaluation, reshaping, transposition,
//! conjugation, negation, scaling, addition), and every operation returns a new
//! value. Inputs are validated once, when they are built by [`totime`] or
//! combined; evaluation never re-checks them.

use std::{
    fmt,
    ops::{ Add, Mul, Neg, Sub },
    sync::Arc,
};
use ndarray as nd;
use num_complex::{ Complex32 as C32, Complex64 as C64 };
use tracing::trace;
use crate::{
    dtype::{ ArrayLike, DType, Elem },
    error::{ Error, Result },
    nd_utils,
};

pub mod factor;
pub mod constant;
pub mod callable;
pub mod composite;
pub mod totime;

pub use factor::{ Factor, ModulatedFactor, PwcFactor };
pub use constant::ConstantArray;
pub use callable::CallableArray;
pub use composite::{ FactorArray, ModulatedArray, PwcArray };
pub use totime::{ totime, Input, TimeFn };

/// Internally stored function of time, returning arrays of a fixed element
/// type.
pub type ArrayFn<T> = Arc<dyn Fn(f64) -> nd::ArrayD<T> + Send + Sync>;

/// Reshape the output of a stored function to the shape fixed at construction.
///
/// *Panics* if the output does not have the right number of elements.
pub(crate) fn fixed_shape<T>(a: nd::ArrayD<T>, shape: &[usize], what: &str)
    -> nd::ArrayD<T>
where T: Clone
{
    match nd_utils::reshape(a, shape) {
        Ok(a) => a,
        Err(err) => panic!("{}: function output changed shape: {}", what, err),
    }
}

/// A time-dependent array.
#[derive(Clone, Debug)]
pub enum TimeArray<T>
where T: Elem
{
    Constant(ConstantArray<T>),
    Callable(CallableArray<T>),
    Pwc(PwcArray<T>),
    Modulated(ModulatedArray<T>),
}

impl<T> TimeArray<T>
where T: Elem
{
    pub fn dtype(&self) -> DType { T::DTYPE }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Constant(x) => x.shape(),
            Self::Callable(x) => x.shape(),
            Self::Pwc(x) => x.shape(),
            Self::Modulated(x) => x.shape(),
        }
    }

    pub fn ndim(&self) -> usize { self.shape().len() }

    /// Name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Constant(_) => "ConstantTimeArray",
            Self::Callable(_) => "CallableTimeArray",
            Self::Pwc(_) => "PWCTimeArray",
            Self::Modulated(_) => "ModulatedTimeArray",
        }
    }

    /// Evaluate at time `t`. The result always has shape [`Self::shape`].
    ///
    /// *Panics* if a user function stops honoring the shape or dtype it had at
    /// construction.
    pub fn call(&self, t: f64) -> nd::ArrayD<T> {
        match self {
            Self::Constant(x) => x.call(t),
            Self::Callable(x) => x.call(t),
            Self::Pwc(x) => x.call(t),
            Self::Modulated(x) => x.call(t),
        }
    }

    /// Return a new array of the same variant with the given shape.
    ///
    /// The trailing two axes are the matrix axes and must be left unchanged.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let cur = self.shape();
        let (k, j) = (shape.len(), cur.len());
        if j >= 2 && (k < 2 || shape[k - 2..] != cur[j - 2..]) {
            return Err(Error::ShapeMismatch {
                arg: "shape",
                expected: format!("(..., {}, {})", cur[j - 2], cur[j - 1]),
                actual: shape.to_vec(),
            });
        }
        match self {
            Self::Constant(x) => x.reshape(shape).map(Self::Constant),
            Self::Callable(x) => x.reshape(shape).map(Self::Callable),
            Self::Pwc(x) => x.reshape(shape).map(Self::Pwc),
            Self::Modulated(x) => x.reshape(shape).map(Self::Modulated),
        }
    }

    /// Transpose the last two axes.
    pub fn mT(&self) -> Self {
        match self {
            Self::Constant(x) => Self::Constant(x.mT()),
            Self::Callable(x) => Self::Callable(x.mT()),
            Self::Pwc(x) => Self::Pwc(x.mT()),
            Self::Modulated(x) => Self::Modulated(x.mT()),
        }
    }

    /// Complex-conjugate every stored value.
    pub fn conj(&self) -> Self {
        match self {
            Self::Constant(x) => Self::Constant(x.conj()),
            Self::Callable(x) => Self::Callable(x.conj()),
            Self::Pwc(x) => Self::Pwc(x.conj()),
            Self::Modulated(x) => Self::Modulated(x.conj()),
        }
    }

    pub fn neg(&self) -> Self {
        match self {
            Self::Constant(x) => Self::Constant(x.neg()),
            Self::Callable(x) => Self::Callable(x.neg()),
            Self::Pwc(x) => Self::Pwc(x.neg()),
            Self::Modulated(x) => Self::Modulated(x.neg()),
        }
    }

    /// Multiply elementwise by an array-like, cast to `T`.
    pub fn scale<A>(&self, y: A) -> Result<Self>
    where A: Into<ArrayLike>
    {
        self.scale_array(&T::cast(&y.into())?)
    }

    /// Multiply elementwise by an array.
    ///
    /// Composites take a `y` that broadcasts into a single matrix by scaling
    /// their base matrices. A batched `y` whose trailing two axes are both 1
    /// scales their factors instead. Any other batched `y` is rejected.
    pub fn scale_array(&self, y: &nd::ArrayD<T>) -> Result<Self> {
        trace!(kind = self.kind(), y = ?y.shape(), "scale");
        match self {
            Self::Constant(x) => x.scale(y).map(Self::Constant),
            Self::Callable(x) => x.scale(y).map(Self::Callable),
            Self::Pwc(x) => x.scale(y).map(Self::Pwc),
            Self::Modulated(x) => x.scale(y).map(Self::Modulated),
        }
    }

    /// Multiply by a scalar.
    pub fn scale_by(&self, a: T) -> Self {
        match self.scale_array(&nd::arr0(a).into_dyn()) {
            Ok(x) => x,
            Err(err) => panic!("unexpected scaling error: {}", err),
        }
    }

    /// Add another time array.
    ///
    /// Constants are absorbed by every other variant, callables absorb other
    /// callables, and composites of the same kind are concatenated. If there is
    /// no rule for `self + other`, the reflected `other + self` is tried before
    /// failing with [`Error::UnsupportedOperation`].
    pub fn add(&self, other: &Self) -> Result<Self> {
        trace!(lhs = self.kind(), rhs = other.kind(), "add");
        self.add_forward(other)
            .or_else(|| other.add_forward(self))
            .unwrap_or_else(|| {
                Err(Error::UnsupportedOperation {
                    op: "+",
                    lhs: self.kind(),
                    rhs: other.kind(),
                })
            })
    }

    // `None` when there is no rule for this ordering of the pair
    fn add_forward(&self, other: &Self) -> Option<Result<Self>> {
        use TimeArray::*;
        let res = match (self, other) {
            (Constant(a), Constant(b)) => a.add_array(b.array()).map(Constant),
            (Callable(a), Constant(b)) => a.add_array(b.array()).map(Callable),
            (Callable(a), Callable(b)) => a.add_callable(b).map(Callable),
            (Pwc(a), Constant(b)) => a.add_array(b.array()).map(Pwc),
            (Pwc(a), Pwc(b)) => a.add_same(b).map(Pwc),
            (Modulated(a), Constant(b)) => a.add_array(b.array()).map(Modulated),
            (Modulated(a), Modulated(b)) => a.add_same(b).map(Modulated),
            _ => { return None; },
        };
        Some(res)
    }

    /// Add an array-like, cast to `T`.
    pub fn add_array<A>(&self, y: A) -> Result<Self>
    where A: Into<ArrayLike>
    {
        self.add_cast(&T::cast(&y.into())?)
    }

    fn add_cast(&self, y: &nd::ArrayD<T>) -> Result<Self> {
        trace!(kind = self.kind(), y = ?y.shape(), "add array");
        match self {
            Self::Constant(x) => x.add_array(y).map(Self::Constant),
            Self::Callable(x) => x.add_array(y).map(Self::Callable),
            Self::Pwc(x) => x.add_array(y).map(Self::Pwc),
            Self::Modulated(x) => x.add_array(y).map(Self::Modulated),
        }
    }

    /// `y + self`.
    pub fn radd_array<A>(&self, y: A) -> Result<Self>
    where A: Into<ArrayLike>
    {
        self.add_array(y)
    }

    /// `self - other`.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.add(&other.neg())
    }

    /// `self - y`.
    pub fn sub_array<A>(&self, y: A) -> Result<Self>
    where A: Into<ArrayLike>
    {
        let y: nd::ArrayD<T> = T::cast(&y.into())?;
        self.add_cast(&y.mapv(|x| -x))
    }

    /// `y - self`.
    pub fn rsub_array<A>(&self, y: A) -> Result<Self>
    where A: Into<ArrayLike>
    {
        self.neg().add_array(y)
    }

    /// Merged breakpoints of a piecewise-constant array.
    pub fn times(&self) -> Option<&[f64]> {
        match self {
            Self::Pwc(x) => x.times(),
            _ => None,
        }
    }

    /// Number of factors of a composite.
    pub fn nfactors(&self) -> Option<usize> {
        match self {
            Self::Pwc(x) => Some(x.nfactors()),
            Self::Modulated(x) => Some(x.nfactors()),
            _ => None,
        }
    }
}

impl<T> fmt::Display for TimeArray<T>
where T: Elem
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(shape={:?}, dtype={})", self.kind(), self.shape(), self.dtype())
    }
}

impl<T> Neg for &TimeArray<T>
where T: Elem
{
    type Output = TimeArray<T>;

    fn neg(self) -> Self::Output { TimeArray::neg(self) }
}

impl<T> Neg for TimeArray<T>
where T: Elem
{
    type Output = TimeArray<T>;

    fn neg(self) -> Self::Output { TimeArray::neg(&self) }
}

impl<'a, T> Add<&'a TimeArray<T>> for &'a TimeArray<T>
where T: Elem
{
    type Output = Result<TimeArray<T>>;

    fn add(self, rhs: &'a TimeArray<T>) -> Self::Output { TimeArray::add(self, rhs) }
}

impl<'a, T> Sub<&'a TimeArray<T>> for &'a TimeArray<T>
where T: Elem
{
    type Output = Result<TimeArray<T>>;

    fn sub(self, rhs: &'a TimeArray<T>) -> Self::Output { TimeArray::sub(self, rhs) }
}

impl<T> Mul<T> for &TimeArray<T>
where T: Elem
{
    type Output = TimeArray<T>;

    fn mul(self, a: T) -> Self::Output { self.scale_by(a) }
}

macro_rules! impl_scalar_lmul {
    ( $( $t:ty ),* ) => {
        $(
            impl Mul<&TimeArray<$t>> for $t {
                type Output = TimeArray<$t>;

                fn mul(self, rhs: &TimeArray<$t>) -> Self::Output {
                    rhs.scale_by(self)
                }
            }
        )*
    }
}
impl_scalar_lmul!(f32, f64, C32, C64);
