//! Arrays given by an arbitrary function of time.

use std::{ fmt, sync::Arc };
use ndarray as nd;
use crate::{
    dtype::Elem,
    error::Result,
    nd_utils::{ self, add_broadcast, mul_broadcast },
    time_array::{ ArrayFn, fixed_shape },
};

/// A function of time together with its value at `t = 0`.
///
/// `f0` carries every shape transformation applied so far; evaluation reshapes
/// the function's output to `f0`'s shape. Every combinator wraps `self` in a
/// new function, so the result owns (a shared handle to) everything it needs.
#[derive(Clone)]
pub struct CallableArray<T>
where T: Elem
{
    f: ArrayFn<T>,
    f0: nd::ArrayD<T>,
}

impl<T> fmt::Debug for CallableArray<T>
where T: Elem
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallableArray {{ f: Arc<...>, f0: {:?} }}", self.f0)
    }
}

impl<T> CallableArray<T>
where T: Elem
{
    /// Create a new `CallableArray`.
    ///
    /// `f0` must equal `f(0.0)` up to a reshape.
    pub(crate) fn new(f: ArrayFn<T>, f0: nd::ArrayD<T>) -> Self {
        Self { f, f0 }
    }

    // build a new array evaluating `op` on the output of `self`
    fn map<F>(&self, op: F, f0: nd::ArrayD<T>) -> Self
    where F: Fn(f64, nd::ArrayD<T>) -> nd::ArrayD<T> + Send + Sync + 'static
    {
        let inner = self.clone();
        Self::new(Arc::new(move |t| op(t, inner.call(t))), f0)
    }

    /// Value at `t = 0`.
    pub fn f0(&self) -> &nd::ArrayD<T> { &self.f0 }

    pub fn shape(&self) -> &[usize] { self.f0.shape() }

    /// *Panics* if the function's output no longer has as many elements as
    /// `f(0.0)`.
    pub fn call(&self, t: f64) -> nd::ArrayD<T> {
        fixed_shape((self.f)(t), self.f0.shape(), "callable time array")
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let f0 = nd_utils::reshape(self.f0.clone(), shape)?;
        Ok(Self::new(self.f.clone(), f0))
    }

    pub fn mT(&self) -> Self {
        let f0 = nd_utils::transpose_last_two(self.f0.clone());
        self.map(|_, a| nd_utils::transpose_last_two(a), f0)
    }

    pub fn conj(&self) -> Self {
        self.map(
            |_, mut a| { a.mapv_inplace(T::conj); a },
            self.f0.mapv(T::conj),
        )
    }

    pub fn neg(&self) -> Self {
        self.map(
            |_, mut a| { a.mapv_inplace(|x| -x); a },
            self.f0.mapv(|x| -x),
        )
    }

    pub fn scale(&self, y: &nd::ArrayD<T>) -> Result<Self> {
        let f0 = mul_broadcast(&self.f0, y)?;
        let y = y.clone();
        Ok(self.map(move |_, a| &a * &y, f0))
    }

    pub fn add_array(&self, y: &nd::ArrayD<T>) -> Result<Self> {
        let f0 = add_broadcast(&self.f0, y)?;
        let y = y.clone();
        Ok(self.map(move |_, a| &a + &y, f0))
    }

    pub fn add_callable(&self, other: &Self) -> Result<Self> {
        let f0 = add_broadcast(&self.f0, &other.f0)?;
        let other = other.clone();
        Ok(self.map(move |t, a| &a + &other.call(t), f0))
    }
}
