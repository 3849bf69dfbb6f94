//! Time-dependent (possibly batched) coefficients weighting the base matrices
//! of a composite time array.

use std::{ fmt, sync::Arc };
use ndarray as nd;
use crate::{
    dtype::Elem,
    error::{ Error, Result },
    nd_utils::{ self, try_broadcast_shape },
    time_array::{ ArrayFn, fixed_shape },
};

/// Basic requirements for a time-dependent coefficient.
///
/// The value at time `t` has shape [`Self::shape`] (the batch shape), and must
/// depend only on `t` and on the state fixed at construction.
pub trait Factor<T>: Clone + fmt::Debug + Send + Sync
where T: Elem
{
    /// Batch shape of the values.
    fn shape(&self) -> &[usize];

    /// Evaluate at a given time.
    fn call(&self, t: f64) -> nd::CowArray<'_, T, nd::IxDyn>;

    /// Complex conjugate of every value.
    fn conj(&self) -> Self;

    /// Give the values a new batch shape with the same number of elements.
    fn reshape(&self, shape: &[usize]) -> Result<Self>;

    /// Repeat the values out to a batch shape that the current one
    /// broadcasts into.
    fn broadcast(&self, shape: &[usize]) -> Result<Self>;

    /// Multiply every value by `y`, whose shape is broadcast together with
    /// the batch shape.
    fn scale(&self, y: &nd::ArrayD<T>) -> Result<Self>;

    /// Times at which the value may jump, if known.
    fn breakpoints(&self) -> Option<&[f64]> { None }
}

/// Piecewise-constant coefficient.
///
/// Holds `nv + 1` strictly increasing breakpoints and `nv` values, one per
/// half-open interval `[times[k], times[k + 1])`. Outside
/// `[times[0], times[nv])` the value is zero; in particular the value *at*
/// `times[nv]` is zero.
#[derive(Clone, Debug)]
pub struct PwcFactor<T>
where T: Elem
{
    times: Arc<[f64]>,
    // (nv, ...)
    values: nd::ArrayD<T>,
}

impl<T> PwcFactor<T>
where T: Elem
{
    /// Create a new `PwcFactor`.
    ///
    /// `values` has shape `(nv, ...)` with `nv = times.len() - 1`; callers are
    /// responsible for the breakpoint checks in
    /// [`totime`][crate::time_array::totime].
    pub(crate) fn new(times: Arc<[f64]>, values: nd::ArrayD<T>) -> Self {
        Self { times, values }
    }

    /// Breakpoints.
    pub fn times(&self) -> &[f64] { &self.times }

    /// Values, with intervals along the leading axis.
    pub fn values(&self) -> &nd::ArrayD<T> { &self.values }

    /// Number of intervals.
    pub fn nv(&self) -> usize { self.times.len() - 1 }

    // find the `k` such that `times[k] <= t < times[k + 1]`
    fn interval(&self, t: f64) -> Option<usize> {
        let last = self.times[self.times.len() - 1];
        (t >= self.times[0] && t < last)
            .then(|| self.times.partition_point(|&tk| tk <= t) - 1)
    }
}

impl<T> Factor<T> for PwcFactor<T>
where T: Elem
{
    fn shape(&self) -> &[usize] { &self.values.shape()[1..] }

    fn call(&self, t: f64) -> nd::CowArray<'_, T, nd::IxDyn> {
        match self.interval(t) {
            Some(k) => self.values.index_axis(nd::Axis(0), k).into(),
            None => nd::ArrayD::zeros(self.shape()).into(),
        }
    }

    fn conj(&self) -> Self {
        Self { times: self.times.clone(), values: self.values.mapv(T::conj) }
    }

    fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let full: Vec<usize>
            = [self.nv()].into_iter().chain(shape.iter().copied()).collect();
        let values = nd_utils::reshape(self.values.clone(), &full)?;
        Ok(Self { times: self.times.clone(), values })
    }

    fn broadcast(&self, shape: &[usize]) -> Result<Self> {
        if self.shape() == shape { return Ok(self.clone()); }
        let cur = self.shape();
        let err = || Error::broadcast(cur, shape);
        // pad with unit axes behind the interval axis so that batch axes
        // line up from the right
        let pad = shape.len().checked_sub(cur.len()).ok_or_else(err)?;
        let padded: Vec<usize>
            = [self.nv()].into_iter()
            .chain(std::iter::repeat(1).take(pad))
            .chain(cur.iter().copied())
            .collect();
        let full: Vec<usize>
            = [self.nv()].into_iter().chain(shape.iter().copied()).collect();
        let values
            = nd_utils::reshape(self.values.clone(), &padded)?
            .broadcast(full.as_slice())
            .ok_or_else(err)?
            .to_owned();
        Ok(Self { times: self.times.clone(), values })
    }

    fn scale(&self, y: &nd::ArrayD<T>) -> Result<Self> {
        let shape = try_broadcast_shape(self.shape(), y.shape())?;
        let x = self.broadcast(&shape)?;
        let values = &x.values * y;
        Ok(Self { times: x.times, values })
    }

    fn breakpoints(&self) -> Option<&[f64]> { Some(&self.times[..]) }
}

/// Coefficient given by an arbitrary function of time.
///
/// `f0 = f(0.0)` is computed once and fixes the shape of every later value.
#[derive(Clone)]
pub struct ModulatedFactor<T>
where T: Elem
{
    f: ArrayFn<T>,
    f0: nd::ArrayD<T>,
}

impl<T> fmt::Debug for ModulatedFactor<T>
where T: Elem
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModulatedFactor {{ f: Arc<...>, f0: {:?} }}", self.f0)
    }
}

impl<T> ModulatedFactor<T>
where T: Elem
{
    /// Create a new `ModulatedFactor`.
    pub(crate) fn new(f: ArrayFn<T>, f0: nd::ArrayD<T>) -> Self {
        Self { f, f0 }
    }

    /// Value at `t = 0`.
    pub fn f0(&self) -> &nd::ArrayD<T> { &self.f0 }
}

impl<T> Factor<T> for ModulatedFactor<T>
where T: Elem
{
    fn shape(&self) -> &[usize] { self.f0.shape() }

    /// *Panics* if the function's output no longer has as many elements as
    /// `f(0.0)`.
    fn call(&self, t: f64) -> nd::CowArray<'_, T, nd::IxDyn> {
        fixed_shape((self.f)(t), self.f0.shape(), "modulated factor").into()
    }

    fn conj(&self) -> Self {
        let f = self.f.clone();
        Self {
            f: Arc::new(move |t| {
                let mut a = f(t);
                a.mapv_inplace(T::conj);
                a
            }),
            f0: self.f0.mapv(T::conj),
        }
    }

    fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let f0 = nd_utils::reshape(self.f0.clone(), shape)?;
        Ok(Self { f: self.f.clone(), f0 })
    }

    fn broadcast(&self, shape: &[usize]) -> Result<Self> {
        if self.shape() == shape { return Ok(self.clone()); }
        let f0
            = self.f0.broadcast(shape)
            .ok_or_else(|| Error::broadcast(self.f0.shape(), shape))?
            .to_owned();
        let f = self.f.clone();
        let inner = self.f0.shape().to_vec();
        let outer = shape.to_vec();
        Ok(Self {
            f: Arc::new(move |t| {
                fixed_shape(f(t), &inner, "modulated factor")
                    .broadcast(outer.as_slice())
                    .expect("ModulatedFactor::broadcast: error broadcasting array")
                    .to_owned()
            }),
            f0,
        })
    }

    fn scale(&self, y: &nd::ArrayD<T>) -> Result<Self> {
        try_broadcast_shape(self.shape(), y.shape())?;
        let f0 = &self.f0 * y;
        let f = self.f.clone();
        let inner = self.f0.shape().to_vec();
        let y = y.clone();
        Ok(Self {
            f: Arc::new(move |t| &fixed_shape(f(t), &inner, "modulated factor") * &y),
            f0,
        })
    }
}
