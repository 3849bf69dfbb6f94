//! Sums of factor-weighted base matrices on top of a static residual.
//!
//! A composite evaluates to
//! ```text
//! A(t) = Σ_i c_i(t) M_i + R
//! ```
//! where the `c_i` are [`Factor`]s with mutually broadcastable batch shapes,
//! the `M_i` are `n × n` base matrices, and `R` is the residual. All factors
//! are evaluated into one weight matrix so that the sum is a single product
//! with the stacked base matrices.

use std::sync::Arc;
use itertools::Itertools;
use ndarray as nd;
use crate::{
    dtype::Elem,
    error::{ Error, Result },
    nd_utils::{ self, add_broadcast, mul_broadcast, try_broadcast_shape },
    time_array::factor::{ Factor, ModulatedFactor, PwcFactor },
};

/// Composite driven by piecewise-constant factors.
pub type PwcArray<T> = FactorArray<T, PwcFactor<T>>;

/// Composite driven by modulating functions.
pub type ModulatedArray<T> = FactorArray<T, ModulatedFactor<T>>;

/// A sum of factor-weighted base matrices plus a static residual.
#[derive(Clone, Debug)]
pub struct FactorArray<T, F>
where
    T: Elem,
    F: Factor<T>,
{
    factors: Vec<F>,
    // (nf, n, n), standard layout
    arrays: nd::Array3<T>,
    residual: nd::ArrayD<T>,
    // broadcast of all factor shapes
    batch: Vec<usize>,
    shape: Vec<usize>,
    times: Option<Arc<[f64]>>,
}

impl<T, F> FactorArray<T, F>
where
    T: Elem,
    F: Factor<T>,
{
    /// Create a new `FactorArray`.
    ///
    /// `arrays` must have shape `(nf, n, n)` with `nf = factors.len() > 0`.
    /// The residual defaults to the `n × n` zero matrix.
    pub fn new(
        factors: Vec<F>,
        arrays: nd::Array3<T>,
        residual: Option<nd::ArrayD<T>>,
    ) -> Result<Self>
    {
        let (nf, n, m) = arrays.dim();
        if factors.is_empty() || nf != factors.len() {
            return Err(Error::ShapeMismatch {
                arg: "array",
                expected: format!("({}, n, n), one matrix per factor", factors.len().max(1)),
                actual: arrays.shape().to_vec(),
            });
        }
        if n != m { return Err(Error::not_square("array", &[n, m])); }

        let batch: Vec<usize>
            = factors.iter()
            .try_fold(Vec::new(), |acc, f| try_broadcast_shape(&acc, f.shape()))?;
        let residual
            = residual.unwrap_or_else(|| nd::ArrayD::zeros(nd::IxDyn(&[n, n])));
        let full: Vec<usize>
            = batch.iter().copied().chain([n, n]).collect();
        let shape = try_broadcast_shape(&full, residual.shape())?;
        let times = merge_breakpoints::<T, F>(&factors);
        let arrays = arrays.as_standard_layout().into_owned();
        Ok(Self { factors, arrays, residual, batch, shape, times })
    }

    pub fn shape(&self) -> &[usize] { &self.shape }

    /// Matrix dimension `n`.
    pub fn n(&self) -> usize { self.arrays.dim().1 }

    pub fn factors(&self) -> &[F] { &self.factors }

    pub fn nfactors(&self) -> usize { self.factors.len() }

    /// Base matrices, stacked along the leading axis.
    pub fn arrays(&self) -> &nd::Array3<T> { &self.arrays }

    /// Static residual.
    pub fn residual(&self) -> &nd::ArrayD<T> { &self.residual }

    /// Sorted, deduplicated union of every factor's breakpoints, if all
    /// factors have them.
    pub fn times(&self) -> Option<&[f64]> { self.times.as_deref() }

    pub fn call(&self, t: f64) -> nd::ArrayD<T> {
        let nf = self.factors.len();
        let n = self.n();
        let nb: usize = self.batch.iter().product();
        let mut W: nd::Array2<T> = nd::Array2::zeros((nb, nf));
        for (mut w, factor) in W.columns_mut().into_iter().zip(&self.factors) {
            let c = factor.call(t);
            let c = c.broadcast(self.batch.as_slice())
                .expect("FactorArray::call: error broadcasting factor");
            w.iter_mut().zip(c.iter()).for_each(|(wk, ck)| { *wk = *ck; });
        }
        let M = self.arrays.view().into_shape((nf, n * n))
            .expect("FactorArray::call: error reshaping array");
        let full: Vec<usize>
            = self.batch.iter().copied().chain([n, n]).collect();
        let S = W.dot(&M).into_shape(full)
            .expect("FactorArray::call: error reshaping array");
        &S + &self.residual
    }

    /// Reshape to `shape`, whose trailing two axes must be `(n, n)` and whose
    /// size must match the current one.
    ///
    /// Single-element factors stay single elements; every other factor is
    /// first broadcast to the full batch shape.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let n = self.n();
        let k = shape.len();
        let size: usize = shape.iter().product();
        if k < 2 || shape[k - 2..] != [n, n]
            || size != self.shape.iter().product::<usize>()
        {
            return Err(Error::ShapeMismatch {
                arg: "shape",
                expected: format!(
                    "(..., {}, {}) with as many elements as {:?}",
                    n, n, self.shape,
                ),
                actual: shape.to_vec(),
            });
        }
        let batch = &shape[..k - 2];
        let factors: Vec<F>
            = self.factors.iter()
            .map(|f| {
                if f.shape().iter().product::<usize>() == 1 {
                    f.reshape(&vec![1; batch.len()])
                } else {
                    f.broadcast(&self.batch)?.reshape(batch)
                }
            })
            .collect::<Result<_>>()?;
        let residual
            = if self.residual.shape() == [n, n] {
                self.residual.clone()
            } else {
                let full = self.residual.broadcast(self.shape.as_slice())
                    .ok_or_else(|| Error::broadcast(self.residual.shape(), &self.shape))?
                    .to_owned();
                nd_utils::reshape(full, shape)?
            };
        Self::new(factors, self.arrays.clone(), Some(residual))
    }

    pub fn mT(&self) -> Self {
        let n = self.n();
        let arrays
            = self.arrays.clone()
            .permuted_axes([0, 2, 1])
            .as_standard_layout()
            .into_owned();
        // a residual of fewer than two axes broadcasts along rows, so it has
        // to be expanded before the transpose
        let residual
            = if self.residual.ndim() < 2 {
                self.residual.broadcast(nd::IxDyn(&[n, n]))
                    .map(|r| r.to_owned())
                    .unwrap_or_else(|| self.residual.clone())
            } else {
                self.residual.clone()
            };
        Self {
            arrays,
            residual: nd_utils::transpose_last_two(residual),
            ..self.clone()
        }
    }

    pub fn conj(&self) -> Self {
        Self {
            factors: self.factors.iter().map(F::conj).collect(),
            arrays: self.arrays.mapv(T::conj),
            residual: self.residual.mapv(T::conj),
            ..self.clone()
        }
    }

    pub fn neg(&self) -> Self {
        Self {
            arrays: self.arrays.mapv(|x| -x),
            residual: self.residual.mapv(|x| -x),
            ..self.clone()
        }
    }

    /// Multiply elementwise by `y`.
    ///
    /// If `y` broadcasts into a single `n × n` matrix, it scales every base
    /// matrix. Otherwise its trailing two axes must both be 1, and its batch
    /// part scales every factor instead. Any other `y` is rejected with
    /// [`Error::Broadcast`].
    pub fn scale(&self, y: &nd::ArrayD<T>) -> Result<Self> {
        let n = self.n();
        let k = y.ndim();
        let residual = mul_broadcast(&self.residual, y)?;
        if let Some(y2) = y.broadcast((n, n)) {
            let shape = try_broadcast_shape(&self.shape, y.shape())?;
            return Ok(Self {
                arrays: &self.arrays * &y2,
                residual,
                shape,
                ..self.clone()
            });
        }
        if k <= 2 || y.shape()[k - 2..] != [1, 1] {
            return Err(Error::broadcast(&[n, n], y.shape()));
        }
        let yb = nd_utils::reshape(y.clone(), &y.shape()[..k - 2])?;
        let factors: Vec<F>
            = self.factors.iter()
            .map(|f| f.scale(&yb))
            .collect::<Result<_>>()?;
        Self::new(factors, self.arrays.clone(), Some(residual))
    }

    /// Absorb an array into the residual.
    pub fn add_array(&self, y: &nd::ArrayD<T>) -> Result<Self> {
        let residual = add_broadcast(&self.residual, y)?;
        let shape = try_broadcast_shape(&self.shape, y.shape())?;
        Ok(Self { residual, shape, ..self.clone() })
    }

    /// Concatenate factor lists and base matrices, and sum residuals.
    pub fn add_same(&self, other: &Self) -> Result<Self> {
        if self.n() != other.n() {
            return Err(Error::broadcast(&self.shape, &other.shape));
        }
        let factors: Vec<F>
            = self.factors.iter().chain(&other.factors).cloned().collect();
        let arrays
            = nd::concatenate(nd::Axis(0), &[self.arrays.view(), other.arrays.view()])
            .map_err(|_| Error::broadcast(&self.shape, &other.shape))?;
        let residual = add_broadcast(&self.residual, &other.residual)?;
        Self::new(factors, arrays, Some(residual))
    }
}

fn merge_breakpoints<T, F>(factors: &[F]) -> Option<Arc<[f64]>>
where
    T: Elem,
    F: Factor<T>,
{
    let all: Vec<&[f64]>
        = factors.iter()
        .map(|f| f.breakpoints())
        .collect::<Option<_>>()?;
    let merged: Vec<f64>
        = all.into_iter()
        .flatten()
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .dedup()
        .collect();
    Some(merged.into())
}

#[cfg(test)]
mod test {
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64 as C64;
    use crate::time_array::ArrayFn;
    use super::*;

    fn c(re: f64) -> C64 { C64::new(re, 0.0) }

    fn sx() -> nd::Array2<C64> {
        nd::array![[c(0.0), c(1.0)], [c(1.0), c(0.0)]]
    }

    fn sy() -> nd::Array2<C64> {
        nd::array![[c(0.0), C64::new(0.0, -1.0)], [C64::new(0.0, 1.0), c(0.0)]]
    }

    fn pwc(times: Vec<f64>, values: Vec<f64>, M: nd::Array2<C64>)
        -> PwcArray<C64>
    {
        let values = nd::Array1::from(values).mapv(c).into_dyn();
        let factor = PwcFactor::new(times.into(), values);
        FactorArray::new(vec![factor], M.insert_axis(nd::Axis(0)), None)
            .unwrap()
    }

    fn max_diff(a: &nd::ArrayD<C64>, b: &nd::ArrayD<C64>) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).norm()).fold(0.0, f64::max)
    }

    #[test]
    fn pwc_boundaries() {
        let x = pwc(vec![0.0, 1.0, 2.0], vec![2.0, 3.0], sx());
        let zero = nd::ArrayD::<C64>::zeros(nd::IxDyn(&[2, 2]));
        assert_eq!(x.call(-0.1), zero);
        assert_eq!(x.call(0.0), sx().mapv(|z| z * 2.0).into_dyn());
        assert_eq!(x.call(0.999), sx().mapv(|z| z * 2.0).into_dyn());
        assert_eq!(x.call(1.0), sx().mapv(|z| z * 3.0).into_dyn());
        assert_eq!(x.call(2.0), zero);
    }

    #[test]
    fn same_kind_addition_concatenates() {
        let x = pwc(vec![0.0, 1.0, 2.0], vec![1.0, 2.0], sx());
        let y = pwc(vec![0.5, 1.0, 3.0], vec![4.0, 5.0], sy());
        let z = x.add_same(&y).unwrap();
        assert_eq!(z.nfactors(), 2);
        assert_eq!(z.times(), Some(&[0.0, 0.5, 1.0, 2.0, 3.0][..]));
        for t in [-1.0, 0.0, 0.7, 1.0, 1.5, 2.5, 3.0] {
            let expected = &x.call(t) + &y.call(t);
            assert_abs_diff_eq!(max_diff(&z.call(t), &expected), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn array_is_absorbed() {
        let x = pwc(vec![0.0, 1.0], vec![1.0], sx());
        let y = x.add_array(&sy().into_dyn()).unwrap();
        assert_eq!(y.nfactors(), 1);
        assert_eq!(y.call(0.5), (sx() + sy()).into_dyn());
        assert_eq!(y.call(5.0), sy().into_dyn());
    }

    #[test]
    fn batched_factor() {
        let values
            = nd::array![[c(1.0), c(2.0), c(3.0)]].into_dyn();
        let factor = PwcFactor::new(vec![0.0, 1.0].into(), values);
        let x = FactorArray::new(
            vec![factor], sx().insert_axis(nd::Axis(0)), None).unwrap();
        assert_eq!(x.shape(), &[3, 2, 2]);
        let a = x.call(0.5);
        assert_eq!(a.shape(), &[3, 2, 2]);
        assert_eq!(a[[2, 0, 1]], c(3.0));
        let r = x.reshape(&[3, 1, 2, 2]).unwrap();
        assert_eq!(r.call(0.5).shape(), &[3, 1, 2, 2]);
        assert!(x.reshape(&[3, 4]).is_err());
        assert!(x.reshape(&[2, 2, 2]).is_err());
        assert!(x.reshape(&[3, 2, 2, 2]).is_err());
    }

    #[test]
    fn reshape_broadcast_factors() {
        let row = PwcFactor::new(
            vec![0.0, 1.0].into(), nd::array![[c(1.0), c(2.0)]].into_dyn());
        let col = PwcFactor::new(
            vec![0.0, 2.0].into(), nd::array![[[c(10.0)], [c(20.0)], [c(30.0)]]].into_dyn());
        let x = FactorArray::new(
            vec![row], sx().insert_axis(nd::Axis(0)), None).unwrap();
        let y = FactorArray::new(
            vec![col], sy().insert_axis(nd::Axis(0)), None).unwrap();
        let z = x.add_same(&y).unwrap();
        assert_eq!(z.shape(), &[3, 2, 2, 2]);

        let same = z.reshape(&[3, 2, 2, 2]).unwrap();
        let flat = z.reshape(&[6, 2, 2]).unwrap();
        assert_eq!(flat.shape(), &[6, 2, 2]);
        for t in [0.5, 1.5, 2.5] {
            let expected = z.call(t);
            assert_abs_diff_eq!(max_diff(&same.call(t), &expected), 0.0, epsilon = 1e-12);
            let expected = nd_utils::reshape(expected, &[6, 2, 2]).unwrap();
            assert_abs_diff_eq!(max_diff(&flat.call(t), &expected), 0.0, epsilon = 1e-12);
        }
        assert!(z.reshape(&[12, 2, 2]).is_err());
    }

    #[test]
    fn transpose_conj_neg() {
        let x = pwc(vec![0.0, 1.0], vec![1.0], sy())
            .add_array(&nd::array![c(1.0), c(2.0)].into_dyn())
            .unwrap();
        let xt = x.mT();
        let a = x.call(0.5);
        let at = xt.call(0.5);
        assert_abs_diff_eq!(max_diff(&at, &a.t().to_owned()), 0.0, epsilon = 1e-12);
        let xc = x.conj().conj().neg().neg();
        assert_abs_diff_eq!(max_diff(&xc.call(0.5), &a), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn scale_must_fit_matrix() {
        let x = pwc(vec![0.0, 1.0], vec![1.0], sx());
        let y = x.scale(&nd::arr0(c(2.0)).into_dyn()).unwrap();
        assert_eq!(y.call(0.5), sx().mapv(|z| z * 2.0).into_dyn());
        let batch = nd::ArrayD::from_elem(nd::IxDyn(&[3, 2, 2]), c(1.0));
        assert!(x.scale(&batch).is_err());
    }

    #[test]
    fn scale_batch_moves_into_factors() {
        let x = pwc(vec![0.0, 1.0], vec![1.0], sx())
            .add_array(&sy().into_dyn())
            .unwrap();
        let y = nd::array![[[c(1.0)]], [[c(2.0)]], [[c(-3.0)]]].into_dyn();
        let z = x.scale(&y).unwrap();
        assert_eq!(z.shape(), &[3, 2, 2]);
        assert_eq!(z.nfactors(), 1);
        for t in [0.5, 2.0] {
            let expected = &x.call(t) * &y;
            assert_abs_diff_eq!(max_diff(&z.call(t), &expected), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn modulated_weights() {
        let f: ArrayFn<C64>
            = Arc::new(|t: f64| nd::arr0(C64::new(t.cos(), t.sin())).into_dyn());
        let f0 = f(0.0);
        let x: ModulatedArray<C64> = FactorArray::new(
            vec![ModulatedFactor::new(f, f0)],
            sx().insert_axis(nd::Axis(0)),
            None,
        ).unwrap();
        assert!(x.times().is_none());
        let t: f64 = 0.3;
        let expected = sx().mapv(|z| z * C64::new(t.cos(), t.sin())).into_dyn();
        assert_abs_diff_eq!(max_diff(&x.call(t), &expected), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn construction_checks() {
        let factor = PwcFactor::new(
            vec![0.0, 1.0].into(), nd::array![c(1.0)].into_dyn());
        let none: Vec<PwcFactor<C64>> = Vec::new();
        assert!(FactorArray::new(none, sx().insert_axis(nd::Axis(0)), None).is_err());
        let two = nd::Array3::<C64>::zeros((2, 2, 2));
        assert!(FactorArray::new(vec![factor.clone()], two, None).is_err());
        let rect = nd::Array3::<C64>::zeros((1, 2, 3));
        assert!(FactorArray::new(vec![factor], rect, None).unwrap_err().is_shape_mismatch());
    }
}
