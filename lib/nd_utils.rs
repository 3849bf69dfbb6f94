//! Shape plumbing and batched linear algebra on dynamic-dimension arrays.
//!
//! Batched arrays follow the usual convention: the trailing two axes are the
//! matrix axes and everything in front of them is a batch, broadcast with
//! NumPy rules.

use ndarray as nd;
use crate::{
    dtype::Elem,
    error::{ Error, Result },
};

/// Stack a series of arrays.
pub fn stack_arrays<A, D>(axis: nd::Axis, arrays: &[nd::Array<A, D>])
    -> std::result::Result<nd::Array<A, D::Larger>, nd::ShapeError>
where
    A: Clone,
    D: nd::Dimension,
    D::Larger: nd::RemoveAxis,
{
    nd::stack(
        axis,
        &arrays.iter().map(|arr| arr.view()).collect::<Vec<_>>(),
    )
}

/// Compute the shape resulting from broadcasting two shapes together, if
/// possible.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let n = a.len().max(b.len());
    let pad = |s: &[usize], k: usize| -> usize {
        (k + s.len()).checked_sub(n).map(|j| s[j]).unwrap_or(1)
    };
    (0..n)
        .map(|k| {
            match (pad(a, k), pad(b, k)) {
                (x, y) if x == y => Some(x),
                (1, y) => Some(y),
                (x, 1) => Some(x),
                _ => None,
            }
        })
        .collect()
}

/// Like [`broadcast_shape`], but failing with [`Error::Broadcast`].
pub(crate) fn try_broadcast_shape(a: &[usize], b: &[usize])
    -> Result<Vec<usize>>
{
    broadcast_shape(a, b).ok_or_else(|| Error::broadcast(a, b))
}

/// Elementwise `a + b` with broadcasting, failing instead of panicking on
/// incompatible shapes.
pub(crate) fn add_broadcast<T>(a: &nd::ArrayD<T>, b: &nd::ArrayD<T>)
    -> Result<nd::ArrayD<T>>
where T: Elem
{
    try_broadcast_shape(a.shape(), b.shape())?;
    Ok(a + b)
}

/// Elementwise `a * b` with broadcasting, failing instead of panicking on
/// incompatible shapes.
pub(crate) fn mul_broadcast<T>(a: &nd::ArrayD<T>, b: &nd::ArrayD<T>)
    -> Result<nd::ArrayD<T>>
where T: Elem
{
    try_broadcast_shape(a.shape(), b.shape())?;
    Ok(a * b)
}

/// Reshape an array, copying into standard layout first if needed.
///
/// Fails if the number of elements differs.
pub(crate) fn reshape<A>(a: nd::ArrayD<A>, shape: &[usize])
    -> Result<nd::ArrayD<A>>
where A: Clone
{
    if a.shape() == shape { return Ok(a); }
    let actual = a.shape().to_vec();
    a.as_standard_layout()
        .into_owned()
        .into_shape(shape)
        .map_err(|_| Error::ShapeMismatch {
            arg: "reshape",
            expected: format!("{} elements, as for {:?}", actual.iter().product::<usize>(), shape),
            actual,
        })
}

/// Swap the last two axes; arrays with fewer than two axes are returned as-is.
pub fn transpose_last_two<A>(mut a: nd::ArrayD<A>) -> nd::ArrayD<A> {
    let n = a.ndim();
    if n >= 2 { a.swap_axes(n - 2, n - 1); }
    a
}

/// Conjugate transpose over the last two axes.
pub fn adjoint<T, S>(a: &nd::ArrayBase<S, nd::IxDyn>) -> nd::ArrayD<T>
where
    T: Elem,
    S: nd::Data<Elem = T>,
{
    transpose_last_two(a.mapv(T::conj))
}

/// Batched matrix product `A B` over the last two axes, with the batch axes
/// broadcast against each other.
pub fn matmul<T, SA, SB>(
    A: &nd::ArrayBase<SA, nd::IxDyn>,
    B: &nd::ArrayBase<SB, nd::IxDyn>,
) -> Result<nd::ArrayD<T>>
where
    T: Elem,
    SA: nd::Data<Elem = T>,
    SB: nd::Data<Elem = T>,
{
    if A.ndim() < 2 || B.ndim() < 2 {
        return Err(Error::broadcast(A.shape(), B.shape()));
    }
    let (a_batch, a_mat) = A.shape().split_at(A.ndim() - 2);
    let (b_batch, b_mat) = B.shape().split_at(B.ndim() - 2);
    let (m, k, p) = (a_mat[0], a_mat[1], b_mat[1]);
    if k != b_mat[0] {
        return Err(Error::broadcast(A.shape(), B.shape()));
    }
    let batch = try_broadcast_shape(a_batch, b_batch)?;
    let nb: usize = batch.iter().product();

    let full = |mat: [usize; 2]| -> Vec<usize> {
        batch.iter().copied().chain(mat).collect()
    };
    let err = || Error::broadcast(A.shape(), B.shape());
    let a3 = A.broadcast(full([m, k]))
        .and_then(|X| flatten_batch(X, (nb, m, k)))
        .ok_or_else(err)?;
    let b3 = B.broadcast(full([k, p]))
        .and_then(|X| flatten_batch(X, (nb, k, p)))
        .ok_or_else(err)?;

    let mut out: nd::Array3<T> = nd::Array3::zeros((nb, m, p));
    let iter
        = out.outer_iter_mut()
        .zip(a3.outer_iter())
        .zip(b3.outer_iter());
    for ((mut o, a), b) in iter {
        nd::linalg::general_mat_mul(T::one(), &a, &b, T::zero(), &mut o);
    }
    out.into_shape(full([m, p])).map_err(|_| err())
}

// collapse all batch axes of a (possibly broadcast) view into one
fn flatten_batch<T>(X: nd::ArrayView<T, nd::IxDyn>, shape: (usize, usize, usize))
    -> Option<nd::Array3<T>>
where T: Clone
{
    X.as_standard_layout().into_owned().into_shape(shape).ok()
}

/// Apply the Kraus map `Σ_k L_k ρ L_k†` to a (possibly batched) density
/// matrix.
///
/// `ops` has shape `(m, n, n)`; `m = 0` gives zero.
pub fn kraus_map<T, S>(
    rho: &nd::ArrayBase<S, nd::IxDyn>,
    ops: &nd::Array3<T>,
) -> Result<nd::ArrayD<T>>
where
    T: Elem,
    S: nd::Data<Elem = T>,
{
    let mut acc: nd::ArrayD<T> = nd::ArrayD::zeros(rho.raw_dim());
    for L in ops.outer_iter() {
        let L = L.into_dyn();
        let L_dag = adjoint(&L);
        let L_rho = matmul(&L, rho)?;
        acc = &acc + &matmul(&L_rho, &L_dag)?;
    }
    Ok(acc)
}

#[cfg(test)]
mod test {
    use num_complex::Complex64 as C64;
    use super::*;

    #[test]
    fn broadcasting() {
        assert_eq!(broadcast_shape(&[3, 1], &[4]), Some(vec![3, 4]));
        assert_eq!(broadcast_shape(&[], &[2, 2]), Some(vec![2, 2]));
        assert_eq!(broadcast_shape(&[5, 2, 2], &[2, 2]), Some(vec![5, 2, 2]));
        assert_eq!(broadcast_shape(&[3], &[4]), None);
    }

    #[test]
    fn reshape_after_transpose() {
        let a = nd::Array::from_shape_vec((2, 3), (0..6).collect())
            .unwrap()
            .into_dyn();
        let t = transpose_last_two(a);
        assert_eq!(t.shape(), &[3, 2]);
        let r = reshape(t, &[6]).unwrap();
        assert_eq!(r.as_slice().unwrap(), &[0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn reshape_size_mismatch() {
        let a: nd::ArrayD<f64> = nd::ArrayD::zeros(nd::IxDyn(&[2, 2]));
        assert!(reshape(a, &[3]).unwrap_err().is_shape_mismatch());
    }

    #[test]
    fn batched_matmul_broadcasts() {
        let x: nd::ArrayD<f64>
            = nd::array![[[1.0, 0.0], [0.0, 1.0]], [[2.0, 0.0], [0.0, 2.0]]]
            .into_dyn();
        let y: nd::ArrayD<f64> = nd::array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let z = matmul(&x, &y).unwrap();
        assert_eq!(z.shape(), &[2, 2, 2]);
        assert_eq!(z[[1, 1, 0]], 6.0);
        assert_eq!(z[[0, 0, 1]], 2.0);
    }

    #[test]
    fn matmul_inner_mismatch() {
        let x: nd::ArrayD<f64> = nd::ArrayD::zeros(nd::IxDyn(&[2, 3]));
        let y: nd::ArrayD<f64> = nd::ArrayD::zeros(nd::IxDyn(&[2, 3]));
        assert!(matmul(&x, &y).is_err());
    }

    #[test]
    fn adjoint_conjugates() {
        let a: nd::ArrayD<C64>
            = nd::array![[C64::new(0.0, 0.0), C64::new(1.0, 1.0)],
                         [C64::new(0.0, 0.0), C64::new(0.0, 0.0)]]
            .into_dyn();
        let d = adjoint(&a);
        assert_eq!(d[[1, 0]], C64::new(1.0, -1.0));
        assert_eq!(d[[0, 1]], C64::new(0.0, 0.0));
    }

    #[test]
    fn kraus_decay() {
        // σ⁻ acting on |1⟩⟨1| moves population to |0⟩⟨0|
        let one = C64::new(1.0, 0.0);
        let zero = C64::new(0.0, 0.0);
        let sm: nd::Array3<C64> = nd::array![[[zero, one], [zero, zero]]];
        let rho: nd::ArrayD<C64> = nd::array![[zero, zero], [zero, one]].into_dyn();
        let k = kraus_map(&rho, &sm).unwrap();
        assert_eq!(k[[0, 0]], one);
        assert_eq!(k[[1, 1]], zero);
    }
}
