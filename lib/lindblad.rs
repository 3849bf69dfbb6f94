//! Right-hand side of the Lindblad master equation,
//! ```text
//! dρ/dt = -i (H_nh ρ - ρ H_nh†) + Σ_k L_k ρ L_k†
//! H_nh = H - (i/2) Σ_k L_k† L_k
//! ```
//! for a time-dependent Hamiltonian `H` and fixed jump operators `L_k`.

use ndarray as nd;
use tracing::debug;
use crate::{
    convert,
    dtype::{ ArrayLike, ComplexElem },
    error::{ Error, Result },
    nd_utils::{ self, adjoint, kraus_map, matmul },
    time_array::TimeArray,
};

/// Parameters for [`Lindbladian::new`].
#[derive(Clone, Debug)]
pub struct LindbladParams<T>
where T: ComplexElem
{
    /// Hamiltonian, shape `(..., n, n)`.
    pub hamiltonian: TimeArray<T>,
    /// Jump operators, shape `(m, n, n)`; an empty array of shape `(0,)`
    /// means no dissipation.
    pub jump_ops: nd::ArrayD<T>,
}

/// Lindbladian evaluator.
///
/// `Σ_k L_k† L_k` is computed once, at construction.
#[derive(Clone, Debug)]
pub struct Lindbladian<T>
where T: ComplexElem
{
    H: TimeArray<T>,
    jump_ops: nd::Array3<T>,
    sum_no_jump: nd::Array2<T>,
    // -(i/2) Σ_k L_k† L_k
    nh_shift: nd::ArrayD<T>,
}

impl<T> Lindbladian<T>
where T: ComplexElem
{
    /// Create a new `Lindbladian`.
    pub fn new(params: LindbladParams<T>) -> Result<Self> {
        let LindbladParams { hamiltonian: H, jump_ops } = params;
        let shape = H.shape();
        let k = shape.len();
        if k < 2 || shape[k - 2] != shape[k - 1] {
            return Err(Error::not_square("hamiltonian", shape));
        }
        let n = shape[k - 1];

        let jump_ops: nd::Array3<T>
            = if jump_ops.shape() == [0] {
                nd::Array3::zeros((0, n, n))
            } else if jump_ops.ndim() == 3
                && jump_ops.shape()[1..] == [n, n]
            {
                jump_ops.into_dimensionality::<nd::Ix3>()
                    .map_err(|err| Error::ShapeMismatch {
                        arg: "jump_ops",
                        expected: format!("(m, {}, {}) ({})", n, n, err),
                        actual: Vec::new(),
                    })?
            } else {
                return Err(Error::ShapeMismatch {
                    arg: "jump_ops",
                    expected: format!("(m, {}, {})", n, n),
                    actual: jump_ops.shape().to_vec(),
                });
            };

        let sum_no_jump: nd::Array2<T>
            = jump_ops.outer_iter()
            .fold(nd::Array2::zeros((n, n)), |acc, L| {
                let L_dag = L.t().mapv(T::conj);
                acc + L_dag.dot(&L)
            });
        let shift = -(T::i() * T::half());
        let nh_shift = sum_no_jump.mapv(|x| shift * x).into_dyn();

        debug!(
            hamiltonian = %H,
            njump = jump_ops.len_of(nd::Axis(0)),
            "built lindbladian"
        );
        Ok(Self { H, jump_ops, sum_no_jump, nh_shift })
    }

    /// Create a new `Lindbladian` from a list of jump operators.
    pub fn from_operators(hamiltonian: TimeArray<T>, jump_ops: Vec<ArrayLike>)
        -> Result<Self>
    {
        let jump_ops = convert::to_operators(jump_ops)?;
        Self::new(LindbladParams { hamiltonian, jump_ops })
    }

    pub fn hamiltonian(&self) -> &TimeArray<T> { &self.H }

    pub fn jump_ops(&self) -> &nd::Array3<T> { &self.jump_ops }

    /// `Σ_k L_k† L_k`.
    pub fn sum_no_jump(&self) -> &nd::Array2<T> { &self.sum_no_jump }

    /// Matrix dimension `n`.
    pub fn n(&self) -> usize { self.sum_no_jump.nrows() }

    /// `H(t) - (i/2) Σ_k L_k† L_k`.
    pub fn effective_hamiltonian(&self, t: f64) -> nd::ArrayD<T> {
        &self.H.call(t) + &self.nh_shift
    }

    /// Compute `dρ/dt` at time `t`.
    ///
    /// `rho` has shape `(..., n, n)`. The batch axes of the Hamiltonian and of
    /// `rho` are kept separate, so the result has shape
    /// `(...H, ...rho, n, n)`.
    pub fn derivative<S>(&self, t: f64, rho: &nd::ArrayBase<S, nd::IxDyn>)
        -> Result<nd::ArrayD<T>>
    where S: nd::Data<Elem = T>
    {
        let n = self.n();
        let k = rho.ndim();
        if k < 2 || rho.shape()[k - 2..] != [n, n] {
            return Err(Error::ShapeMismatch {
                arg: "rho",
                expected: format!("(..., {}, {})", n, n),
                actual: rho.shape().to_vec(),
            });
        }

        let H_nh = self.effective_hamiltonian(t);
        let j = H_nh.ndim();
        let expanded: Vec<usize>
            = H_nh.shape()[..j - 2].iter().copied()
            .chain(std::iter::repeat(1).take(k - 2))
            .chain([n, n])
            .collect();
        let H_nh = nd_utils::reshape(H_nh, &expanded)?;

        let X = matmul(&H_nh, rho)?;
        let i = T::i();
        let unitary = (&X - &adjoint(&X)).mapv(|x| -(i * x));
        let jumps = kraus_map(rho, &self.jump_ops)?;
        Ok(&unitary + &jumps)
    }

    /// Return the derivative as a standalone function, for use by an
    /// integrator.
    pub fn op_fn(&self)
        -> impl Fn(f64, &nd::ArrayD<T>) -> Result<nd::ArrayD<T>> + Send + Sync
    {
        let this = self.clone();
        move |t: f64, rho: &nd::ArrayD<T>| this.derivative(t, rho)
    }
}

#[cfg(test)]
mod test {
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64 as C64;
    use crate::time_array::{ totime, Input };
    use super::*;

    fn c(re: f64) -> C64 { C64::new(re, 0.0) }

    fn sx() -> nd::Array2<C64> {
        nd::array![[c(0.0), c(1.0)], [c(1.0), c(0.0)]]
    }

    fn sz() -> nd::Array2<C64> {
        nd::array![[c(1.0), c(0.0)], [c(0.0), c(-1.0)]]
    }

    // |0⟩⟨1|
    fn lower() -> nd::Array2<C64> {
        nd::array![[c(0.0), c(1.0)], [c(0.0), c(0.0)]]
    }

    fn plus() -> nd::Array2<C64> {
        nd::Array2::from_elem((2, 2), c(0.5))
    }

    fn max_diff(a: &nd::ArrayD<C64>, b: &nd::ArrayD<C64>) -> f64 {
        assert_eq!(a.shape(), b.shape());
        a.iter().zip(b).map(|(x, y)| (x - y).norm()).fold(0.0, f64::max)
    }

    fn trace(a: nd::ArrayView2<C64>) -> C64 { a.diag().sum() }

    #[test]
    fn unitary_without_jumps() {
        let H: TimeArray<C64>
            = totime(Input::modulated(|t| nd::arr0(t.cos()).into(), sx()))
            .unwrap()
            .add_array(sz())
            .unwrap();
        let lind = Lindbladian::from_operators(H.clone(), Vec::new()).unwrap();
        assert_eq!(lind.jump_ops().shape(), &[0, 2, 2]);
        assert!(lind.sum_no_jump().iter().all(|z| *z == c(0.0)));

        let rho = plus().into_dyn();
        for t in [0.0, 0.3, 1.7] {
            let Ht = H.call(t).into_dimensionality::<nd::Ix2>().unwrap();
            let expected
                = (Ht.dot(&plus()) - plus().dot(&Ht))
                .mapv(|x| -(C64::i() * x))
                .into_dyn();
            let d = lind.derivative(t, &rho).unwrap();
            assert_abs_diff_eq!(max_diff(&d, &expected), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn effective_hamiltonian_shift() {
        let gamma: f64 = 0.5;
        let L = lower().mapv(|x| x * gamma.sqrt());
        let lind = Lindbladian::new(LindbladParams {
            hamiltonian: totime::<C64, _>(sz()).unwrap(),
            jump_ops: L.insert_axis(nd::Axis(0)).into_dyn(),
        })
        .unwrap();
        // L†L = γ |1⟩⟨1|
        assert_abs_diff_eq!((lind.sum_no_jump()[[1, 1]] - c(gamma)).norm(), 0.0, epsilon = 1e-12);
        let H_nh = lind.effective_hamiltonian(2.0);
        assert_abs_diff_eq!((H_nh[[1, 1]] - C64::new(-1.0, -gamma / 2.0)).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((H_nh[[0, 0]] - c(1.0)).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn decay_moves_population() {
        let gamma: f64 = 0.2;
        let L: ArrayLike = lower().mapv(|x| x * gamma.sqrt()).into();
        let zero = nd::Array2::<C64>::zeros((2, 2));
        let lind
            = Lindbladian::from_operators(totime::<C64, _>(zero).unwrap(), vec![L])
            .unwrap();
        let excited = nd::array![[c(0.0), c(0.0)], [c(0.0), c(1.0)]].into_dyn();
        let d = lind.derivative(0.0, &excited).unwrap();
        assert_abs_diff_eq!((d[[0, 0]] - c(gamma)).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((d[[1, 1]] - c(-gamma)).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d[[0, 1]].norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn trace_preserving() {
        let L1: ArrayLike = lower().into();
        let L2: ArrayLike = sz().mapv(|x| x * 0.3).into();
        let H = totime::<C64, _>(Input::pwc(vec![0.0, 1.0], vec![0.7], sx())).unwrap();
        let lind = Lindbladian::from_operators(H, vec![L1, L2]).unwrap();
        let rho = nd::array![
            [c(0.6), C64::new(0.1, 0.2)],
            [C64::new(0.1, -0.2), c(0.4)],
        ]
        .into_dyn();
        for t in [0.0, 0.5, 1.0] {
            let d = lind.derivative(t, &rho).unwrap()
                .into_dimensionality::<nd::Ix2>().unwrap();
            assert_abs_diff_eq!(trace(d.view()).norm(), 0.0, epsilon = 1e-12);
            // derivative of a Hermitian matrix is Hermitian
            assert_abs_diff_eq!((d[[0, 1]] - d[[1, 0]].conj()).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn independent_batching() {
        let Hs = nd::Array3::from_shape_fn((3, 2, 2), |(k, i, j)| {
            c(k as f64) * sz()[[i, j]]
        });
        let H = totime::<C64, _>(Hs).unwrap();
        let lind = Lindbladian::from_operators(H, vec![lower().into()]).unwrap();
        let rhos = nd::Array3::from_shape_fn((4, 2, 2), |(k, i, j)| {
            if k % 2 == 0 { plus()[[i, j]] } else { c((i == j) as u8 as f64 * 0.5) }
        })
        .into_dyn();
        let d = lind.derivative(0.0, &rhos).unwrap();
        assert_eq!(d.shape(), &[3, 4, 2, 2]);

        let f = lind.op_fn();
        let d_fn = f(0.0, &rhos).unwrap();
        assert_abs_diff_eq!(max_diff(&d, &d_fn), 0.0, epsilon = 1e-12);

        // each (H, rho) pair agrees with the unbatched evaluation
        let single = Lindbladian::from_operators(
            totime::<C64, _>(sz().mapv(|x| x * 2.0)).unwrap(),
            vec![lower().into()],
        )
        .unwrap();
        let rho1 = rhos.index_axis(nd::Axis(0), 1).to_owned();
        let expected = single.derivative(0.0, &rho1).unwrap();
        let got = d.index_axis(nd::Axis(0), 2).index_axis(nd::Axis(0), 1).to_owned();
        assert_abs_diff_eq!(max_diff(&got, &expected), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn shape_checks() {
        let H = totime::<C64, _>(sz()).unwrap();
        let bad_ops = nd::ArrayD::<C64>::zeros(nd::IxDyn(&[1, 3, 3]));
        let err = Lindbladian::new(LindbladParams { hamiltonian: H.clone(), jump_ops: bad_ops })
            .unwrap_err();
        assert!(err.is_shape_mismatch());

        let rect = totime::<C64, _>(nd::Array2::<C64>::zeros((2, 3))).unwrap();
        assert!(Lindbladian::from_operators(rect, Vec::new()).unwrap_err().is_shape_mismatch());

        let lind = Lindbladian::from_operators(H, Vec::new()).unwrap();
        let rho = nd::ArrayD::<C64>::zeros(nd::IxDyn(&[3, 3]));
        assert!(lind.derivative(0.0, &rho).unwrap_err().is_shape_mismatch());
    }
}
